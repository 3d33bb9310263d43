use http::header::{HeaderMap, HeaderName, HeaderValue};
use httparse::{parse_headers, Status, EMPTY_HEADER};
use memchr::memchr;

use crate::{Error, Result};

pub(crate) const MAX_HEADERS: usize = 8 * 2;
pub(crate) const DASHES: [u8; 2] = [b'-', b'-']; // `--`
pub(crate) const CRLF: [u8; 2] = [b'\r', b'\n']; // `\r\n`
pub(crate) const CRLFS: [u8; 4] = [b'\r', b'\n', b'\r', b'\n']; // `\r\n\r\n`

const NAME: &[u8] = b"name";
const FILE_NAME: &[u8] = b"filename";
const FORM_DATA: &[u8] = b"form-data";

pub(crate) fn parse_content_type(header: Option<&HeaderValue>) -> Option<mime::Mime> {
    header
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .map(str::parse)
        .and_then(Result::ok)
}

pub(crate) fn parse_part_headers(bytes: &[u8]) -> Result<HeaderMap> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    match parse_headers(bytes, &mut headers) {
        Ok(Status::Complete((_, hs))) => {
            let len = hs.len();
            let mut header_map = HeaderMap::with_capacity(len);
            for h in hs.iter().take(len) {
                header_map.append(
                    HeaderName::from_bytes(h.name.as_bytes()).map_err(|_| Error::InvalidHeader)?,
                    HeaderValue::from_bytes(h.value).map_err(|_| Error::InvalidHeader)?,
                );
            }
            Ok(header_map)
        }
        Ok(Status::Partial) | Err(_) => Err(Error::InvalidHeader),
    }
}

/// Extracts `name` and optional `filename` from a `content-disposition`
/// value. The name must be non-empty, a present-but-empty filename stays
/// `Some("")` so empty file inputs are still classified as files.
pub(crate) fn parse_content_disposition(hv: &[u8]) -> Result<(String, Option<String>)> {
    let mut params = split_params(hv).into_iter();

    if params.next() != Some(FORM_DATA) {
        return Err(Error::InvalidContentDisposition);
    }

    let mut name = None;
    let mut filename = None;

    for param in params {
        let Some(i) = memchr(b'=', param) else {
            continue;
        };

        let key = trim(&param[..i]);
        let value = unquote(trim(&param[i + 1..]));

        if key == NAME {
            name = Some(String::from_utf8_lossy(value).into_owned());
        } else if key == FILE_NAME {
            filename = Some(String::from_utf8_lossy(value).into_owned());
        }
    }

    match name {
        Some(name) if !name.is_empty() => Ok((name, filename)),
        _ => Err(Error::InvalidContentDisposition),
    }
}

/// Splits on `;`, leaving `;` inside double quotes alone.
fn split_params(hv: &[u8]) -> Vec<&[u8]> {
    let mut params = Vec::with_capacity(3);
    let mut start = 0;
    let mut quoted = false;

    for (i, &b) in hv.iter().enumerate() {
        match b {
            b'"' => quoted = !quoted,
            b';' if !quoted => {
                params.push(trim(&hv[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(trim(&hv[start..]));

    params
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = s {
        s = rest;
    }
    s
}

fn unquote(s: &[u8]) -> &[u8] {
    if s.len() > 1 && s[0] == b'"' && s[s.len() - 1] == b'"' {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
