//! Helpers for reading multipart-relevant metadata from an [`http::Request`].

use cookie::Cookie;
use encoding_rs::Encoding;
use http::{header, Request};

use crate::{Error, Result};

fn content_type<B>(req: &Request<B>) -> Option<&str> {
    req.headers().get(header::CONTENT_TYPE)?.to_str().ok()
}

/// Whether the request declares a `multipart/form-data` content type.
///
/// The check is a literal prefix match, exactly as browsers emit it.
pub fn is_multipart<B>(req: &Request<B>) -> bool {
    content_type(req).is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Extracts the boundary parameter from the request's content type.
pub fn boundary<B>(req: &Request<B>) -> Result<String> {
    let ct = content_type(req).ok_or(Error::NotMultipart)?;

    if !ct.starts_with("multipart/form-data") {
        return Err(Error::NotMultipart);
    }

    ct.parse::<mime::Mime>()
        .ok()
        .and_then(|m| m.get_param(mime::BOUNDARY).map(|b| b.as_str().to_owned()))
        .ok_or(Error::MissingBoundary)
}

/// The character encoding declared by the request's content type, if any.
pub fn charset<B>(req: &Request<B>) -> Option<&'static Encoding> {
    content_type(req)?
        .parse::<mime::Mime>()
        .ok()?
        .get_param(mime::CHARSET)
        .and_then(|cs| Encoding::for_label(cs.as_str().as_bytes()))
}

/// The request's content length, if it carries a parseable one.
pub fn content_length<B>(req: &Request<B>) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Looks up a cookie by name across all `Cookie` headers.
pub fn cookie_value<B>(req: &Request<B>, name: &str) -> Option<String> {
    for header in req.headers().get_all(header::COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for piece in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if let Ok(cookie) = Cookie::parse_encoded(piece) {
                if cookie.name() == name {
                    return Some(cookie.value().to_owned());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::post("/upload");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn boundary_plain() {
        let req = request(&[("content-type", "multipart/form-data; boundary=abc123")]);
        assert!(is_multipart(&req));
        assert_eq!(boundary(&req).unwrap(), "abc123");
    }

    #[test]
    fn boundary_quoted() {
        let req = request(&[(
            "content-type",
            "multipart/form-data; boundary=\"----WebKitFormBoundary3SRNGpHLYKkGyhKe\"",
        )]);
        assert_eq!(boundary(&req).unwrap(), "----WebKitFormBoundary3SRNGpHLYKkGyhKe");
    }

    #[test]
    fn boundary_missing() {
        let req = request(&[("content-type", "multipart/form-data")]);
        assert!(is_multipart(&req));
        assert!(matches!(boundary(&req), Err(Error::MissingBoundary)));
    }

    #[test]
    fn content_type_prefix_is_case_sensitive() {
        let req = request(&[("content-type", "Multipart/Form-Data; boundary=abc")]);
        assert!(!is_multipart(&req));
        assert!(matches!(boundary(&req), Err(Error::NotMultipart)));
    }

    #[test]
    fn not_multipart() {
        let req = request(&[("content-type", "application/x-www-form-urlencoded")]);
        assert!(!is_multipart(&req));
        assert!(matches!(boundary(&req), Err(Error::NotMultipart)));

        let req = request(&[]);
        assert!(!is_multipart(&req));
    }

    #[test]
    fn charset_declared() {
        let req = request(&[(
            "content-type",
            "multipart/form-data; boundary=abc; charset=iso-8859-1",
        )]);
        assert_eq!(charset(&req), Some(encoding_rs::WINDOWS_1252));
    }

    #[test]
    fn charset_absent() {
        let req = request(&[("content-type", "multipart/form-data; boundary=abc")]);
        assert_eq!(charset(&req), None);
    }

    #[test]
    fn content_length_parsed() {
        let req = request(&[("content-length", "1024")]);
        assert_eq!(content_length(&req), Some(1024));

        let req = request(&[("content-length", "nope")]);
        assert_eq!(content_length(&req), None);

        let req = request(&[]);
        assert_eq!(content_length(&req), None);
    }

    #[test]
    fn cookie_lookup() {
        let req = request(&[("cookie", "a=1; ring-session=sess%3A42; b=2")]);
        assert_eq!(cookie_value(&req, "ring-session").as_deref(), Some("sess:42"));
        assert_eq!(cookie_value(&req, "b").as_deref(), Some("2"));
        assert_eq!(cookie_value(&req, "missing"), None);
    }

    #[test]
    fn cookie_across_headers() {
        let req = request(&[("cookie", "a=1"), ("cookie", "ring-session=xyz")]);
        assert_eq!(cookie_value(&req, "ring-session").as_deref(), Some("xyz"));
    }
}
