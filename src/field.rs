use std::{
    fmt,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use encoding_rs::Encoding;
use futures_util::stream::{Stream, TryStreamExt};
use tracing::trace;

use crate::{BoxError, Error, Result, State};

/// One decoded part of a `multipart/form-data` body
pub struct Field<T> {
    /// The payload size of the field.
    pub length: usize,
    /// The index of the field.
    pub index: usize,
    /// The name of the field.
    pub name: String,
    /// The filename of the field, optional. `Some` marks the field as a
    /// file, even when the filename itself is empty.
    pub filename: Option<String>,
    /// The content type of the field, optional.
    pub content_type: Option<mime::Mime>,
    /// The extra headers of the field, optional.
    pub headers: Option<http::HeaderMap>,
    state: Option<Arc<Mutex<State<T>>>>,
}

impl<T> Field<T> {
    pub(crate) fn empty() -> Self {
        Self {
            index: 0,
            length: 0,
            name: String::new(),
            filename: None,
            content_type: None,
            headers: None,
            state: None,
        }
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Option<http::HeaderMap> {
        &mut self.headers
    }

    pub(crate) fn state_mut(&mut self) -> &mut Option<Arc<Mutex<State<T>>>> {
        &mut self.state
    }

    /// Whether the field body has been fully read.
    pub fn consumed(&self) -> bool {
        self.state.is_none()
    }
}

impl<T, B, E> Field<T>
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    /// Reads the whole field body to bytes.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let mut bytes = BytesMut::new();
        while let Some(buf) = self.try_next().await? {
            bytes.extend_from_slice(&buf);
        }
        Ok(bytes.freeze())
    }

    /// Reads the whole field body to text.
    ///
    /// A `charset` declared by the field's own content type wins over
    /// `default_encoding`.
    pub async fn text(&mut self, default_encoding: &'static Encoding) -> Result<String> {
        let encoding = self
            .content_type
            .as_ref()
            .and_then(|m| m.get_param(mime::CHARSET))
            .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
            .unwrap_or(default_encoding);

        let buf = self.bytes().await?;
        let (text, ..) = encoding.decode(&buf);

        Ok(text.into_owned())
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("index", &self.index)
            .field("length", &self.length)
            .field("headers", &self.headers)
            .field("consumed", &self.state.is_none())
            .finish()
    }
}

/// Reads payload data from part, then yields them
impl<T, B, E> Stream for Field<T>
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        trace!("polling {} {}", self.index, self.state.is_some());

        let Some(state) = self.state.clone() else {
            return Poll::Ready(None);
        };

        let is_file = self.filename.is_some();
        let mut state = state
            .try_lock()
            .map_err(|e| Error::TryLockError(e.to_string()))?;

        match Pin::new(&mut *state).poll_next(cx)? {
            Poll::Pending => Poll::Pending,
            Poll::Ready(res) => match res {
                None => {
                    if let Some(waker) = state.waker_mut().take() {
                        waker.wake();
                    }
                    trace!("polled {}", self.index);
                    drop(self.state.take());
                    Poll::Ready(None)
                }
                Some(buf) => {
                    let l = buf.len();

                    if is_file {
                        if let Some(max) = state.limits.checked_file_size(self.length + l) {
                            return Poll::Ready(Some(Err(Error::FileTooLarge(max))));
                        }
                    } else if let Some(max) = state.limits.checked_field_size(self.length + l) {
                        return Poll::Ready(Some(Err(Error::FieldTooLarge(max))));
                    }

                    self.length += l;
                    trace!("polled bytes {}/{}", buf.len(), self.length);
                    Poll::Ready(Some(Ok(buf)))
                }
            },
        }
    }
}
