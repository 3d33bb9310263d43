use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::stream::Stream;
use http::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    HeaderValue,
};
use tracing::trace;

use crate::{
    progress::ProgressListener,
    utils::{parse_content_disposition, parse_content_type, parse_part_headers},
    BoxError, Error, Field, Limits, Result, State,
};

/// Form-data decoder, a stream of [`Field`]s
pub struct FormData<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> FormData<T> {
    /// Creates a decoder over a body stream with default limits.
    pub fn new(body: T, boundary: &str) -> Self {
        Self::with_limits(body, boundary, Limits::default())
    }

    /// Creates a decoder over a body stream with the given limits.
    pub fn with_limits(body: T, boundary: &str, limits: Limits) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new(boundary, body, limits))),
        }
    }

    /// Gets the inner state.
    pub fn state(&self) -> Arc<Mutex<State<T>>> {
        self.state.clone()
    }

    /// Attaches a progress listener, invoked once per ingested body chunk
    /// with the cumulative byte count, the declared content length and the
    /// number of parts seen so far.
    pub fn set_progress(
        &self,
        listener: impl ProgressListener + 'static,
        content_length: Option<u64>,
    ) -> Result<()> {
        self.state
            .try_lock()
            .map_err(|e| Error::TryLockError(e.to_string()))?
            .attach_listener(Box::new(listener), content_length);
        Ok(())
    }
}

/// Reads form-data from request payload body, then yields `Field`
impl<T, B, E> Stream for FormData<T>
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    type Item = Result<Field<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state = self
            .state
            .try_lock()
            .map_err(|e| Error::TryLockError(e.to_string()))?;

        if state.waker().is_some() {
            return Poll::Pending;
        }

        match Pin::new(&mut *state).poll_next(cx)? {
            Poll::Pending => Poll::Pending,
            Poll::Ready(res) => match res {
                None => {
                    trace!("parse eof");
                    Poll::Ready(None)
                }
                Some(buf) => {
                    trace!("parse part");

                    // too many parts
                    if let Some(max) = state.limits.checked_parts(state.total + 1) {
                        return Poll::Ready(Some(Err(Error::PartsTooMany(max))));
                    }

                    // invalid part header
                    let Ok(mut headers) = parse_part_headers(&buf) else {
                        return Poll::Ready(Some(Err(Error::InvalidHeader)));
                    };

                    // invalid content disposition
                    let Some((name, filename)) = headers
                        .remove(CONTENT_DISPOSITION)
                        .as_ref()
                        .map(HeaderValue::as_bytes)
                        .map(parse_content_disposition)
                        .and_then(Result::ok)
                    else {
                        return Poll::Ready(Some(Err(Error::InvalidContentDisposition)));
                    };

                    if filename.is_some() {
                        // files too many
                        if let Some(max) = state.limits.checked_files(state.files + 1) {
                            return Poll::Ready(Some(Err(Error::FilesTooMany(max))));
                        }
                        state.files += 1;
                    } else {
                        // fields too many
                        if let Some(max) = state.limits.checked_fields(state.fields + 1) {
                            return Poll::Ready(Some(Err(Error::FieldsTooMany(max))));
                        }
                        state.fields += 1;
                    }

                    // yields `Field`
                    let mut field = Field::empty();

                    field.name = name;
                    field.filename = filename;
                    field.index = state.index();
                    field.content_type = parse_content_type(headers.remove(CONTENT_TYPE).as_ref());
                    field.state_mut().replace(self.state());

                    if !headers.is_empty() {
                        field.headers_mut().replace(headers);
                    }

                    // clone waker, if field is polled data, wake it.
                    state.waker_mut().replace(cx.waker().clone());

                    Poll::Ready(Some(Ok(field)))
                }
            },
        }
    }
}
