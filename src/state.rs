use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::Stream;
use memchr::memmem;
use tracing::trace;

use crate::{
    progress::{ProgressListener, UploadProgress},
    utils::{CRLF, CRLFS, DASHES},
    BoxError, Error, Limits, Result,
};

#[derive(Debug, PartialEq)]
enum Flag {
    Delimiting(bool),
    Heading(usize),
    Headed,
    Header,
    Next,
    Eof,
}

/// Decoding state over a request body
pub struct State<T> {
    io: T,
    eof: bool,
    flag: Flag,
    length: u64,
    buffer: BytesMut,
    delimiter: Bytes,
    is_readable: bool,
    content_length: Option<u64>,
    listener: Option<Box<dyn ProgressListener>>,
    waker: Option<Waker>,
    pub(crate) total: usize,
    pub(crate) fields: usize,
    pub(crate) files: usize,
    pub(crate) limits: Limits,
}

impl<T> State<T> {
    pub(crate) fn new(boundary: &str, io: T, limits: Limits) -> Self {
        // `\r\n--boundary`
        let mut delimiter = BytesMut::with_capacity(4 + boundary.len());
        delimiter.extend_from_slice(&CRLF);
        delimiter.extend_from_slice(&DASHES);
        delimiter.extend_from_slice(boundary.as_bytes());

        // `\r\n`
        let mut buffer = BytesMut::with_capacity(limits.buffer_size);
        buffer.extend_from_slice(&CRLF);

        Self {
            io,
            total: 0,
            fields: 0,
            files: 0,
            length: 0,

            waker: None,
            eof: false,
            is_readable: false,

            buffer,
            flag: Flag::Delimiting(false),
            delimiter: delimiter.freeze(),

            limits,
            content_length: None,
            listener: None,
        }
    }

    pub(crate) fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub(crate) fn waker(&self) -> Option<&Waker> {
        self.waker.as_ref()
    }

    pub(crate) fn waker_mut(&mut self) -> &mut Option<Waker> {
        &mut self.waker
    }

    /// Yields the index of the next part.
    pub(crate) fn index(&mut self) -> usize {
        let index = self.total;
        self.total += 1;
        index
    }

    pub(crate) fn attach_listener(
        &mut self,
        listener: Box<dyn ProgressListener>,
        content_length: Option<u64>,
    ) {
        self.content_length = content_length;
        self.listener.replace(listener);
    }

    /// Total bytes ingested from the body stream so far.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether the body stream is exhausted.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Counts the parts seen so far.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Gets the boundary.
    pub fn boundary(&self) -> &[u8] {
        &self.delimiter[4..]
    }

    fn report(&self) -> Result<()> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(());
        };

        let progress = UploadProgress {
            bytes_read: self.length,
            content_length: self.content_length,
            item_count: self.total,
        };

        trace!("reporting progress {}/{:?}", self.length, self.content_length);

        listener.on_progress(progress).map_err(Error::Session)
    }

    fn decode(&mut self) -> Option<Bytes> {
        if let Flag::Delimiting(boding) = self.flag {
            let mut heading = false;

            if let Some(n) = memmem::find(&self.buffer, &self.delimiter) {
                heading = true;
                self.flag = Flag::Heading(n);
            }

            if !heading {
                // empty request body, nothing followed the seeded CRLF
                if self.eof && self.buffer.len() == 2 && self.buffer[..2] == CRLF {
                    self.buffer.advance(2);
                    self.flag = Flag::Eof;
                }

                // a bare `--boundary` without its leading CRLF, the
                // previous part body was empty
                if memmem::find(&self.buffer, &self.delimiter[2..]).is_some() {
                    self.flag = Flag::Next;
                    self.buffer.advance(self.delimiter.len() - 2);
                    return None;
                }

                // reading a part body, emit a chunk but hold back enough
                // bytes to keep a split delimiter intact
                if boding && self.limits.buffer_size + self.delimiter.len() < self.buffer.len() {
                    return Some(self.buffer.split_to(self.limits.buffer_size).freeze());
                }
            }
        }

        if let Flag::Heading(ref mut n) = self.flag {
            if self.total == 0 {
                // skip the preamble ahead of the first boundary
                if *n > 0 {
                    self.buffer.advance(*n);
                }
                self.buffer.advance(self.delimiter.len());
                self.flag = Flag::Headed;
            } else if *n == 0 {
                // prev part is ended, its stream needs to stop
                self.flag = Flag::Next;
                self.buffer.advance(self.delimiter.len());
                return None;
            } else {
                // last chunk of the prev part body
                let buf = self.buffer.split_to(*n).freeze();
                *n = 0;
                return Some(buf);
            }
        }

        if Flag::Next == self.flag {
            self.flag = Flag::Headed;
        }

        if Flag::Headed == self.flag && self.buffer.len() > 1 {
            if self.buffer[..2] == CRLF {
                self.buffer.advance(2);
                self.flag = Flag::Header;
            } else if self.buffer[..2] == DASHES {
                self.buffer.advance(2);
                self.flag = Flag::Eof;
            } else {
                // tolerate stray bytes after the boundary, e.g. a lone `\n`
                self.flag = Flag::Eof;
            }
        }

        if Flag::Header == self.flag {
            if let Some(n) = memmem::find(&self.buffer, &CRLFS) {
                self.flag = Flag::Delimiting(true);
                return Some(self.buffer.split_to(n + CRLFS.len()).freeze());
            }
        }

        None
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("eof", &self.eof)
            .field("flag", &self.flag)
            .field("total", &self.total)
            .field("length", &self.length)
            .field("is_readable", &self.is_readable)
            .field("boundary", &String::from_utf8_lossy(self.boundary()))
            .finish()
    }
}

/// Splits the body into raw sections: header blocks and body chunks.
impl<T, B, E> Stream for State<T>
where
    T: Stream<Item = Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.is_readable {
                // part
                trace!("attempting to decode a part");

                if let Some(data) = self.decode() {
                    trace!("part decoded from buffer");
                    return Poll::Ready(Some(Ok(data)));
                }

                // field stream is ended
                if Flag::Next == self.flag {
                    return Poll::Ready(None);
                }

                // whole stream is ended
                if Flag::Eof == self.flag {
                    self.buffer.clear();
                    self.eof = true;
                    return Poll::Ready(None);
                }

                // the io ended while a part was still open
                if self.eof {
                    return Poll::Ready(Some(Err(Error::Incomplete)));
                }

                self.is_readable = false;
            }

            trace!("polling data from stream");

            if self.eof {
                self.is_readable = true;
                continue;
            }

            self.buffer.reserve(1);
            let bytect = match Pin::new(self.io_mut()).poll_next(cx) {
                Poll::Pending => {
                    return Poll::Pending;
                }
                Poll::Ready(Some(Ok(b))) => {
                    let b = b.into();
                    let l = b.len() as u64;

                    if let Some(max) = self.limits.checked_stream_size(self.length + l) {
                        return Poll::Ready(Some(Err(Error::PayloadTooLarge(max))));
                    }

                    self.buffer.extend_from_slice(&b);
                    self.length += l;
                    self.report()?;
                    l
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(Error::BoxError(e.into()))))
                }
                Poll::Ready(None) => 0,
            };

            if bytect == 0 {
                self.eof = true;
            }

            self.is_readable = true;
        }
    }
}
