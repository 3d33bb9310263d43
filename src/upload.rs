//! Middleware turning multipart requests into parameter maps.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures_util::stream::Stream;
use http::Request;
use tracing::debug;

use crate::{
    read_params, request, BoxError, FormData, Limits, ParamMap, Result, SessionProgress,
    SessionStore, Storage,
};

/// The cookie whose value addresses the session record, unless overridden.
pub const DEFAULT_COOKIE_NAME: &str = "ring-session";

/// Parameters decoded from the multipart body alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartParams(pub ParamMap);

/// The request's combined parameter map.
///
/// Multipart values overwrite colliding names; parameters from earlier
/// stages are otherwise left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(pub ParamMap);

/// The body slot of a processed request.
///
/// A multipart body is consumed by the decode, leaving [`Drained`] behind.
/// Any other body passes through untouched and still streams.
///
/// [`Drained`]: UploadBody::Drained
#[derive(Debug)]
pub enum UploadBody<B> {
    /// The original body, untouched.
    Intact(B),
    /// The body was consumed by the multipart decode.
    Drained,
}

impl<B> UploadBody<B> {
    /// Whether the multipart decode consumed the body.
    pub fn is_drained(&self) -> bool {
        matches!(self, Self::Drained)
    }

    /// Returns the original body, if it was passed through.
    pub fn into_inner(self) -> Option<B> {
        match self {
            Self::Intact(body) => Some(body),
            Self::Drained => None,
        }
    }
}

impl<B> Stream for UploadBody<B>
where
    B: Stream + Unpin,
{
    type Item = B::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Self::Intact(body) => Pin::new(body).poll_next(cx),
            Self::Drained => Poll::Ready(None),
        }
    }
}

/// Decodes multipart requests and merges the parameters they carry into the
/// request, reporting upload progress into a session record along the way.
///
/// ```
/// use multipart_params::{Storage, Uploader};
///
/// let uploader = Uploader::new().storage(Storage::TempDir);
/// ```
pub struct Uploader {
    encoding: Option<&'static Encoding>,
    cookie_name: String,
    storage: Storage,
    limits: Limits,
    store: Option<Arc<dyn SessionStore>>,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            encoding: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            storage: Storage::default(),
            limits: Limits::default(),
            store: None,
        }
    }
}

impl Uploader {
    /// Creates an uploader with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the charset used to decode text fields.
    ///
    /// Without an override, the request's declared charset applies, then
    /// UTF-8.
    #[must_use]
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Names the cookie whose value is the session key.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Selects the storage strategy for file parts.
    #[must_use]
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Applies decode limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Attaches the session store progress reports are written to.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Decodes the request's multipart body, if it has one, and returns the
    /// request augmented with [`MultipartParams`] and [`Params`] extensions.
    ///
    /// A non-multipart request passes through with its body intact, an empty
    /// [`MultipartParams`] and no progress reports. A multipart body is
    /// consumed whole; text fields land in the parameter maps, file parts
    /// are spilled through the configured [`Storage`].
    ///
    /// Progress reports go to the configured store under the session key
    /// read from the request's cookie. Without a store or a cookie the
    /// decode runs silently.
    pub async fn process<B, D, E>(&self, req: Request<B>) -> Result<Request<UploadBody<B>>>
    where
        B: Stream<Item = Result<D, E>> + Unpin,
        D: Into<Bytes>,
        E: Into<BoxError>,
    {
        if !request::is_multipart(&req) {
            debug!("not a multipart request");
            let (parts, body) = req.into_parts();
            let mut req = Request::from_parts(parts, UploadBody::Intact(body));
            merge_params(&mut req, ParamMap::new());
            return Ok(req);
        }

        let boundary = request::boundary(&req)?;
        let encoding = self
            .encoding
            .or_else(|| request::charset(&req))
            .unwrap_or(UTF_8);
        let content_length = request::content_length(&req);
        let session_key = request::cookie_value(&req, &self.cookie_name);

        debug!(
            "decoding multipart request, boundary {:?}, charset {}",
            boundary,
            encoding.name()
        );

        let (parts, body) = req.into_parts();
        let form = FormData::with_limits(body, &boundary, self.limits.clone());

        match (&self.store, session_key) {
            (Some(store), Some(key)) => {
                form.set_progress(SessionProgress::new(store.clone(), key), content_length)?;
            }
            _ => debug!("no session key, progress reporting disabled"),
        }

        let multipart = read_params(form, &self.storage, encoding).await?;

        let mut req = Request::from_parts(parts, UploadBody::Drained);
        merge_params(&mut req, multipart);
        Ok(req)
    }

    /// Processes the request, then hands the augmented request to `handler`.
    pub async fn handle<B, D, E, H, F, R>(&self, req: Request<B>, handler: H) -> Result<R>
    where
        B: Stream<Item = Result<D, E>> + Unpin,
        D: Into<Bytes>,
        E: Into<BoxError>,
        H: FnOnce(Request<UploadBody<B>>) -> F,
        F: Future<Output = R>,
    {
        Ok(handler(self.process(req).await?).await)
    }
}

impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader")
            .field("encoding", &self.encoding)
            .field("cookie_name", &self.cookie_name)
            .field("storage", &self.storage)
            .field("limits", &self.limits)
            .field("store", &self.store.is_some())
            .finish()
    }
}

fn merge_params<B>(req: &mut Request<UploadBody<B>>, multipart: ParamMap) {
    let mut merged = req
        .extensions()
        .get::<Params>()
        .cloned()
        .unwrap_or_default();
    merged.0.merge(multipart.clone());
    req.extensions_mut().insert(MultipartParams(multipart));
    req.extensions_mut().insert(merged);
}
