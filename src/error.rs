use thiserror::Error;

/// A boxed error from a body stream, a session store or a progress listener.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Multipart decoding and upload handling error
#[derive(Debug, Error)]
pub enum Error {
    /// IO Error
    #[error(transparent)]
    Stream(#[from] std::io::Error),

    /// Box Error
    #[error(transparent)]
    BoxError(#[from] BoxError),

    /// Content type does not begin with `multipart/form-data`
    #[error("not a multipart/form-data request")]
    NotMultipart,

    /// Content type carries no boundary parameter
    #[error("no boundary in content type")]
    MissingBoundary,

    /// Invalid part header
    #[error("invalid part header")]
    InvalidHeader,

    /// Invalid content disposition
    #[error("invalid content disposition")]
    InvalidContentDisposition,

    /// Body ended before the closing boundary
    #[error("incomplete multipart body")]
    Incomplete,

    /// Session store failed during a progress report
    #[error("session store: {0}")]
    Session(BoxError),

    /// Payload too large
    #[error("payload is too large, limit to `{0}`")]
    PayloadTooLarge(u64),

    /// File too large
    #[error("file is too large, limit to `{0}`")]
    FileTooLarge(usize),

    /// Field too large
    #[error("field is too large, limit to `{0}`")]
    FieldTooLarge(usize),

    /// Parts too many
    #[error("parts is too many, limit to `{0}`")]
    PartsTooMany(usize),

    /// Fields too many
    #[error("fields is too many, limit to `{0}`")]
    FieldsTooMany(usize),

    /// Files too many
    #[error("files is too many, limit to `{0}`")]
    FilesTooMany(usize),

    /// Try Lock Error
    #[error("`{0}`")]
    TryLockError(String),
}

impl Error {
    /// Whether the failure was caused by a defective request body rather
    /// than by io, a limit or the session store. Useful for choosing
    /// between a client and a server error response.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::NotMultipart
                | Self::MissingBoundary
                | Self::InvalidHeader
                | Self::InvalidContentDisposition
                | Self::Incomplete
        )
    }
}
