//! Upload progress reporting.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{BoxError, SessionStore};

/// The session record field this crate owns and overwrites.
pub const PROGRESS_KEY: &str = "upload-progress";

/// A snapshot of one upload in flight.
///
/// Each report replaces the previous one wholesale; no history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadProgress {
    /// Bytes of the request body ingested so far. Never decreases across
    /// the reports of one decode.
    pub bytes_read: u64,
    /// The declared content length, when the request carried one.
    pub content_length: Option<u64>,
    /// Parts observed so far, fully or partially.
    pub item_count: usize,
}

/// Receives progress reports while a body is being decoded.
///
/// Called inline from the decode loop, so implementations should return
/// quickly. An error aborts the decode.
pub trait ProgressListener: Send {
    /// Handles one progress snapshot.
    fn on_progress(&self, progress: UploadProgress) -> Result<(), BoxError>;
}

impl<F> ProgressListener for F
where
    F: Fn(UploadProgress) -> Result<(), BoxError> + Send,
{
    fn on_progress(&self, progress: UploadProgress) -> Result<(), BoxError> {
        (self)(progress)
    }
}

/// A [`ProgressListener`] that persists each snapshot into a session record.
///
/// Every report reads the record under the bound key, replaces its
/// [`PROGRESS_KEY`] field and writes the record back. The read-modify-write
/// is not atomic; concurrent decodes bound to the same key resolve to
/// last-write-wins.
pub struct SessionProgress {
    store: Arc<dyn SessionStore>,
    key: String,
}

impl SessionProgress {
    /// Binds a listener to one session key.
    pub fn new(store: Arc<dyn SessionStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl ProgressListener for SessionProgress {
    fn on_progress(&self, progress: UploadProgress) -> Result<(), BoxError> {
        let mut record = self.store.read(&self.key)?;
        record.insert(PROGRESS_KEY.to_owned(), serde_json::to_value(progress)?);
        self.store.write(&self.key, record)?;
        Ok(())
    }
}

impl fmt::Debug for SessionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProgress")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
