//! Streaming `multipart/form-data` decoding into parameter maps, with upload
//! progress reported into a session record while the body is still arriving.
//!
//! The decoder consumes a body stream chunk by chunk. Text fields are decoded
//! to strings, file parts are spilled through a [`Storage`] strategy as they
//! stream in, and a name submitted more than once folds into an ordered list.
//! The [`Uploader`] middleware wires the pieces together for an
//! [`http::Request`]: it detects multipart requests, decodes them, merges the
//! parameters into request extensions and writes [`UploadProgress`] snapshots
//! into a session record keyed by a cookie. [`FormData`] and [`Field`] stay
//! public for callers that want the part stream raw.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use futures_util::stream::Stream;
//! use http::Request;
//!
//! use multipart_params::{MemoryStore, Params, Storage, Uploader};
//!
//! async fn process<B, E>(req: Request<B>) -> Result<(), multipart_params::Error>
//! where
//!     B: Stream<Item = Result<Bytes, E>> + Unpin,
//!     E: Into<multipart_params::BoxError>,
//! {
//!     let uploader = Uploader::new()
//!         .store(Arc::new(MemoryStore::new()))
//!         .storage(Storage::TempDir);
//!
//!     let req = uploader.process(req).await?;
//!
//!     if let Some(Params(params)) = req.extensions().get::<Params>() {
//!         for (name, value) in params.iter() {
//!             println!("{name}: {value:?}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(missing_docs, rustdoc::missing_doc_code_examples, unreachable_pub)]

mod error;
mod field;
mod form;
mod limits;
mod params;
mod progress;
mod session;
mod state;
mod storage;
mod upload;
mod utils;

pub mod request;

pub use form::FormData;

pub use field::Field;

pub use state::State;

pub use limits::Limits;

pub use error::{BoxError, Error};

pub use storage::{PartData, SpillWriter, Storage};

pub use params::{read_params, FilePart, ParamMap, ParamValue};

pub use progress::{ProgressListener, SessionProgress, UploadProgress, PROGRESS_KEY};

pub use session::{MemoryStore, SessionRecord, SessionStore};

pub use upload::{MultipartParams, Params, UploadBody, Uploader, DEFAULT_COOKIE_NAME};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
