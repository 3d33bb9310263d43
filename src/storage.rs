//! Storage strategies for file part payloads.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use tempfile::NamedTempFile;

use crate::Result;

/// Storage strategy for file part payloads.
///
/// File parts always spill to their target as they stream in, no matter how
/// small they are. [`Storage::Memory`] swaps the spill target for a buffer,
/// for tests and tiny uploads.
#[derive(Debug, Clone, Default)]
pub enum Storage {
    /// Spill into the system temp directory.
    #[default]
    TempDir,
    /// Spill into the given directory.
    Dir(PathBuf),
    /// Keep payloads in memory.
    Memory,
}

impl Storage {
    /// Opens a spill target for one file part.
    pub fn writer(&self) -> Result<SpillWriter> {
        let target = match self {
            Self::TempDir => Target::File(NamedTempFile::new()?),
            Self::Dir(dir) => Target::File(NamedTempFile::new_in(dir)?),
            Self::Memory => Target::Memory(BytesMut::new()),
        };
        Ok(SpillWriter(target))
    }
}

#[derive(Debug)]
enum Target {
    File(NamedTempFile),
    Memory(BytesMut),
}

/// An open spill target for one file part.
#[derive(Debug)]
pub struct SpillWriter(Target);

impl SpillWriter {
    /// Appends a chunk of the part body.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.0 {
            Target::File(file) => file.write_all(buf)?,
            Target::Memory(bytes) => bytes.extend_from_slice(buf),
        }
        Ok(())
    }

    /// Closes the target and hands ownership of the payload to the caller.
    ///
    /// A disk target is persisted, so the file survives this call and is
    /// never cleaned up by this crate.
    pub fn finish(self) -> Result<PartData> {
        match self.0 {
            Target::File(file) => {
                let (_, path) = file.keep().map_err(|e| e.error)?;
                Ok(PartData::File(path))
            }
            Target::Memory(bytes) => Ok(PartData::Memory(bytes.freeze())),
        }
    }
}

/// Where one file part's payload ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum PartData {
    /// Path of a persisted file holding the payload.
    File(PathBuf),
    /// The payload itself.
    Memory(Bytes),
}

impl PartData {
    /// The payload path, when spilled to disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Memory(_) => None,
        }
    }

    /// Reads the payload back, from disk or memory.
    pub fn contents(&self) -> io::Result<Bytes> {
        match self {
            Self::File(path) => Ok(fs::read(path)?.into()),
            Self::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}
