//! Byte sources for binary units.
//!
//! A source has one capability: open, read everything, release. Nothing is
//! kept open between calls, so scanning thousands of units never holds more
//! than one descriptor per worker.

use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

use crate::error::{ApiModelError, Result};

pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Reads the whole unit. The underlying file or archive is closed before
    /// this returns.
    fn read_all(&self) -> Result<Vec<u8>>;

    /// Human readable location, used in faults and logs.
    fn location(&self) -> String;
}

/// A loose `.class` file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_all(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| ApiModelError::source_unavailable(self.location(), e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// One member of a jar/zip archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntrySource {
    archive: PathBuf,
    entry: String,
}

impl ArchiveEntrySource {
    pub fn new(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl ByteSource for ArchiveEntrySource {
    fn read_all(&self) -> Result<Vec<u8>> {
        let unavailable = |e: std::io::Error| ApiModelError::source_unavailable(self.location(), e);

        let file = File::open(&self.archive).map_err(unavailable)?;
        // SAFETY: The file is opened read-only and outlives the mapping; both
        // are dropped before this function returns.
        let mmap = unsafe { Mmap::map(&file) }.map_err(unavailable)?;
        let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
            .map_err(|e| ApiModelError::source_unavailable(self.location(), e))?;
        let mut entry = archive
            .by_name(&self.entry)
            .map_err(|e| ApiModelError::source_unavailable(self.location(), e))?;

        let mut bytes = Vec::with_capacity(capacity_hint(entry.size()));
        entry.read_to_end(&mut bytes).map_err(unavailable)?;
        Ok(bytes)
    }

    fn location(&self) -> String {
        format!("{}!/{}", self.archive.display(), self.entry)
    }
}

/// Declared entry sizes come from the archive and are not trusted; the
/// buffer still grows past the hint if the entry really is larger.
const MAX_CAPACITY_HINT: usize = 16 * 1024 * 1024;

fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(MAX_CAPACITY_HINT)
        .min(MAX_CAPACITY_HINT)
}

/// Bytes already in memory, e.g. produced by another tool or a test.
#[derive(Clone)]
pub struct MemorySource {
    label: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("label", &self.label)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ByteSource for MemorySource {
    fn read_all(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }

    fn location(&self) -> String {
        format!("memory:{}", self.label)
    }
}
