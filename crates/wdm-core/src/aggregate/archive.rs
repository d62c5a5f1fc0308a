//! In-memory write-side archive accumulator.
//!
//! Owns buffered entries for a sequence download until the final entry
//! arrives, then is serialized to disk exactly once and discarded. Entry
//! order is insertion order, which downstream readers rely on.

use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::download::temp_path;

pub struct ArchiveAccumulator {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl Default for ArchiveAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveAccumulator {
    pub fn new() -> Self {
        ArchiveAccumulator {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Buffer one entry. Page images are already compressed, so entries are
    /// stored rather than deflated.
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer
            .start_file(name, options)
            .with_context(|| format!("cannot start archive entry: {}", name))?;
        self.writer
            .write_all(bytes)
            .with_context(|| format!("cannot buffer archive entry: {}", name))?;
        self.entries += 1;
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Serialize the archive to `path` in one write. Consumes the
    /// accumulator; the bytes land under a `.part` name first and are
    /// renamed into place.
    pub fn write_to(mut self, path: &Path) -> Result<()> {
        let cursor = self.writer.finish().context("cannot finish archive")?;
        let bytes = cursor.into_inner();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory: {}", parent.display()))?;
        }
        let temp = temp_path(path);
        std::fs::write(&temp, &bytes)
            .with_context(|| format!("cannot write archive: {}", temp.display()))?;
        std::fs::rename(&temp, path)
            .with_context(|| format!("cannot finalize archive: {}", path.display()))?;
        Ok(())
    }
}
