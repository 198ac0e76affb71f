//! Render backend contract and download sinks.

use sigdoc_core::{Document, Error, RenderMode, Result};
use std::path::{Path, PathBuf};

/// What a render produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// Bytes for inline display. Nothing was persisted.
    Inline(Vec<u8>),
    /// Bytes were handed to the download sink under this name.
    Saved { filename: String },
}

/// Turns an assembled document into output bytes.
///
/// A failed render must not leave partial output behind.
pub trait RenderBackend {
    fn render(&mut self, document: &Document, mode: RenderMode) -> Result<RenderOutput>;
}

/// Receives complete documents for download.
pub trait DownloadSink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes into a directory: temp file first, then rename, so a failed
/// write never leaves a half-written document under the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    /// `filename` must be a single path component.
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
            return Err(Error::Render(format!("not a plain file name: {filename:?}")));
        }
        let io_err = |e: std::io::Error| Error::Render(format!("cannot write {filename}: {e}"));
        let target = self.dir.join(filename);
        let partial = self.dir.join(format!(".{filename}.part"));
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        if let Err(e) = std::fs::write(&partial, bytes) {
            let _ = std::fs::remove_file(&partial);
            return Err(io_err(e));
        }
        if let Err(e) = std::fs::rename(&partial, &target) {
            let _ = std::fs::remove_file(&partial);
            return Err(io_err(e));
        }
        log::info!("saved {}", target.display());
        Ok(())
    }
}

/// Keeps downloads in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DownloadSink for MemorySink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        self.files.push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}
