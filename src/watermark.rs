//! Persistence for the watermark: the instant up to which posts have already
//! been relayed.
//!
//! Only the ingestion loop writes it, once per completed cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("watermark I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("watermark file {path} holds {content:?}, not a unix timestamp")]
    Corrupt { path: PathBuf, content: String },
}

/// Where the loop keeps its watermark between runs.
pub trait WatermarkStore {
    /// The stored watermark, `Ok(None)` if nothing was stored yet.
    fn read(&self) -> Result<Option<DateTime<Utc>>, WatermarkError>;

    /// Replace the stored watermark.  On error the previous value must still
    /// be readable.
    fn write(&mut self, watermark: DateTime<Utc>) -> Result<(), WatermarkError>;
}

/// Watermark kept as unix seconds in a small text file.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> WatermarkError {
        WatermarkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Accepts integer seconds and the fractional form older files carry.
fn parse_epoch(content: &str) -> Option<DateTime<Utc>> {
    let content = content.trim();
    let seconds = match content.parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => {
            let secs = content.parse::<f64>().ok().filter(|s| s.is_finite())?;
            secs.floor() as i64
        }
    };
    Utc.timestamp_opt(seconds, 0).single()
}

impl WatermarkStore for FileWatermarkStore {
    fn read(&self) -> Result<Option<DateTime<Utc>>, WatermarkError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        parse_epoch(&content)
            .map(Some)
            .ok_or_else(|| WatermarkError::Corrupt {
                path: self.path.clone(),
                content,
            })
    }

    fn write(&mut self, watermark: DateTime<Utc>) -> Result<(), WatermarkError> {
        // Write-then-rename so a crash never leaves a half-written file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, watermark.timestamp().to_string()).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
