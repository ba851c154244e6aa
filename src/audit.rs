//! Append-only, human-readable audit trail, one text file per instrument.
//!
//! Line formats:
//!
//! ```text
//! balanza.txt        [16/10/2026, 14:03:22] 100.01 g
//! polarimetro.txt    [16/10/2026, 14:03:22] 12/10/2026,10:31,-12.875,OR
//! refractometro.txt  [2026-10-16 12:03:22] Lectura: 1.3330
//! ```
//!
//! The scale and polarimeter stamp local time; the refractometer stamps UTC. Files are never
//! rewritten or rotated here.

use crate::instrument::Instrument;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One audit line before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// When the entry was produced.
    pub timestamp: DateTime<Utc>,
    /// Instrument the text came from.
    pub instrument: Instrument,
    /// Raw or formatted device text.
    pub text: String,
}

impl AuditEntry {
    /// Entry stamped now.
    pub fn new(instrument: Instrument, text: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            instrument,
            text: text.to_string(),
        }
    }

    /// The line as written to disk, newline included.
    pub fn render(&self) -> String {
        match self.instrument {
            Instrument::Refractometer => format!(
                "[{}] Lectura: {}\n",
                self.timestamp.format("%Y-%m-%d %H:%M:%S"),
                self.text
            ),
            Instrument::Scale | Instrument::Polarimeter => format!(
                "[{}] {}\n",
                self.timestamp
                    .with_timezone(&Local)
                    .format("%d/%m/%Y, %H:%M:%S"),
                self.text
            ),
        }
    }
}

/// Writes audit entries under one directory.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    directory: PathBuf,
}

impl AuditLogger {
    /// Logger writing into `directory` (created on first write).
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory holding the audit files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File receiving `instrument`'s entries.
    pub fn path_for(&self, instrument: Instrument) -> PathBuf {
        self.directory.join(format!("{}.txt", instrument.tag()))
    }

    /// Append one entry.
    pub async fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.path_for(entry.instrument);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(entry.render().as_bytes()).await?;
        file.flush().await?;
        debug!(path = %path.display(), "Audit entry written");
        Ok(())
    }

    /// Append `text` for `instrument`, logging instead of failing on I/O errors.
    pub async fn record(&self, instrument: Instrument, text: &str) {
        let entry = AuditEntry::new(instrument, text);
        if let Err(e) = self.append(&entry).await {
            warn!(
                %instrument,
                path = %self.path_for(instrument).display(),
                error = %e,
                "Failed to write audit entry"
            );
        }
    }
}
