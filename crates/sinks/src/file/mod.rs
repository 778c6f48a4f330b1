//! File Sink - cost records appended to a file
//!
//! One line per record, flushed after every write so an acknowledged record
//! is always on disk. Parent directories are created on open.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_protocol::UsageCostDetail;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{MetricsSnapshot, RecordFormat, RecordSink, SinkError, SinkMetrics};


/// Append-only file sink
pub struct FileSink {
    path: PathBuf,
    format: RecordFormat,
    file: Mutex<File>,
    metrics: SinkMetrics,
}

impl FileSink {
    /// Open (or create) `path` for appending
    pub async fn open(path: impl AsRef<Path>, format: RecordFormat) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path).await?;

        tracing::info!(path = %path.display(), format = ?format, "file sink opened");

        Ok(Self {
            path,
            format,
            file: Mutex::new(file),
            metrics: SinkMetrics::new(),
        })
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open a file for appending, creating missing parent directories
pub(crate) async fn open_append(path: &Path) -> Result<File, SinkError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            SinkError::init(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| SinkError::init(format!("cannot open {}: {e}", path.display())))
}

#[async_trait]
impl RecordSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn write(&self, record: &UsageCostDetail) -> Result<(), SinkError> {
        let mut line = self.format.render(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        let result = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.metrics.record_written(line.len() as u64);
                Ok(())
            }
            Err(e) => {
                self.metrics.write_error();
                tracing::warn!(path = %self.path.display(), error = %e, "file sink write failed");
                Err(e.into())
            }
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        self.metrics.flush();
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
