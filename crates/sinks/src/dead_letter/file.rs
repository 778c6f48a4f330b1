//! JSON-lines dead-letter store
//!
//! One `DeadLetter` per line. Ids continue from the highest id already in the
//! file so reopening a store never reuses one.
//!
//! Only newline-terminated lines count as stored. A failed append is rolled
//! back to the previous length, and an unterminated tail left by a crash is
//! cut off when the store is reopened.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{DeadLetter, DeadLetterStore};
use crate::SinkError;
use crate::file::open_append;

/// Dead letters appended to a file
pub struct FileDeadLetterStore {
    path: PathBuf,
    file: Mutex<File>,
    next_id: AtomicU64,
    stored: AtomicU64,
}

impl FileDeadLetterStore {
    /// Open (or create) the store at `path`
    ///
    /// Fails if an existing file contains a complete line that is not a
    /// dead letter.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();

        let existing = match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                let contents = tokio::fs::read_to_string(&path).await?;
                let parsed = parse_lines(&contents)?;
                repair_tail(&path, &contents, &parsed).await?;
                parsed.letters
            }
            _ => Vec::new(),
        };
        let last_id = existing.iter().map(|l| l.id).max().unwrap_or(0);
        let file = open_append(&path).await?;

        tracing::info!(
            path = %path.display(),
            existing = existing.len(),
            "dead-letter store opened"
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            next_id: AtomicU64::new(last_id + 1),
            stored: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterStore for FileDeadLetterStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn put(&self, mut letter: DeadLetter) -> Result<u64, SinkError> {
        // Hold the file lock while assigning so ids are written in order
        let mut file = self.file.lock().await;

        let id = self.next_id.load(Ordering::Relaxed);
        letter.id = id;
        let mut line = serde_json::to_string(&letter)?;
        line.push('\n');

        let start = file.metadata().await?.len();
        if let Err(e) = append_line(&mut file, line.as_bytes()).await {
            if let Err(rollback) = file.set_len(start).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial dead letter"
                );
            }
            return Err(e.into());
        }

        self.next_id.store(id + 1, Ordering::Relaxed);
        self.stored.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<DeadLetter>, SinkError> {
        let _guard = self.file.lock().await;
        read_all(&self.path).await
    }

    fn count(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }
}

async fn append_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Read every dead letter in a JSON-lines file
///
/// Blank lines are skipped. A complete line that does not parse fails with
/// `SinkError::Corrupt` naming its 1-based line number. An unterminated final
/// line that does not parse is a torn write and is skipped with a warning.
pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<DeadLetter>, SinkError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    let parsed = parse_lines(&contents)?;
    if parsed.torn {
        tracing::warn!(
            path = %path.display(),
            bytes = contents.len() - parsed.complete_len,
            "skipping torn dead letter at end of file"
        );
    }
    Ok(parsed.letters)
}

struct ParsedLines {
    letters: Vec<DeadLetter>,
    /// Byte length of the newline-terminated prefix
    complete_len: usize,
    /// Unterminated tail that is not a dead letter
    torn: bool,
}

fn parse_lines(contents: &str) -> Result<ParsedLines, SinkError> {
    let complete_len = contents.rfind('\n').map_or(0, |pos| pos + 1);
    let (complete, tail) = contents.split_at(complete_len);

    let mut letters = complete
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| SinkError::Corrupt {
                line: idx + 1,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<DeadLetter>, SinkError>>()?;

    let mut torn = false;
    if !tail.trim().is_empty() {
        match serde_json::from_str(tail) {
            Ok(letter) => letters.push(letter),
            Err(_) => torn = true,
        }
    }

    Ok(ParsedLines {
        letters,
        complete_len,
        torn,
    })
}

/// Make the file end on a line boundary before appending to it
async fn repair_tail(path: &Path, contents: &str, parsed: &ParsedLines) -> Result<(), SinkError> {
    if contents.len() == parsed.complete_len {
        return Ok(());
    }

    let mut file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    if parsed.torn {
        tracing::warn!(
            path = %path.display(),
            bytes = contents.len() - parsed.complete_len,
            "discarding torn dead letter at end of file"
        );
        file.set_len(parsed.complete_len as u64).await?;
    } else {
        // Last record is intact but unterminated
        file.seek(std::io::SeekFrom::End(0)).await?;
        file.write_all(b"\n").await?;
    }
    file.sync_data().await?;
    Ok(())
}
