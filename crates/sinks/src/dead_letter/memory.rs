//! In-process dead-letter store

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DeadLetter, DeadLetterStore};
use crate::SinkError;

/// Dead letters kept in memory
#[derive(Debug, Default)]
pub struct MemoryDeadLetterStore {
    letters: Mutex<Vec<DeadLetter>>,
    fail_next: AtomicU32,
}

impl MemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` puts fail
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::Relaxed);
    }

    /// Copy of the stored letters
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().clone()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, mut letter: DeadLetter) -> Result<u64, SinkError> {
        if self
            .fail_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SinkError::write("injected dead-letter failure"));
        }

        let mut letters = self.letters.lock();
        let id = letters.len() as u64 + 1;
        letter.id = id;
        letters.push(letter);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<DeadLetter>, SinkError> {
        Ok(self.letters())
    }

    fn count(&self) -> u64 {
        self.letters.lock().len() as u64
    }
}
