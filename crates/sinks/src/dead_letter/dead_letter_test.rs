//! Dead-letter store tests

use serde_json::{Value, json};
use tally_protocol::UsageDetail;
use tempfile::TempDir;

use super::*;

fn letter(user: &str) -> DeadLetter {
    DeadLetter::for_record(
        "transformer",
        &UsageDetail::new(user, -1, 10),
        "invalid usage detail",
        "validation",
        1,
    )
}

// ============================================================================
// DeadLetter Tests
// ============================================================================

#[test]
fn test_for_record_keeps_structured_payload() {
    let dl = letter("user1");
    assert_eq!(dl.id, 0);
    assert_eq!(dl.stage, "transformer");
    assert_eq!(dl.attempts, 1);
    assert_eq!(
        dl.payload,
        json!({"userId": "user1", "duration": -1, "data": 10})
    );
}

#[test]
fn test_for_raw_json_is_parsed() {
    let dl = DeadLetter::for_raw("logger", br#"{"version":9}"#, "bad", "validation", 1);
    assert_eq!(dl.payload, json!({"version": 9}));
}

#[test]
fn test_for_raw_text_is_kept_lossy() {
    let dl = DeadLetter::for_raw("logger", b"not json \xff", "bad", "validation", 1);
    match dl.payload {
        Value::String(s) => assert!(s.starts_with("not json")),
        other => panic!("expected string payload, got {other:?}"),
    }
}

// ============================================================================
// Memory Store Tests
// ============================================================================

#[tokio::test]
async fn test_memory_store_assigns_ids() {
    let store = MemoryDeadLetterStore::new();
    assert_eq!(store.put(letter("a")).await.unwrap(), 1);
    assert_eq!(store.put(letter("b")).await.unwrap(), 2);

    let letters = store.list().await.unwrap();
    assert_eq!(letters.len(), 2);
    assert_eq!(letters[1].id, 2);
    assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn test_memory_store_injected_failure() {
    let store = MemoryDeadLetterStore::new();
    store.fail_next(1);

    assert!(store.put(letter("a")).await.is_err());
    assert_eq!(store.count(), 0);
    assert_eq!(store.put(letter("a")).await.unwrap(), 1);
}

// ============================================================================
// File Store Tests
// ============================================================================

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dlq/dead.jsonl");

    let store = FileDeadLetterStore::open(&path).await.unwrap();
    store.put(letter("a")).await.unwrap();
    store.put(letter("b")).await.unwrap();
    assert_eq!(store.count(), 2);

    let letters = read_all(&path).await.unwrap();
    assert_eq!(letters.len(), 2);
    assert_eq!(letters[0].id, 1);
    assert_eq!(letters[1].payload["userId"], "b");
    assert_eq!(store.list().await.unwrap(), letters);
}

#[tokio::test]
async fn test_file_store_reopen_continues_ids() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dead.jsonl");

    {
        let store = FileDeadLetterStore::open(&path).await.unwrap();
        store.put(letter("a")).await.unwrap();
        store.put(letter("b")).await.unwrap();
    }

    let store = FileDeadLetterStore::open(&path).await.unwrap();
    assert_eq!(store.count(), 0);
    assert_eq!(store.put(letter("c")).await.unwrap(), 3);
    assert_eq!(store.list().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_read_all_skips_blank_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dead.jsonl");

    let line = serde_json::to_string(&letter("a")).unwrap();
    std::fs::write(&path, format!("{line}\n\n{line}\n")).unwrap();

    assert_eq!(read_all(&path).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_read_all_reports_corrupt_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dead.jsonl");

    let line = serde_json::to_string(&letter("a")).unwrap();
    std::fs::write(&path, format!("{line}\n{{broken\n")).unwrap();

    match read_all(&path).await {
        Err(SinkError::Corrupt { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected corrupt error, got {other:?}"),
    }
    assert!(FileDeadLetterStore::open(&path).await.is_err());
}

#[tokio::test]
async fn test_file_store_reopens_after_torn_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dead.jsonl");

    {
        let store = FileDeadLetterStore::open(&path).await.unwrap();
        store.put(letter("a")).await.unwrap();
    }
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str(r#"{"id":2,"stage":"log"#);
    std::fs::write(&path, &contents).unwrap();

    assert_eq!(read_all(&path).await.unwrap().len(), 1);

    let store = FileDeadLetterStore::open(&path).await.unwrap();
    assert_eq!(store.put(letter("b")).await.unwrap(), 2);

    let letters = read_all(&path).await.unwrap();
    assert_eq!(letters.len(), 2);
    assert_eq!(letters[1].payload["userId"], "b");
    assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
}

#[tokio::test]
async fn test_file_store_terminates_intact_last_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dead.jsonl");

    let mut first = letter("a");
    first.id = 5;
    std::fs::write(&path, serde_json::to_string(&first).unwrap()).unwrap();

    let store = FileDeadLetterStore::open(&path).await.unwrap();
    assert_eq!(store.put(letter("b")).await.unwrap(), 6);

    let letters = store.list().await.unwrap();
    assert_eq!(letters.len(), 2);
    assert_eq!(letters[0].id, 5);
}

#[tokio::test]
async fn test_read_all_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = read_all(dir.path().join("absent.jsonl")).await;
    assert!(matches!(result, Err(SinkError::Io(_))));
}
