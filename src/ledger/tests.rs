use std::collections::HashSet;

use tempfile::TempDir;

use super::{FileLedger, SentLedger};

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ledger_in(dir: &TempDir) -> FileLedger {
    FileLedger::new(dir.path().join("sent_offers_ids.txt"))
}

#[tokio::test]
async fn test_load_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger_in(&dir);

    let loaded = ledger.load().await.unwrap();

    assert!(loaded.is_empty());
    assert!(!ledger.path().exists());
}

#[tokio::test]
async fn test_record_and_load() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger_in(&dir);

    ledger.record(&ids(&["42", "43"])).await.unwrap();
    ledger.record(&ids(&["44"])).await.unwrap();

    let loaded = ledger.load().await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(loaded.contains("42"));
    assert!(loaded.contains("44"));

    let contents = std::fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(contents, "42\n43\n44\n");
}

#[tokio::test]
async fn test_duplicates_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger_in(&dir);

    ledger.record(&ids(&["42"])).await.unwrap();
    ledger.record(&ids(&["42"])).await.unwrap();

    let loaded = ledger.load().await.unwrap();
    assert_eq!(loaded.len(), 1);

    let contents = std::fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[tokio::test]
async fn test_load_skips_blank_lines() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger_in(&dir);
    std::fs::write(ledger.path(), "42\n\n  43  \r\n\n").unwrap();

    let loaded = ledger.load().await.unwrap();

    assert_eq!(loaded, ["42", "43"].into_iter().map(String::from).collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_record_empty_does_not_create_file() {
    let dir = TempDir::new().unwrap();
    let ledger = ledger_in(&dir);

    ledger.record(&[]).await.unwrap();

    assert!(!ledger.path().exists());
}

#[tokio::test]
async fn test_record_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let ledger = FileLedger::new(dir.path().join("data").join("ledger.txt"));

    ledger.record(&ids(&["1"])).await.unwrap();

    assert!(ledger.load().await.unwrap().contains("1"));
}

#[tokio::test]
async fn test_concurrent_records_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let ledger = std::sync::Arc::new(ledger_in(&dir));

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.record(&[i.to_string()]).await })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task.unwrap().unwrap();
    }

    assert_eq!(ledger.load().await.unwrap().len(), 20);
}
