//! Integration tests for the transfer executor

mod common;

use common::*;
use ndafetch_core::transfer::TransferExecutor;
use ndafetch_types::{Batch, FileId, FileRecord, FileStatus};
use std::sync::Arc;
use tempfile::tempdir;

fn record(id: i64, name: &str, url: Option<&str>) -> FileRecord {
    let mut record = FileRecord::new(FileId::Number(id), name.to_string());
    if let Some(url) = url {
        record.attach_url(url.to_string());
    }
    record
}

#[tokio::test]
async fn test_scratch_logs_never_survive() {
    let temp = tempdir().unwrap();
    let scratch = temp.path().join("scratch");
    std::fs::create_dir_all(&scratch).unwrap();
    let history = temp.path().join("history.log");
    let tool = Arc::new(ScriptedTool::succeeding().failing("https://s/2", u32::MAX));

    let mut batch = Batch::new();
    batch.insert(record(1, "one.bin", Some("https://s/1")));
    batch.insert(record(2, "two.bin", Some("https://s/2")));
    batch.insert(record(3, "three.bin", Some("https://s/3")));

    let executor = TransferExecutor::new(tool.clone(), temp.path().join("out"), &history)
        .with_scratch_dir(&scratch);
    let ok = executor.download_all(&mut batch).await.unwrap();

    assert!(!ok);
    let scratch_logs = tool.scratch_logs();
    assert_eq!(scratch_logs.len(), 3);
    // Each attempt gets its own scratch log
    assert_ne!(scratch_logs[0], scratch_logs[1]);
    assert!(scratch_logs.iter().all(|p| !p.exists()));
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);

    assert_eq!(batch.count(FileStatus::Downloaded), 2);
    assert_eq!(batch.count(FileStatus::Failed), 1);
}

#[tokio::test]
async fn test_missing_speed_is_unknown() {
    let temp = tempdir().unwrap();
    let history = temp.path().join("history.log");
    let tool = Arc::new(ScriptedTool::default());

    let mut batch = Batch::new();
    batch.insert(record(7, "seven.bin", Some("https://s/7")));

    let executor = TransferExecutor::new(tool, temp.path().join("out"), &history)
        .with_scratch_dir(temp.path());
    assert!(executor.download_all(&mut batch).await.unwrap());

    let lines = history_lines(&history);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(
        "Successfully downloaded file seven.bin from URL https://s/7 with speed Unknown"
    ));
}

#[tokio::test]
async fn test_unsigned_file_fails_without_transfer() {
    let temp = tempdir().unwrap();
    let history = temp.path().join("history.log");
    let tool = Arc::new(ScriptedTool::succeeding());

    let mut batch = Batch::new();
    batch.insert(record(1, "signed.bin", Some("https://s/1")));
    batch.insert(record(2, "unsigned.bin", None));

    let executor = TransferExecutor::new(tool.clone(), temp.path().join("out"), &history)
        .with_scratch_dir(temp.path());
    assert!(!executor.download_all(&mut batch).await.unwrap());

    assert_eq!(tool.calls(), vec!["https://s/1".to_string()]);
    let lines = history_lines(&history);
    assert_eq!(
        count_containing(&lines, "Failed to download file unsigned.bin from URL <missing>"),
        1
    );
    assert_eq!(
        batch.get(&FileId::Number(2)).map(|r| r.status),
        Some(FileStatus::Failed)
    );
}

#[tokio::test]
async fn test_history_is_appended_across_passes() {
    let temp = tempdir().unwrap();
    let history = temp.path().join("logs/history.log");
    let tool = Arc::new(ScriptedTool::succeeding());
    let executor = TransferExecutor::new(tool, temp.path().join("out"), &history)
        .with_scratch_dir(temp.path());

    for _ in 0..2 {
        let mut batch = Batch::new();
        batch.insert(record(1, "one.bin", Some("https://s/1")));
        assert!(executor.download_all(&mut batch).await.unwrap());
    }

    assert_eq!(history_lines(&history).len(), 2);
}
