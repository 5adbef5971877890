//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use httpmock::prelude::*;
use ndafetch_core::transfer::{TransferExit, TransferRequest, TransferTool};
use ndafetch_core::{PackageClient, Session, WaitStrategy};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub const PACKAGE_ID: &str = "1188";
/// base64("user:pass")
pub const BASIC_AUTH: &str = "Basic dXNlcjpwYXNz";

/// Five scheme-prefixed rows; the first two are header references
pub const MANIFEST: &str = "\
\"row\"\t\"kind\"\t\"associated_file\"
\"1\"\t\"manifest\"\t\"s3://nda-bucket/1188/manifest.csv\"
\"2\"\t\"readme\"\t\"s3://nda-bucket/1188/README.txt\"
\"3\"\t\"image\"\t\"s3://nda-bucket/sub-01/anat.nii.gz\"
\"4\"\t\"image\"\t\"s3://nda-bucket/sub-01/dwi.nii.gz\"
\"5\"\t\"image\"\t\"s3://nda-bucket/sub-02/anat.nii.gz\"
";

pub const REFERENCES: [&str; 3] = [
    "s3://nda-bucket/sub-01/anat.nii.gz",
    "s3://nda-bucket/sub-01/dwi.nii.gz",
    "s3://nda-bucket/sub-02/anat.nii.gz",
];

pub fn write_manifest(dir: &Path) -> PathBuf {
    let path = dir.join("datastructure_manifest.txt");
    std::fs::write(&path, MANIFEST).unwrap();
    path
}

pub fn client(server: &MockServer) -> PackageClient {
    let session = Session::new("user", "pass", "ndafetch-test").unwrap();
    PackageClient::new(
        session,
        Url::parse(&server.base_url()).unwrap(),
        PACKAGE_ID.to_string(),
    )
    .unwrap()
}

/// Mock the three package endpoints for the standard manifest
pub async fn mock_package(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/package/auth")
                .header("Authorization", BASIC_AUTH);
            then.status(200);
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/package/{}/files", PACKAGE_ID))
                .json_body(json!(REFERENCES));
            then.status(200).json_body(json!([
                {"package_file_id": 101, "download_alias": "sub-01/anat.nii.gz"},
                {"package_file_id": 102, "download_alias": "sub-01/dwi.nii.gz"},
                {"package_file_id": 103, "download_alias": "sub-02/anat.nii.gz"},
            ]));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!(
                    "/package/{}/files/batchGeneratePresignedUrls",
                    PACKAGE_ID
                ))
                .json_body(json!([101, 102, 103]));
            then.status(200).json_body(json!({
                "presignedUrls": [
                    {"package_file_id": 101, "downloadURL": "https://signed.example/101"},
                    {"package_file_id": 102, "downloadURL": "https://signed.example/102"},
                    {"package_file_id": 103, "downloadURL": "https://signed.example/103"},
                ]
            }));
        })
        .await;
}

/// Transfer tool that writes an aria2c-style report and exits as scripted.
///
/// `failures` maps a file name to the number of attempts that should fail
/// before it starts succeeding; `u32::MAX` means it never succeeds.
#[derive(Default)]
pub struct ScriptedTool {
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    scratch_logs: Mutex<Vec<PathBuf>>,
    pub report_speed: bool,
}

impl ScriptedTool {
    pub fn succeeding() -> Self {
        Self {
            report_speed: true,
            ..Default::default()
        }
    }

    pub fn failing(self, url: &str, attempts: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(url.to_string(), attempts);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scratch_logs(&self) -> Vec<PathBuf> {
        self.scratch_logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferTool for ScriptedTool {
    async fn fetch(&self, request: &TransferRequest<'_>) -> std::io::Result<TransferExit> {
        self.calls.lock().unwrap().push(request.url.to_string());
        self.scratch_logs
            .lock()
            .unwrap()
            .push(request.scratch_log.to_path_buf());

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(request.url) {
                Some(remaining) if *remaining > 0 => {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    true
                }
                _ => false,
            }
        };

        let mut report = String::from("[INFO] starting transfer\n");
        if !should_fail && self.report_speed {
            report.push_str(
                "\nDownload Results:\ngid   |stat|avg speed  |path/URI\n\
                 ======+====+===========+=========\n\
                 2089b0|OK  |   2.5MiB/s|somewhere\n",
            );
        }
        tokio::fs::write(request.scratch_log, report).await?;

        if !should_fail {
            let target = request.directory.join(request.file_name);
            tokio::fs::write(target, b"payload").await?;
        }

        Ok(TransferExit {
            code: Some(if should_fail { 1 } else { 0 }),
        })
    }
}

/// Wait strategy that only counts how often it was asked to wait
#[derive(Default)]
pub struct CountingWait {
    waits: AtomicU32,
    last_delay: Mutex<Option<Duration>>,
}

impl CountingWait {
    pub fn waits(&self) -> u32 {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn last_delay(&self) -> Option<Duration> {
        *self.last_delay.lock().unwrap()
    }
}

#[async_trait]
impl WaitStrategy for CountingWait {
    async fn wait(&self, delay: Duration) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        *self.last_delay.lock().unwrap() = Some(delay);
    }
}

pub fn history_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn count_containing(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| l.contains(needle)).count()
}
