//! Sequential transfer of a resolved batch
//!
//! One tool invocation per file, strictly one at a time. Failures are
//! recorded on the batch and in the download history; they never abort the
//! pass.

use crate::error::FetchError;
use crate::transfer::{Aria2cReport, ParseTransferReport, TransferRequest, TransferTool, UNKNOWN_SPEED};
use chrono::{SecondsFormat, Utc};
use ndafetch_types::{Batch, FetchEvent, FileRecord};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// URL shown in the history for files the API never signed
const MISSING_URL: &str = "<missing>";

pub fn success_line(name: &str, url: &str, speed: &str) -> String {
    format!(
        "Successfully downloaded file {} from URL {} with speed {}",
        name, url, speed
    )
}

pub fn failure_line(name: &str, url: &str) -> String {
    format!("Failed to download file {} from URL {}", name, url)
}

/// Drives the transfer tool over every record of a batch
pub struct TransferExecutor {
    tool: Arc<dyn TransferTool>,
    parser: Arc<dyn ParseTransferReport>,
    download_root: PathBuf,
    history_log: PathBuf,
    scratch_dir: PathBuf,
    options: Vec<String>,
    event_tx: Option<broadcast::Sender<FetchEvent>>,
}

impl TransferExecutor {
    pub fn new(
        tool: Arc<dyn TransferTool>,
        download_root: impl Into<PathBuf>,
        history_log: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool,
            parser: Arc::new(Aria2cReport),
            download_root: download_root.into(),
            history_log: history_log.into(),
            scratch_dir: std::env::temp_dir(),
            options: Vec::new(),
            event_tx: None,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ParseTransferReport>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Directory for per-attempt scratch logs
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_events(mut self, event_tx: broadcast::Sender<FetchEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn history_log(&self) -> &Path {
        &self.history_log
    }

    /// Download every record. Returns true only if all of them completed.
    ///
    /// `Err` is reserved for the download history becoming unwritable;
    /// individual transfer failures are reported through the return value.
    pub async fn download_all(&self, batch: &mut Batch) -> Result<bool, FetchError> {
        if batch.is_empty() {
            debug!("Nothing to download");
            return Ok(true);
        }

        if let Some(parent) = self.history_log.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut history = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_log)
            .await?;

        let total = batch.len();
        for (index, record) in batch.iter_mut().enumerate() {
            info!("[{}/{}] {}", index + 1, total, record.display_name);
            self.download_one(record, &mut history).await?;
        }

        history.flush().await?;
        drop(history);

        let succeeded = batch.all_downloaded();
        info!(
            "Download pass finished: {} of {} file(s) complete",
            batch.count(ndafetch_types::FileStatus::Downloaded),
            total
        );
        Ok(succeeded)
    }

    async fn download_one(
        &self,
        record: &mut FileRecord,
        history: &mut File,
    ) -> Result<(), FetchError> {
        let url = match record.url() {
            Some(url) => url.to_string(),
            None => {
                warn!("No download URL for {}", record.display_name);
                return self.fail(record, MISSING_URL, history).await;
            }
        };

        let destination = match destination_for(&self.download_root, &record.display_name) {
            Some(destination) => destination,
            None => {
                warn!("Refusing unsafe file name '{}'", record.display_name);
                return self.fail(record, &url, history).await;
            }
        };
        let (directory, file_name) = match (destination.parent(), destination.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_string_lossy().into_owned()),
            _ => return self.fail(record, &url, history).await,
        };

        if let Err(e) = tokio::fs::create_dir_all(&directory).await {
            warn!("Cannot create {}: {}", directory.display(), e);
            return self.fail(record, &url, history).await;
        }

        let scratch_log = self
            .scratch_dir
            .join(format!("ndafetch-{}.log", Uuid::new_v4()));
        let request = TransferRequest {
            url: &url,
            directory: &directory,
            file_name: &file_name,
            scratch_log: &scratch_log,
            options: &self.options,
        };

        let result = self.tool.fetch(&request).await;
        let report = match &result {
            Ok(exit) if exit.success() => tokio::fs::read_to_string(&scratch_log)
                .await
                .unwrap_or_default(),
            _ => String::new(),
        };
        remove_scratch(&scratch_log).await;

        match result {
            Ok(exit) if exit.success() => {
                let speed = self
                    .parser
                    .transfer_speed(&report)
                    .unwrap_or_else(|| UNKNOWN_SPEED.to_string());
                record.mark_downloaded();
                append(history, &success_line(&record.display_name, &url, &speed)).await?;
                self.emit(FetchEvent::FileDownloaded {
                    id: record.id.clone(),
                    name: record.display_name.clone(),
                    speed,
                });
                Ok(())
            }
            Ok(exit) => {
                warn!(
                    "Transfer of {} exited with {:?}",
                    record.display_name, exit.code
                );
                self.fail(record, &url, history).await
            }
            Err(e) => {
                warn!("Could not run transfer tool for {}: {}", record.display_name, e);
                self.fail(record, &url, history).await
            }
        }
    }

    async fn fail(
        &self,
        record: &mut FileRecord,
        url: &str,
        history: &mut File,
    ) -> Result<(), FetchError> {
        record.mark_failed();
        append(history, &failure_line(&record.display_name, url)).await?;
        self.emit(FetchEvent::FileFailed {
            id: record.id.clone(),
            name: record.display_name.clone(),
        });
        Ok(())
    }

    fn emit(&self, event: FetchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// Place a display name under the download root, dropping anything that
/// would climb out of it
fn destination_for(root: &Path, display_name: &str) -> Option<PathBuf> {
    let relative: PathBuf = Path::new(display_name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    if relative.as_os_str().is_empty() || display_name.split(['/', '\\']).any(|p| p == "..") {
        return None;
    }
    Some(root.join(relative))
}

async fn append(history: &mut File, line: &str) -> Result<(), FetchError> {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    history
        .write_all(format!("{} {}\n", stamp, line).as_bytes())
        .await?;
    Ok(())
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove scratch log {}: {}", path.display(), e);
        }
    }
}
