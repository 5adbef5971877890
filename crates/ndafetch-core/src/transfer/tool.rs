//! External transfer tool invocation

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Everything the tool needs for one file
#[derive(Debug, Clone)]
pub struct TransferRequest<'a> {
    pub url: &'a str,
    /// Directory the file is written into
    pub directory: &'a Path,
    pub file_name: &'a str,
    /// Per-attempt log the tool writes its report to
    pub scratch_log: &'a Path,
    /// Operator-supplied passthrough options
    pub options: &'a [String],
}

/// Exit status of one tool run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferExit {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl TransferExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A program that moves the bytes of one signed URL onto disk
#[async_trait]
pub trait TransferTool: Send + Sync {
    /// Run one transfer to completion.
    ///
    /// `Err` means the tool could not be run at all; a tool that ran and
    /// failed reports a non-zero exit instead.
    async fn fetch(&self, request: &TransferRequest<'_>) -> std::io::Result<TransferExit>;
}

/// aria2c, run with a single connection slot per invocation
#[derive(Debug, Clone)]
pub struct Aria2c {
    program: PathBuf,
}

impl Aria2c {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line for one transfer. Passthrough options come last so they
    /// can override the defaults.
    pub fn args(request: &TransferRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--file-allocation=none".into(),
            "--max-concurrent-downloads=1".into(),
            "--console-log-level=warn".into(),
            "--summary-interval=0".into(),
        ];

        let mut dir = OsString::from("--dir=");
        dir.push(request.directory);
        args.push(dir);
        args.push(format!("--out={}", request.file_name).into());

        let mut log = OsString::from("--log=");
        log.push(request.scratch_log);
        args.push(log);
        args.push("--log-level=info".into());

        args.extend(request.options.iter().map(OsString::from));
        args.push(request.url.into());
        args
    }
}

#[async_trait]
impl TransferTool for Aria2c {
    async fn fetch(&self, request: &TransferRequest<'_>) -> std::io::Result<TransferExit> {
        debug!("Running {} for {}", self.program.display(), request.file_name);

        let output = Command::new(&self.program)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .output()
            .await?;

        // The results table only goes to stdout; keep it with the log so the
        // report parser sees both.
        let mut scratch = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(request.scratch_log)
            .await?;
        scratch.write_all(&output.stdout).await?;
        scratch.flush().await?;

        Ok(TransferExit {
            code: output.status.code(),
        })
    }
}
