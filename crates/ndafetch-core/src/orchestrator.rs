//! Retry orchestrator - the authenticate/resolve/download loop
//!
//! ```text
//! Authenticating -> Resolving -> Downloading -> Done
//!       ^                             |
//!       +--------- Waiting <----------+  (some file failed)
//! ```
//!
//! Authentication, manifest and resolution errors end the run. Transfer
//! failures only send the loop through `Waiting` and back to the start with
//! a freshly resolved batch.

use crate::client::PackageClient;
use crate::config::RunSettings;
use crate::error::FetchError;
use crate::manifest::ManifestReader;
use crate::resolver::PackageResolver;
use crate::session::Session;
use crate::transfer::{Aria2c, TransferExecutor};
use async_trait::async_trait;
use chrono::Utc;
use ndafetch_types::{Batch, FetchEvent, FileStatus, OrchestratorState, RunReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// How the orchestrator spends the cool-down between iterations
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    async fn wait(&self, delay: Duration);
}

/// Real cool-down using the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl WaitStrategy for TokioSleep {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Skips the cool-down entirely
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWait;

#[async_trait]
impl WaitStrategy for NoWait {
    async fn wait(&self, _delay: Duration) {}
}

/// Runs iterations until every file of a batch is downloaded
pub struct RetryOrchestrator {
    client: PackageClient,
    resolver: PackageResolver,
    manifest: ManifestReader,
    executor: TransferExecutor,
    wait: Arc<dyn WaitStrategy>,
    retry_interval: Duration,
    max_iterations: Option<u32>,
    event_tx: broadcast::Sender<FetchEvent>,
}

impl RetryOrchestrator {
    pub fn new(
        client: PackageClient,
        manifest: ManifestReader,
        executor: TransferExecutor,
        retry_interval: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self {
            resolver: PackageResolver::new(client.clone()),
            client,
            manifest,
            executor: executor.with_events(event_tx.clone()),
            wait: Arc::new(TokioSleep),
            retry_interval,
            max_iterations: None,
            event_tx,
        }
    }

    /// Wire up the production stack (HTTP client, aria2c) from settings
    pub fn from_settings(settings: &RunSettings, session: Session) -> Result<Self, FetchError> {
        let client = PackageClient::new(
            session,
            settings.api_base_url.clone(),
            settings.package_id.clone(),
        )?;
        let executor = TransferExecutor::new(
            Arc::new(Aria2c::new(&settings.transfer_program)),
            &settings.download_directory,
            &settings.history_log,
        )
        .with_options(settings.transfer_options.clone());

        let orchestrator = Self::new(
            client,
            ManifestReader::new(&settings.manifest_file),
            executor,
            settings.retry_interval,
        );
        Ok(match settings.max_iterations {
            Some(max) => orchestrator.with_max_iterations(max),
            None => orchestrator,
        })
    }

    pub fn with_wait_strategy(mut self, wait: Arc<dyn WaitStrategy>) -> Self {
        self.wait = wait;
        self
    }

    /// Give up with `RetriesExhausted` after `max` iterations
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Subscribe to orchestrator events
    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: FetchEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Authenticate and resolve once, without downloading anything
    pub async fn resolve_once(&self) -> Result<Batch, FetchError> {
        self.client.authenticate().await?;
        let references = self.manifest.read().await?;
        self.resolver.resolve_batch(&references).await
    }

    /// Run the loop until a batch fully succeeds
    pub async fn run(&self) -> Result<RunReport, FetchError> {
        let mut state = OrchestratorState::Authenticating;
        let mut transitions = Vec::new();
        let mut iterations = 0u32;
        let mut waits = 0u32;
        let mut files = 0usize;
        let mut failed = 0usize;
        let mut batch: Option<Batch> = None;

        loop {
            transitions.push(state);
            self.emit(FetchEvent::StateChanged { state });

            state = match state {
                OrchestratorState::Authenticating => {
                    iterations += 1;
                    info!("Starting iteration {}", iterations);
                    self.emit(FetchEvent::IterationStarted {
                        iteration: iterations,
                    });

                    if let Err(e) = self.client.authenticate().await {
                        error!("Authentication failed: {}", e);
                        return Err(e);
                    }
                    OrchestratorState::Resolving
                }

                OrchestratorState::Resolving => {
                    let references = self.manifest.read().await?;
                    let resolved = self.resolver.resolve_batch(&references).await?;
                    info!(
                        "Resolved {} file(s) from {} reference(s)",
                        resolved.len(),
                        references.len()
                    );
                    self.emit(FetchEvent::BatchResolved {
                        references: references.len(),
                        files: resolved.len(),
                    });
                    batch = Some(resolved);
                    OrchestratorState::Downloading
                }

                OrchestratorState::Downloading => {
                    // The batch belongs to this iteration only
                    let mut current = batch.take().unwrap_or_default();
                    let all_succeeded = self.executor.download_all(&mut current).await?;
                    files = current.len();
                    failed = files - current.count(FileStatus::Downloaded);

                    if all_succeeded {
                        OrchestratorState::Done
                    } else if self.max_iterations.is_some_and(|max| iterations >= max) {
                        warn!(
                            "{} file(s) still failing after {} iteration(s), giving up",
                            failed, iterations
                        );
                        return Err(FetchError::RetriesExhausted { iterations });
                    } else {
                        OrchestratorState::Waiting
                    }
                }

                OrchestratorState::Waiting => {
                    waits += 1;
                    warn!(
                        "{} file(s) failed, retrying in {:?}",
                        failed, self.retry_interval
                    );
                    self.emit(FetchEvent::Waiting {
                        delay: self.retry_interval,
                        failed,
                    });
                    self.wait.wait(self.retry_interval).await;
                    OrchestratorState::Authenticating
                }

                OrchestratorState::Done => {
                    info!(
                        "All {} file(s) downloaded after {} iteration(s)",
                        files, iterations
                    );
                    self.emit(FetchEvent::Finished { iterations });
                    return Ok(RunReport {
                        iterations,
                        waits,
                        transitions,
                        files,
                        finished_at: Utc::now(),
                    });
                }
            };
        }
    }
}
