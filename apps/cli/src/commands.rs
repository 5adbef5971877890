//! CLI command implementations

use crate::output::{format_delay, print_events, time_waited};
use crate::OutputFormat;
use anyhow::{anyhow, Context, Result};
use console::style;
use ndafetch_core::{FetchConfig, FetchError, RetryOrchestrator, RunSettings, Session};
use ndafetch_types::{Batch, FileStatus};

pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn build_session(settings: &RunSettings, credentials: Credentials) -> Result<Session> {
    let username = credentials
        .username
        .ok_or_else(|| anyhow!("No username given (--username or NDA_USERNAME)"))?;
    let password = credentials
        .password
        .ok_or_else(|| anyhow!("No password given (--password or NDA_PASSWORD)"))?;
    Ok(Session::new(&username, &password, &settings.user_agent)?)
}

fn explain(error: FetchError) -> anyhow::Error {
    let transient = error.is_transient();
    let error = anyhow::Error::new(error);
    if transient {
        error.context("Package API unreachable; nothing was changed, re-run later")
    } else {
        error
    }
}

// ============================================================================
// Run
// ============================================================================

pub async fn run(config: FetchConfig, credentials: Credentials, format: OutputFormat) -> Result<()> {
    let settings = config.into_settings().context("Invalid configuration")?;
    let session = build_session(&settings, credentials)?;
    let orchestrator = RetryOrchestrator::from_settings(&settings, session)?;

    tracing::info!(
        "Downloading package {} into {} (history: {})",
        settings.package_id,
        settings.download_directory.display(),
        settings.history_log.display()
    );

    let printer = match format {
        OutputFormat::Human | OutputFormat::Table => {
            Some(tokio::spawn(print_events(orchestrator.subscribe())))
        }
        OutputFormat::Json => None,
    };

    let result = orchestrator.run().await;
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let report = result.map_err(explain)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human | OutputFormat::Table => {
            println!(
                "{} {} file(s) downloaded after {} iteration(s), {} retry wait(s)",
                style("✓").green().bold(),
                style(report.files).bold(),
                report.iterations,
                report.waits
            );
            if report.waits > 0 {
                println!(
                    "  Time spent waiting: {}",
                    format_delay(time_waited(settings.retry_interval, report.waits))
                );
            }
        }
    }

    Ok(())
}

// ============================================================================
// Resolve
// ============================================================================

pub async fn resolve(
    config: FetchConfig,
    credentials: Credentials,
    format: OutputFormat,
) -> Result<()> {
    // Nothing is downloaded, so the transfer program need not be installed
    let settings = config
        .into_resolve_settings()
        .context("Invalid configuration")?;
    let session = build_session(&settings, credentials)?;
    let orchestrator = RetryOrchestrator::from_settings(&settings, session)?;
    let batch = orchestrator.resolve_once().await.map_err(explain)?;

    match format {
        OutputFormat::Json => {
            let records: Vec<_> = batch.iter().collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Table => print_table(&batch),
        OutputFormat::Human => {
            if batch.is_empty() {
                println!("{}", style("The package holds none of the manifest objects").dim());
                return Ok(());
            }

            for record in batch.iter() {
                let icon = match record.url() {
                    Some(_) => style("•").cyan(),
                    None => style("✗").red(),
                };
                println!(
                    "{} {} {}",
                    icon,
                    style(&record.display_name).bold(),
                    style(format!("[{}]", record.id)).dim()
                );
            }
            println!();
            println!(
                "{} file(s), {} without a download URL",
                style(batch.len()).bold(),
                batch.iter().filter(|r| r.url().is_none()).count()
            );
        }
    }

    Ok(())
}

fn print_table(batch: &Batch) {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct FileRow {
        id: String,
        name: String,
        status: String,
        signed: String,
    }

    let rows: Vec<FileRow> = batch
        .iter()
        .map(|r| FileRow {
            id: r.id.to_string(),
            name: if r.display_name.chars().count() > 48 {
                let tail: String = r
                    .display_name
                    .chars()
                    .rev()
                    .take(45)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("...{}", tail)
            } else {
                r.display_name.clone()
            },
            status: format!("{:?}", r.status),
            signed: if r.status == FileStatus::Resolved {
                "yes".to_string()
            } else {
                "no".to_string()
            },
        })
        .collect();

    println!("{}", Table::new(rows));
}
