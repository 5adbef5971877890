//! Output formatting utilities

use console::style;
use ndafetch_types::FetchEvent;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Print events until the orchestrator drops its sender
pub async fn print_events(events: broadcast::Receiver<FetchEvent>) {
    drain_events(events, print_event).await;
}

/// Feed every received event to `handle`, returning how many were handled.
///
/// A slow reader that falls behind skips the overwritten events and keeps
/// going; only a closed channel ends the loop.
async fn drain_events<F>(mut events: broadcast::Receiver<FetchEvent>, mut handle: F) -> usize
where
    F: FnMut(&FetchEvent),
{
    let mut handled = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                handle(&event);
                handled += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Event printer fell behind, skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => return handled,
        }
    }
}

/// Print one orchestrator event for a human reader
pub fn print_event(event: &FetchEvent) {
    match event {
        FetchEvent::IterationStarted { iteration } => {
            println!("{}", style(format!("── Iteration {} ──", iteration)).bold());
        }
        FetchEvent::BatchResolved { references, files } => {
            println!(
                "  Resolved {} file(s) from {} manifest reference(s)",
                style(files).cyan(),
                references
            );
        }
        FetchEvent::FileDownloaded { name, speed, .. } => {
            println!(
                "  {} {} {}",
                style("✓").green().bold(),
                name,
                style(speed).dim()
            );
        }
        FetchEvent::FileFailed { name, .. } => {
            println!("  {} {}", style("✗").red().bold(), name);
        }
        FetchEvent::Waiting { delay, failed } => {
            println!(
                "  {} {} file(s) failed, retrying in {}",
                style("⏸").yellow(),
                failed,
                format_delay(*delay)
            );
        }
        FetchEvent::StateChanged { .. } | FetchEvent::Finished { .. } => {}
    }
}

/// Format a delay as human-readable
pub fn format_delay(delay: Duration) -> String {
    let seconds = delay.as_secs();
    if seconds == 0 {
        return "0s".to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Total time spent in `waits` cool-downs of `interval` each
pub fn time_waited(interval: Duration, waits: u32) -> Duration {
    interval.checked_mul(waits).unwrap_or(Duration::MAX)
}
