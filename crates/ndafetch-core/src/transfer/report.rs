//! Transfer report parsing
//!
//! The speed of a finished transfer is only available from the tool's own
//! output, so the scanning rules live behind a small trait.

/// Speed recorded when the report does not mention one
pub const UNKNOWN_SPEED: &str = "Unknown";

/// Extracts the transfer speed from a tool report
pub trait ParseTransferReport: Send + Sync {
    fn transfer_speed(&self, report: &str) -> Option<String>;
}

/// Reads aria2c's `Download Results` table.
///
/// ```text
/// Download Results:
/// gid   |stat|avg speed  |path/URI
/// ======+====+===========+=========================
/// 2089b0|OK  |   1.1MiB/s|/data/sub-01/anat.nii.gz
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Aria2cReport;

const RESULTS_MARKER: &str = "Download Results";

impl ParseTransferReport for Aria2cReport {
    fn transfer_speed(&self, report: &str) -> Option<String> {
        let lines: Vec<&str> = report.lines().collect();
        let marker = lines.iter().position(|l| l.contains(RESULTS_MARKER));

        if let Some(marker) = marker {
            let from_table = lines[marker + 1..].iter().find_map(|line| {
                let columns: Vec<&str> = line.split('|').map(str::trim).collect();
                match columns.as_slice() {
                    [_, "OK", speed, ..] if !speed.is_empty() => Some(speed.to_string()),
                    _ => None,
                }
            });
            if from_table.is_some() {
                return from_table;
            }
        }

        // Fall back to the last speed field logged before the results
        let before = &lines[..marker.unwrap_or(lines.len())];
        before.iter().rev().find_map(|line| speed_field(line))
    }
}

/// Value following a `speed` label, e.g. `avg speed: 1.2MiB/s` or `speed=900KiB/s`
fn speed_field(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let start = lower.rfind("speed")? + "speed".len();
    let value = line[start..]
        .trim_start_matches(|c: char| c == ':' || c == '=' || c.is_whitespace())
        .split_whitespace()
        .next()?;
    (!value.is_empty()).then(|| value.to_string())
}
