//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use matter_core::sync::{SkipReason, SyncOutcome, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print the result of a sync run
    pub fn print_outcome(&self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Completed(report) => self.print_report(report),
            SyncOutcome::Skipped(reason) => match self.format {
                OutputFormat::Human => println!("Sync skipped: {}", skip_message(*reason)),
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({"status": "skipped", "reason": reason})
                    );
                }
                OutputFormat::Quiet => {}
            },
        }
    }

    /// Print sync counters
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                println!("✓ Sync complete");
                println!("  Records:   {}", report.records);
                println!("  Created:   {}", report.created);
                println!("  Appended:  {}", report.appended);
                println!("  Unchanged: {}", report.unchanged);
                if report.skipped_missing > 0 {
                    println!("  Left deleted: {}", report.skipped_missing);
                }
                if report.conflicts > 0 {
                    println!("  Synced elsewhere: {}", report.conflicts);
                }
                if report.template_failures > 0 {
                    println!("  Template failures: {}", report.template_failures);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "completed", "report": report})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::AlreadySyncing => "another sync is in progress",
        SkipReason::NoAccessToken => "not signed in (run `matter-sync login`)",
    }
}

/// Display an optional value, or "(not set)"
pub fn or_not_set<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
