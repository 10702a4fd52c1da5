// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

use crate::engine::ShipFailure;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit_json("success", message, None, false),
        }
    }

    /// Print a failure reported by one target, as soon as it is observed.
    pub fn failure(&self, failure: &ShipFailure) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("ERROR: {failure}"),
            OutputMode::Json => self.emit_json(
                "failure",
                &failure.error.to_string(),
                Some(failure.target.as_str()),
                true,
            ),
        }
    }

    /// Announce that a deploy failed and a rollback is starting.
    pub fn rollback_banner(&self, cause: &ShipFailure) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                let rule = "*".repeat(80);
                eprintln!("{rule}");
                eprintln!("An error was encountered while deploying the application");
                eprintln!("The error message was: {cause}");
                eprintln!("Rolling back all targets");
                eprintln!("{rule}");
            }
            OutputMode::Json => self.emit_json(
                "rollback",
                &cause.error.to_string(),
                Some(cause.target.as_str()),
                true,
            ),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.emit_json("error", message, None, true),
        }
    }

    fn emit_json(&self, event: &str, message: &str, target: Option<&str>, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            target,
            timestamp: Utc::now().to_rfc3339(),
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
