use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

const TOOL: &str = "prism";

/// Structured progress event emitted to stderr.
#[derive(Debug, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub tool: String,
    pub processed: u64,
    pub total: Option<u64>,
    pub percent: Option<f64>,
    pub elapsed_ms: u64,
}

/// Structured warning emitted to stderr for skipped records and run-level notices.
#[derive(Debug, Serialize)]
pub struct WarningEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub tool: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Emits a progress event every `every` processed records, plus a final one.
#[derive(Debug)]
pub struct ProgressTracker {
    enabled: bool,
    every: u64,
    total: Option<u64>,
    processed: u64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(enabled: bool, every: u64, total: Option<u64>) -> Self {
        Self {
            enabled,
            every: every.max(1),
            total,
            processed: 0,
            started: Instant::now(),
        }
    }

    /// Count one record; returns the event that should be emitted, if any.
    pub fn record(&mut self) -> Option<ProgressEvent> {
        self.processed += 1;
        if !self.enabled || self.processed % self.every != 0 {
            return None;
        }
        Some(self.snapshot())
    }

    pub fn finish(&self) -> Option<ProgressEvent> {
        self.enabled.then(|| self.snapshot())
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    fn snapshot(&self) -> ProgressEvent {
        let percent = self.total.filter(|total| *total > 0).map(|total| {
            let ratio = self.processed as f64 / total as f64;
            (ratio * 1000.0).round() / 10.0
        });
        ProgressEvent {
            event_type: "progress".to_owned(),
            tool: TOOL.to_owned(),
            processed: self.processed,
            total: self.total,
            percent,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Report progress to stderr as JSONL.
pub fn report_progress(event: &ProgressEvent) {
    let mut stderr = io::stderr().lock();
    let _ = write_event_line(&mut stderr, event);
}

/// Report a skipped-record warning to stderr as JSONL.
pub fn report_warning(path: &str, message: &str) {
    report_warning_code(path, None, message);
}

/// Report a warning to stderr as JSONL with an optional warning code.
pub fn report_warning_code(path: &str, code: Option<&str>, message: &str) {
    let warning = WarningEvent {
        event_type: "warning".to_owned(),
        tool: TOOL.to_owned(),
        path: path.to_owned(),
        code: code.map(str::to_owned),
        message: message.to_owned(),
    };
    let mut stderr = io::stderr().lock();
    let _ = write_event_line(&mut stderr, &warning);
}

fn write_event_line<T: Serialize>(out: &mut dyn Write, event: &T) -> Result<(), String> {
    serde_json::to_writer(&mut *out, event)
        .map_err(|error| format!("failed to serialize progress event: {error}"))?;
    out.write_all(b"\n")
        .map_err(|error| format!("failed to write progress event newline: {error}"))?;
    out.flush()
        .map_err(|error| format!("failed to flush progress event output: {error}"))?;
    Ok(())
}
