#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod refusal;

/// Run the prism CLI. Returns an exit code (0, 1, or 2).
pub fn run() -> u8 {
    use clap::Parser;
    use cli::Cli;

    // Parse CLI args (handles --version and --help via clap, then exits)
    let cli = Cli::parse();

    if cli.describe {
        return handle_describe();
    }
    if cli.schema {
        return handle_schema();
    }

    handle_run_mode(cli)
}

/// Handle --describe flag: print operator.json and exit.
fn handle_describe() -> u8 {
    let operator = serde_json::json!({
        "name": "prism",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Hash files listed in a JSONL manifest on a bounded pool of workers",
        "pipeline_role": "enricher",
        "input_format": "JSONL",
        "output_format": "JSONL",
        "stdin_support": true,
        "file_support": true,
        "cancellation": "rows not reached before --timeout-secs expires are emitted with _skipped and a W_CANCELLED warning"
    });

    if let Ok(json) = serde_json::to_string_pretty(&operator) {
        println!("{}", json);
        0
    } else {
        eprintln!("Error: Failed to serialize operator metadata");
        2
    }
}

/// Handle --schema flag: print JSON Schema and exit.
fn handle_schema() -> u8 {
    let schema = serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Prism JSONL Schema",
        "description": "Schema for prism output JSONL records",
        "type": "object",
        "properties": {
            "version": { "type": "string" },
            "path": { "type": "string" },
            "bytes_hash": { "type": "string", "pattern": "^blake3:[0-9a-f]{64}$" },
            "size": { "type": "integer", "minimum": 0 },
            "tool_versions": { "type": "object" },
            "_skipped": { "type": "boolean" },
            "_warnings": { "type": "array" }
        },
        "required": ["version"]
    });

    if let Ok(json) = serde_json::to_string_pretty(&schema) {
        println!("{}", json);
        0
    } else {
        eprintln!("Error: Failed to serialize schema");
        2
    }
}

/// Handle default run mode (manifest hashing).
fn handle_run_mode(cli: cli::Cli) -> u8 {
    use cli::exit::Outcome;
    use output::jsonl::write_jsonl;
    use pipeline::filter::PathFilter;
    use pipeline::hasher::is_skipped_record;
    use pipeline::parallel::{ParallelOptions, process_parallel};
    use preprocess::CancellationToken;
    use progress::reporter::{ProgressTracker, report_progress, report_warning_code};

    let file_config = match load_file_config(&cli) {
        Ok(config) => config,
        Err(refusal) => {
            output_refusal_envelope(&refusal);
            return Outcome::Refusal.exit_code();
        }
    };
    let settings = config::RunSettings::resolve(&cli, file_config);
    warn_on_clamped_settings(&settings);

    let filter = match PathFilter::new(&settings.include, &settings.exclude) {
        Ok(filter) => filter,
        Err(error) => {
            output_refusal_envelope(&build_bad_config_refusal("--include/--exclude", error));
            return Outcome::Refusal.exit_code();
        }
    };

    let records = match read_input_records(&cli.input) {
        Ok(records) => records,
        Err(refusal) => {
            output_refusal_envelope(&refusal);
            return Outcome::Refusal.exit_code();
        }
    };
    let input_label = cli
        .input
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdin".to_owned());

    let token = CancellationToken::new();
    if settings.timeout.is_some_and(|timeout| timeout.is_zero()) {
        token.cancel();
    } else if let Some(timeout) = settings.timeout
        && let Err(error) = token.cancel_after(timeout)
    {
        report_warning_code(
            &input_label,
            Some("W_TIMER"),
            &format!("failed to start timeout timer, running without it: {error}"),
        );
    }

    let options = ParallelOptions {
        jobs: settings.jobs,
        max_preprocessed: settings.max_preprocessed,
        cancellation: Some(token),
    };
    let mut tracker = ProgressTracker::new(
        settings.progress,
        settings.progress_every,
        Some(records.len() as u64),
    );

    let outcome = process_parallel(records, filter, &options, |_| {
        if let Some(event) = tracker.record() {
            report_progress(&event);
        }
    });
    let processed = tracker.processed();
    if let Some(event) = tracker.finish() {
        report_progress(&event);
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(error) => {
            output_refusal_envelope(&build_pipeline_fault_refusal(error, processed));
            return Outcome::Refusal.exit_code();
        }
    };

    let mut run_outcome = Outcome::AllHashed;
    if outcome.cancelled && outcome.unprocessed > 0 {
        report_warning_code(
            &input_label,
            Some("W_CANCELLED"),
            &format!(
                "run cancelled after {} of {} records; {} not processed",
                outcome.records.len() - outcome.unprocessed,
                outcome.records.len(),
                outcome.unprocessed
            ),
        );
        run_outcome = Outcome::Partial;
    }
    if outcome.records.iter().any(is_skipped_record) {
        run_outcome = Outcome::Partial;
    }

    let mut stdout = std::io::stdout();
    if let Err(error) = write_jsonl(&mut stdout, &outcome.records) {
        eprintln!("Error writing output: {}", error);
        return Outcome::Refusal.exit_code();
    }

    run_outcome.exit_code()
}

/// Load the YAML config named by --config or $PRISM_CONFIG, if any.
fn load_file_config(cli: &cli::Cli) -> Result<config::FileConfig, refusal::RefusalEnvelope> {
    let Some(path) = config::config_path(cli.config.as_deref()) else {
        return Ok(config::FileConfig::default());
    };
    config::load(&path)
        .map_err(|error| build_bad_config_refusal(&path.display().to_string(), error))
}

fn warn_on_clamped_settings(settings: &config::RunSettings) {
    use progress::reporter::report_warning_code;

    if settings.jobs == 0 {
        report_warning_code("-", Some("W_CLAMPED"), "jobs 0 clamped to 1 worker");
    }
    if settings.max_preprocessed == 0 {
        return;
    }
    if settings.max_preprocessed < settings.jobs {
        report_warning_code(
            "-",
            Some("W_IDLE_WORKERS"),
            &format!(
                "max_preprocessed {} is below jobs {}; some workers will idle",
                settings.max_preprocessed, settings.jobs
            ),
        );
    }
}

fn build_bad_config_refusal(source: &str, error: impl Into<String>) -> refusal::RefusalEnvelope {
    use refusal::codes::{BadConfigDetail, RefusalCode, RefusalDetail, build_envelope};

    build_envelope(
        RefusalCode::BadConfig,
        "Invalid configuration",
        RefusalDetail::BadConfig(BadConfigDetail {
            source: source.to_owned(),
            error: error.into(),
        }),
        Some("Fix the config file or flags and rerun prism".to_owned()),
    )
}

fn build_bad_input_refusal(line: usize, error: impl Into<String>) -> refusal::RefusalEnvelope {
    use refusal::codes::{BadInputDetail, RefusalCode, RefusalDetail, build_envelope};

    build_envelope(
        RefusalCode::BadInput,
        "Invalid input stream",
        RefusalDetail::BadInput(BadInputDetail {
            line,
            error: error.into(),
        }),
        Some("prism --schema".to_owned()),
    )
}

fn build_pipeline_fault_refusal(error: String, processed: u64) -> refusal::RefusalEnvelope {
    use refusal::codes::{PipelineFaultDetail, RefusalCode, RefusalDetail, build_envelope};

    build_envelope(
        RefusalCode::PipelineFault,
        "Preprocessing pipeline failed",
        RefusalDetail::PipelineFault(PipelineFaultDetail { error, processed }),
        Some("Rerun with --jobs 1 to isolate the failing record".to_owned()),
    )
}

/// Output a refusal envelope to stdout.
fn output_refusal_envelope(refusal: &refusal::RefusalEnvelope) {
    let mut stdout = std::io::stdout();
    if let Err(error) = output::jsonl::write_record(&mut stdout, refusal) {
        eprintln!("Error writing refusal: {}", error);
    }
}

/// Read input records from file or stdin.
fn read_input_records(
    input_path: &Option<std::path::PathBuf>,
) -> Result<Vec<serde_json::Value>, refusal::RefusalEnvelope> {
    use pipeline::reader::read_records;
    use std::fs::File;
    use std::io::{self, BufReader};

    match input_path {
        Some(path) => {
            let file = File::open(path).map_err(|error| {
                build_bad_input_refusal(
                    0,
                    format!("Failed to open input file '{}': {}", path.display(), error),
                )
            })?;
            let mut reader = BufReader::new(file);
            read_records(&mut reader)
                .map_err(|error| build_bad_input_refusal(error.line, error.message))
        }
        None => {
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            read_records(&mut reader)
                .map_err(|error| build_bad_input_refusal(error.line, error.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{build_bad_config_refusal, build_bad_input_refusal, build_pipeline_fault_refusal};
    use crate::refusal::codes::RefusalCode;

    #[test]
    fn bad_input_refusal_carries_line() {
        let refusal = build_bad_input_refusal(4, "invalid JSON: expected value");
        assert_eq!(refusal.refusal.code, RefusalCode::BadInput);
        assert_eq!(refusal.refusal.detail["line"], 4);
        assert_eq!(refusal.outcome, "REFUSAL");
    }

    #[test]
    fn bad_config_refusal_names_source() {
        let refusal = build_bad_config_refusal("/etc/prism.yaml", "unknown field `threads`");
        assert_eq!(refusal.refusal.code, RefusalCode::BadConfig);
        assert_eq!(refusal.refusal.detail["source"], "/etc/prism.yaml");
    }

    #[test]
    fn pipeline_fault_refusal_reports_progress() {
        let refusal = build_pipeline_fault_refusal("source iterator panicked: x".to_owned(), 12);
        assert_eq!(refusal.refusal.code, RefusalCode::PipelineFault);
        assert_eq!(refusal.refusal.detail["processed"], 12);
        assert_eq!(
            refusal.refusal.next_command.as_deref(),
            Some("Rerun with --jobs 1 to isolate the failing record")
        );
    }
}
