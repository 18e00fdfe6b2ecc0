use crate::pipeline::filter::PathFilter;
use crate::pipeline::hasher::{hash_record, skip_record};
use crate::preprocess::{CancellationToken, PipelineState, PreprocessConfig, preprocess};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Worker settings for one manifest run.
#[derive(Debug, Clone, Default)]
pub struct ParallelOptions {
    pub jobs: usize,
    /// 0 means one in-flight record per job.
    pub max_preprocessed: usize,
    pub cancellation: Option<CancellationToken>,
}

/// Every manifest row in manifest order. After cancellation the rows no
/// worker reached are skipped records carrying a `W_CANCELLED` warning.
#[derive(Debug)]
pub struct ParallelOutcome {
    pub records: Vec<Value>,
    pub cancelled: bool,
    pub unprocessed: usize,
}

/// Hash every manifest record on the preprocessing workers, emitting in input order.
///
/// `on_record` runs on the calling thread once per finished record, in
/// completion order.
pub fn process_parallel<C>(
    records: Vec<Value>,
    filter: PathFilter,
    options: &ParallelOptions,
    on_record: C,
) -> Result<ParallelOutcome, String>
where
    C: FnMut(&Value),
{
    process_parallel_with(
        records,
        options,
        move |record| {
            let path = record.get("path").and_then(Value::as_str).unwrap_or("");
            if filter.allows(path) {
                hash_record(&record)
            } else {
                skip_record(&record, "W_FILTERED", "path excluded by include/exclude globs")
            }
        },
        on_record,
    )
}

fn process_parallel_with<F, C>(
    records: Vec<Value>,
    options: &ParallelOptions,
    process: F,
    mut on_record: C,
) -> Result<ParallelOutcome, String>
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
    C: FnMut(&Value),
{
    let mut config = PreprocessConfig::new(options.jobs, options.max_preprocessed);
    if let Some(token) = &options.cancellation {
        config = config.with_cancellation(token.clone());
    }

    let records = Arc::new(records);
    let records_for_workers = Arc::clone(&records);
    let mut run = preprocess(
        0..records.len(),
        move |index| (index, process(records_for_workers[index].clone())),
        config,
    )
    .map_err(|error| error.to_string())?;

    let mut finished = BTreeMap::new();
    for outcome in run.by_ref() {
        let (index, record) = outcome.map_err(|error| error.to_string())?;
        on_record(&record);
        finished.insert(index, record);
    }

    let cancelled = run.state() == PipelineState::Cancelled;
    let unprocessed = records.len() - finished.len();
    // rows the workers never reached stay in the output as cancelled skips
    let ordered = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            finished.remove(&index).unwrap_or_else(|| {
                skip_record(
                    record,
                    "W_CANCELLED",
                    "run cancelled before this record was processed",
                )
            })
        })
        .collect();

    Ok(ParallelOutcome {
        records: ordered,
        cancelled,
        unprocessed,
    })
}
