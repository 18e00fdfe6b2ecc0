use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// Write JSONL records to an output stream (one JSON object per line).
pub fn write_jsonl(out: &mut dyn Write, records: &[Value]) -> Result<(), String> {
    for record in records {
        write_line(out, record)?;
    }

    out.flush()
        .map_err(|error| format!("failed to flush JSONL output: {error}"))?;

    Ok(())
}

/// Write one serializable value as a single JSONL line and flush.
pub fn write_record<T: Serialize>(out: &mut dyn Write, record: &T) -> Result<(), String> {
    write_line(out, record)?;
    out.flush()
        .map_err(|error| format!("failed to flush JSONL output: {error}"))
}

fn write_line<T: Serialize + ?Sized>(out: &mut dyn Write, record: &T) -> Result<(), String> {
    serde_json::to_writer(&mut *out, record)
        .map_err(|error| format!("failed to serialize JSON record: {error}"))?;
    out.write_all(b"\n")
        .map_err(|error| format!("failed to write JSONL newline: {error}"))
}
