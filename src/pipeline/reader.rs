use serde_json::Value;
use std::fmt;
use std::io::BufRead;

/// A manifest line that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    /// 1-based line number, 0 when the stream itself failed before any line.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Read JSONL manifest records. Blank lines are skipped; every other line
/// must be a JSON object with a string `path`.
pub fn read_records(input: &mut dyn BufRead) -> Result<Vec<Value>, ReadError> {
    let mut records = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|error| ReadError {
            line: line_number,
            message: format!("failed to read line: {error}"),
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Value = serde_json::from_str(&line).map_err(|error| ReadError {
            line: line_number,
            message: format!("invalid JSON: {error}"),
        })?;
        if !record.is_object() {
            return Err(ReadError {
                line: line_number,
                message: "record is not a JSON object".to_owned(),
            });
        }
        if record.get("path").and_then(Value::as_str).is_none() {
            return Err(ReadError {
                line: line_number,
                message: "record is missing string field 'path'".to_owned(),
            });
        }

        records.push(record);
    }

    Ok(records)
}
