use crate::progress::reporter::report_warning;
use crate::refusal::codes::OUTPUT_VERSION;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Warning entry for the `_warnings` array of an output record.
#[derive(Debug, Clone, serde::Serialize)]
struct Warning {
    tool: String,
    code: String,
    message: String,
    detail: Value,
}

impl Warning {
    fn new(code: impl Into<String>, message: impl Into<String>, detail: Value) -> Self {
        Self {
            tool: "prism".to_owned(),
            code: code.into(),
            message: message.into(),
            detail,
        }
    }
}

/// Stream a file through BLAKE3. Returns `blake3:<hex>` and the byte count.
pub fn hash_file(path: &Path) -> Result<(String, u64), String> {
    let file = File::open(path)
        .map_err(|error| format!("failed to open '{}': {error}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let size = io::copy(&mut reader, &mut hasher)
        .map_err(|error| format!("failed to read '{}': {error}", path.display()))?;
    Ok((format!("blake3:{}", hasher.finalize().to_hex()), size))
}

/// Hash the file a manifest record points at and return the enriched record.
///
/// Per-file failures never fail the run: the record comes back marked
/// `_skipped` with an `E_IO` warning.
pub fn hash_record(record: &Value) -> Value {
    let Some(fields) = record.as_object() else {
        return create_error_record("E_BAD_INPUT", "Record is not a JSON object");
    };

    let mut enriched = fields.clone();
    stamp_version(&mut enriched);

    if is_skipped_record(record) {
        return Value::Object(enriched);
    }

    let path_str = record.get("path").and_then(Value::as_str).unwrap_or("");
    if path_str.is_empty() {
        let warning = Warning::new(
            "E_BAD_INPUT",
            "Record has no path",
            json!({ "path": Value::Null }),
        );
        return mark_skipped(enriched, warning);
    }

    match hash_file(Path::new(path_str)) {
        Ok((bytes_hash, size)) => {
            enriched.insert("bytes_hash".to_owned(), Value::String(bytes_hash));
            enriched.insert("size".to_owned(), Value::from(size));
            Value::Object(enriched)
        }
        Err(error) => {
            report_warning(path_str, &format!("skipped: {error}"));
            let warning = Warning::new(
                "E_IO",
                format!("Cannot hash file: {error}"),
                json!({ "path": path_str, "error": error }),
            );
            mark_skipped(enriched, warning)
        }
    }
}

/// Pass a record through untouched except for a skip marker and warning.
pub fn skip_record(record: &Value, code: &str, message: &str) -> Value {
    let Some(fields) = record.as_object() else {
        return create_error_record("E_BAD_INPUT", "Record is not a JSON object");
    };
    let mut enriched = fields.clone();
    stamp_version(&mut enriched);
    let path = record.get("path").cloned().unwrap_or(Value::Null);
    mark_skipped(enriched, Warning::new(code, message, json!({ "path": path })))
}

pub fn is_skipped_record(record: &Value) -> bool {
    record
        .get("_skipped")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn stamp_version(fields: &mut Map<String, Value>) {
    fields.insert(
        "version".to_owned(),
        Value::String(OUTPUT_VERSION.to_owned()),
    );

    let tool_versions = fields
        .entry("tool_versions".to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !tool_versions.is_object() {
        *tool_versions = Value::Object(Map::new());
    }
    if let Some(versions) = tool_versions.as_object_mut() {
        versions.insert(
            "prism".to_owned(),
            Value::String(env!("CARGO_PKG_VERSION").to_owned()),
        );
    }
}

fn mark_skipped(mut fields: Map<String, Value>, warning: Warning) -> Value {
    fields.insert("_skipped".to_owned(), Value::Bool(true));
    let warning = serde_json::to_value(warning).unwrap_or(Value::Null);
    match fields.get_mut("_warnings").and_then(Value::as_array_mut) {
        Some(warnings) => warnings.push(warning),
        None => {
            fields.insert("_warnings".to_owned(), Value::Array(vec![warning]));
        }
    }
    Value::Object(fields)
}

fn create_error_record(code: &str, message: &str) -> Value {
    json!({
        "version": OUTPUT_VERSION,
        "_skipped": true,
        "_warnings": [Warning::new(code, message, Value::Null)]
    })
}
