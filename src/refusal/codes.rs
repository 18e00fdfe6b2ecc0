use serde::Serialize;
use serde_json::Value;

pub const OUTPUT_VERSION: &str = "prism.v0";

/// Refusal codes emitted with exit code 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefusalCode {
    /// Unreadable manifest, invalid JSONL, or a record without `path`.
    #[serde(rename = "E_BAD_INPUT")]
    BadInput,
    /// Config file unreadable, malformed, or holding an invalid glob.
    #[serde(rename = "E_BAD_CONFIG")]
    BadConfig,
    /// The preprocessing pipeline could not start or a worker failed.
    #[serde(rename = "E_PIPELINE_FAULT")]
    PipelineFault,
}

/// Refusal envelope printed to stdout as a single JSON line.
#[derive(Debug, Serialize)]
pub struct RefusalEnvelope {
    pub version: String,
    pub outcome: String,
    pub refusal: RefusalBody,
}

#[derive(Debug, Serialize)]
pub struct RefusalBody {
    pub code: RefusalCode,
    pub message: String,
    pub detail: Value,
    pub next_command: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RefusalDetail {
    BadInput(BadInputDetail),
    BadConfig(BadConfigDetail),
    PipelineFault(PipelineFaultDetail),
}

#[derive(Debug, Serialize)]
pub struct BadInputDetail {
    /// 1-based manifest line, or 0 when the failure is not tied to a line.
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BadConfigDetail {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct PipelineFaultDetail {
    pub error: String,
    pub processed: u64,
}

pub fn build_envelope(
    code: RefusalCode,
    message: &str,
    detail: RefusalDetail,
    next_command: Option<String>,
) -> RefusalEnvelope {
    RefusalEnvelope {
        version: OUTPUT_VERSION.to_owned(),
        outcome: "REFUSAL".to_owned(),
        refusal: RefusalBody {
            code,
            message: message.to_owned(),
            detail: serde_json::to_value(detail).unwrap_or(Value::Null),
            next_command,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{BadConfigDetail, BadInputDetail, RefusalCode, RefusalDetail, build_envelope};
    use serde_json::json;

    #[test]
    fn bad_input_envelope_serializes_flat_detail() {
        let envelope = build_envelope(
            RefusalCode::BadInput,
            "Invalid input stream",
            RefusalDetail::BadInput(BadInputDetail {
                line: 3,
                error: "record is missing string field 'path'".to_owned(),
            }),
            Some("prism --schema".to_owned()),
        );

        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize envelope"),
            json!({
                "version": "prism.v0",
                "outcome": "REFUSAL",
                "refusal": {
                    "code": "E_BAD_INPUT",
                    "message": "Invalid input stream",
                    "detail": { "line": 3, "error": "record is missing string field 'path'" },
                    "next_command": "prism --schema"
                }
            })
        );
    }

    #[test]
    fn bad_config_code_uses_wire_name() {
        let envelope = build_envelope(
            RefusalCode::BadConfig,
            "Invalid configuration",
            RefusalDetail::BadConfig(BadConfigDetail {
                source: "prism.yaml".to_owned(),
                error: "unknown field `threads`".to_owned(),
            }),
            None,
        );

        assert_eq!(envelope.refusal.code, RefusalCode::BadConfig);
        assert_eq!(envelope.refusal.detail["source"], "prism.yaml");
        let value = serde_json::to_value(&envelope).expect("serialize envelope");
        assert_eq!(value["refusal"]["code"], "E_BAD_CONFIG");
        assert!(value["refusal"]["next_command"].is_null());
    }
}
