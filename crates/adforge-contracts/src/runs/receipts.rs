use std::path::Path;

use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Diagnostic record for one of the seven upstream calls in a batch: the
/// copy slot or one of the six image slots.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRecord {
    pub slot: String,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub latency_s: f64,
}

pub fn build_receipt(
    request: &Value,
    slots: &[SlotRecord],
    warnings: &[String],
    manifest_path: &Path,
    receipt_path: &Path,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert("request".to_string(), sanitize_payload(request));

    let slot_rows: Vec<Value> = slots
        .iter()
        .map(|record| {
            let mut row = Map::new();
            row.insert("slot".to_string(), Value::String(record.slot.clone()));
            row.insert(
                "provider_request".to_string(),
                sanitize_payload(&Value::Object(record.provider_request.clone())),
            );
            row.insert(
                "provider_response".to_string(),
                sanitize_payload(&Value::Object(record.provider_response.clone())),
            );
            row.insert(
                "latency_s".to_string(),
                serde_json::Number::from_f64(record.latency_s)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            );
            Value::Object(row)
        })
        .collect();
    root.insert("slots".to_string(), Value::Array(slot_rows));

    root.insert(
        "warnings".to_string(),
        Value::Array(warnings.iter().cloned().map(Value::String).collect()),
    );

    let mut artifacts = Map::new();
    artifacts.insert(
        "manifest_path".to_string(),
        Value::String(manifest_path.to_string_lossy().to_string()),
    );
    artifacts.insert(
        "receipt_path".to_string(),
        Value::String(receipt_path.to_string_lossy().to_string()),
    );
    root.insert("artifacts".to_string(), Value::Object(artifacts));

    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

/// Inline image bodies never belong in a receipt; any key that carries one
/// is replaced with a marker.
fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(lowered.as_str(), "data" | "b64_json" | "image" | "bytes") {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}
