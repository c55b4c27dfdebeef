//! Request fingerprints.
//!
//! A fingerprint identifies a semantically unique generation request:
//! `"<model>.<128-bit blake3 digest, hex>"` over a canonical JSON encoding of
//! the prompt and output schema. Object keys are sorted during encoding, so
//! two descriptors that differ only in key order hash identically.

use serde_json::Value;

/// Digest length in bytes (128 bits).
const DIGEST_LEN: usize = 16;

/// Compute the fingerprint for a model, prompt and output schema descriptor.
pub fn fingerprint(model_id: &str, prompt: &str, schema: &Value) -> String {
    let mut payload = String::new();
    payload.push_str("{\"prompt\":");
    write_canonical(&mut payload, &Value::String(prompt.to_string()));
    payload.push_str(",\"schema\":");
    write_canonical(&mut payload, schema);
    payload.push('}');

    let digest = blake3::hash(payload.as_bytes());
    format!("{}.{}", model_id, hex::encode(&digest.as_bytes()[..DIGEST_LEN]))
}

/// Deterministic JSON encoding with lexicographically sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, &Value::String(key.clone()));
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(out, v);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        // Scalars have exactly one serde_json rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}
