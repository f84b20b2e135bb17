use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Which wrapping a collection arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `[...]`
    Bare,
    /// `{"data": [...]}`
    Data,
    /// `{"data": {"data": [...]}}`
    NestedData,
    /// `null` or a missing key.
    Absent,
    /// Anything else. Decoded as empty.
    Unrecognized,
}

/// Known collection envelopes, tried top to bottom.
///
/// The order matters: `untagged` picks the first variant that decodes, and a
/// `{"data": {...}}` object must not be mistaken for the flat `Data` shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Bare(Vec<Value>),
    Data { data: Vec<Value> },
    NestedData { data: DataList },
}

#[derive(Debug, Deserialize)]
struct DataList {
    data: Vec<Value>,
}

/// Unwrap a collection that the upstream API may deliver as a bare list, a
/// `data`-keyed object, or a doubly `data`-keyed object. Unknown shapes yield
/// an empty list rather than an error.
pub fn unwrap_collection(v: Value) -> (EnvelopeShape, Vec<Value>) {
    if v.is_null() {
        return (EnvelopeShape::Absent, Vec::new());
    }

    match serde_json::from_value::<Envelope>(v.clone()) {
        Ok(Envelope::Bare(items)) => (EnvelopeShape::Bare, items),
        Ok(Envelope::Data { data }) => (EnvelopeShape::Data, data),
        Ok(Envelope::NestedData { data }) => (EnvelopeShape::NestedData, data.data),
        Err(e) => {
            let sample = v.to_string();
            let sample = &sample[..floor_char_boundary(&sample, 200)];
            warn!("[ENVELOPE] unrecognized collection shape ({e}): {sample}");
            (EnvelopeShape::Unrecognized, Vec::new())
        }
    }
}

/// Same as [`unwrap_collection`] but for a key that may be missing on `parent`.
pub fn collection_at(parent: &Value, key: &str) -> Vec<Value> {
    let (shape, items) = match parent.get(key) {
        Some(v) => unwrap_collection(v.clone()),
        None => (EnvelopeShape::Absent, Vec::new()),
    };
    debug!(key, ?shape, count = items.len(), "[ENVELOPE] collection unwrapped");
    items
}

/// A single object, either bare or wrapped as `{"data": {...}}`.
pub fn unwrap_object(v: &Value) -> Option<&Value> {
    match v.get("data") {
        Some(inner) if inner.is_object() => Some(inner),
        _ if v.is_object() => Some(v),
        _ => None,
    }
}

/// Integer field that may arrive as a JSON number or a numeric string.
pub fn lenient_i64(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Non-empty string field.
pub fn non_empty_str(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Value {
        json!([{"id": 1}, {"id": 2}])
    }

    #[test]
    fn bare_list() {
        let (shape, out) = unwrap_collection(items());
        assert_eq!(shape, EnvelopeShape::Bare);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn data_wrapped() {
        let (shape, out) = unwrap_collection(json!({"data": items()}));
        assert_eq!(shape, EnvelopeShape::Data);
        assert_eq!(out, items().as_array().unwrap().clone());
    }

    #[test]
    fn nested_data_wrapped() {
        let (shape, out) = unwrap_collection(json!({"data": {"data": items()}}));
        assert_eq!(shape, EnvelopeShape::NestedData);
        assert_eq!(out, items().as_array().unwrap().clone());
    }

    #[test]
    fn extra_keys_beside_data_are_ignored() {
        let v = json!({"data": items(), "pagination": {"count": 2}, "timezone": "UTC"});
        let (shape, out) = unwrap_collection(v);
        assert_eq!(shape, EnvelopeShape::Data);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unknown_shapes_are_empty() {
        for v in [json!({"fixtures": []}), json!("nope"), json!(42), json!({"data": "x"})] {
            let (shape, out) = unwrap_collection(v);
            assert_eq!(shape, EnvelopeShape::Unrecognized);
            assert!(out.is_empty());
        }
    }

    #[test]
    fn null_is_absent() {
        let (shape, out) = unwrap_collection(Value::Null);
        assert_eq!(shape, EnvelopeShape::Absent);
        assert!(out.is_empty());
    }

    #[test]
    fn collection_at_missing_key() {
        assert!(collection_at(&json!({"id": 1}), "participants").is_empty());
        assert_eq!(collection_at(&json!({"participants": {"data": items()}}), "participants").len(), 2);
    }

    #[test]
    fn lenient_ints() {
        assert_eq!(lenient_i64(&json!(18_535_517)), Some(18_535_517));
        assert_eq!(lenient_i64(&json!(" 42 ")), Some(42));
        assert_eq!(lenient_i64(&json!("abc")), None);
        assert_eq!(lenient_i64(&json!(1.5)), None);
    }

    #[test]
    fn unwrap_object_handles_both_forms() {
        let league = json!({"id": 8, "name": "Premier League"});
        assert_eq!(unwrap_object(&league), Some(&league));
        let wrapped = json!({"data": league.clone()});
        assert_eq!(unwrap_object(&wrapped), Some(&league));
        assert_eq!(unwrap_object(&json!([1, 2])), None);
    }
}
