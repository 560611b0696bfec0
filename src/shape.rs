use serde_json::{Map, Value};
use tracing::trace;

/// Keys that mark a mapping as a status/error object, in routing order.
pub const STATUS_KEYS: [&str; 4] = ["error", "message", "id", "deleted_count"];

pub type Record = Map<String, Value>;

/// Classified category of a decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    EmptyList,
    RecordList(Vec<Value>),
    StatusObject { routed_by: &'static str, entries: Record },
    SingleRecord(Record),
    /// Body could not be decoded as JSON. Terminal.
    Failure { status: u16, raw_text: String },
}

impl Shape {
    pub fn label(&self) -> &'static str {
        match self {
            Shape::EmptyList => "empty list",
            Shape::RecordList(_) => "record list",
            Shape::StatusObject { .. } => "status object",
            Shape::SingleRecord(_) => "single record",
            Shape::Failure { .. } => "failure",
        }
    }
}

pub fn classify(value: &Value) -> Shape {
    let shape = match value {
        Value::Array(items) if items.is_empty() => Shape::EmptyList,
        Value::Array(items) => Shape::RecordList(items.clone()),
        Value::Object(map) => match STATUS_KEYS.iter().find(|k| map.contains_key(**k)) {
            Some(key) => Shape::StatusObject {
                routed_by: *key,
                entries: map.clone(),
            },
            None => Shape::SingleRecord(map.clone()),
        },
        // A bare scalar has no tabular reading, show it like an undecodable body.
        other => Shape::Failure {
            status: 200,
            raw_text: other.to_string(),
        },
    };
    trace!("Classified response as {}", shape.label());
    shape
}

/// Decode a raw response body and classify it. Decode failures end in `Shape::Failure`.
pub fn classify_body(status: u16, body: &str) -> Shape {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match classify(&value) {
            Shape::Failure { raw_text, .. } => Shape::Failure { status, raw_text },
            shape => shape,
        },
        Err(e) => {
            trace!("Body is not JSON ({e}), falling back to failure shape");
            Shape::Failure {
                status,
                raw_text: body.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_filled_lists() {
        assert_eq!(classify(&json!([])), Shape::EmptyList);
        let shape = classify(&json!([{"a": 1}, {"a": 2}]));
        match shape {
            Shape::RecordList(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn status_keys_route_in_order() {
        let shape = classify(&json!({"message": "Item updated", "error": "X"}));
        match shape {
            Shape::StatusObject { routed_by, entries } => {
                assert_eq!(routed_by, "error");
                assert_eq!(entries.len(), 2);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!(matches!(
            classify(&json!({"deleted_count": 3})),
            Shape::StatusObject { routed_by: "deleted_count", .. }
        ));
    }

    #[test]
    fn plain_mapping_is_single_record() {
        let shape = classify(&json!({"_id": "abc", "address": "Main St"}));
        assert!(matches!(shape, Shape::SingleRecord(_)));
    }

    #[test]
    fn undecodable_body_is_failure() {
        let shape = classify_body(500, "<html>Internal Server Error</html>");
        assert_eq!(
            shape,
            Shape::Failure {
                status: 500,
                raw_text: "<html>Internal Server Error</html>".to_string()
            }
        );
    }

    #[test]
    fn scalar_body_keeps_status() {
        assert_eq!(
            classify_body(404, "\"nope\""),
            Shape::Failure {
                status: 404,
                raw_text: "\"nope\"".to_string()
            }
        );
    }

    #[test]
    fn classification_is_pure() {
        let value = json!([{"b": 1, "a": 2}]);
        assert_eq!(classify(&value), classify(&value));
    }
}
