use serde_json::Value;

use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnWidth {
    Narrow,
    Wide,
}

/// Where the cells of a column come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    Field(String),
    Message,
    Key,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub source: ColumnSource,
    pub name: String,
    pub width: ColumnWidth,
}

impl ColumnSpec {
    fn synthetic(source: ColumnSource, name: &str, width: ColumnWidth) -> Self {
        Self {
            source,
            name: name.to_string(),
            width,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match &self.source {
            ColumnSource::Field(f) => Some(f),
            _ => None,
        }
    }
}

pub type ColumnSet = Vec<ColumnSpec>;

/// First letter upper case, the rest lower case. `deleted_count` -> `Deleted_count`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

pub fn message_columns() -> ColumnSet {
    vec![ColumnSpec::synthetic(
        ColumnSource::Message,
        "Message",
        ColumnWidth::Wide,
    )]
}

fn columns_from_record(
    record: &serde_json::Map<String, Value>,
    large_payload: &[String],
) -> ColumnSet {
    record
        .keys()
        .map(|key| ColumnSpec {
            source: ColumnSource::Field(key.clone()),
            name: capitalize(key),
            width: if large_payload.iter().any(|f| f == key) {
                ColumnWidth::Wide
            } else {
                ColumnWidth::Narrow
            },
        })
        .collect()
}

/// Derive the column set for a shape. The first record of a list fixes the schema.
pub fn infer(shape: &Shape, large_payload: &[String]) -> ColumnSet {
    match shape {
        Shape::EmptyList | Shape::Failure { .. } => message_columns(),
        Shape::RecordList(items) => match items.first() {
            Some(Value::Object(first)) => columns_from_record(first, large_payload),
            _ => message_columns(),
        },
        Shape::StatusObject { .. } => vec![
            ColumnSpec::synthetic(ColumnSource::Key, "Key", ColumnWidth::Narrow),
            ColumnSpec::synthetic(ColumnSource::Value, "Value", ColumnWidth::Wide),
        ],
        Shape::SingleRecord(record) => columns_from_record(record, large_payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::classify;
    use serde_json::json;

    fn names(columns: &ColumnSet) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn first_record_defines_columns() {
        let shape = classify(&json!([{"a": 1, "b": 2}, {"a": 3, "c": 4}]));
        let columns = infer(&shape, &[]);
        assert_eq!(names(&columns), vec!["A", "B"]);
        assert_eq!(columns[0].field(), Some("a"));
    }

    #[test]
    fn insertion_order_is_kept() {
        let shape = classify(&json!({"zeta": 1, "alpha": 2, "mid": 3}));
        assert_eq!(names(&infer(&shape, &[])), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn degenerate_shapes_get_message_column() {
        for value in [json!([]), json!([1, 2, 3]), json!(["x"])] {
            let columns = infer(&classify(&value), &[]);
            assert_eq!(names(&columns), vec!["Message"]);
        }
        let failure = Shape::Failure {
            status: 502,
            raw_text: "bad gateway".into(),
        };
        assert_eq!(names(&infer(&failure, &[])), vec!["Message"]);
    }

    #[test]
    fn status_object_is_key_value() {
        let columns = infer(&classify(&json!({"error": "X"})), &[]);
        assert_eq!(names(&columns), vec!["Key", "Value"]);
    }

    #[test]
    fn large_payload_columns_are_wide() {
        let shape = classify(&json!([{"address": "x", "image": "iVBOR"}]));
        let columns = infer(&shape, &["image".to_string()]);
        assert_eq!(columns[0].width, ColumnWidth::Narrow);
        assert_eq!(columns[1].width, ColumnWidth::Wide);
    }

    #[test]
    fn capitalize_lowers_the_rest() {
        assert_eq!(capitalize("deleted_count"), "Deleted_count");
        assert_eq!(capitalize("roomData"), "Roomdata");
        assert_eq!(capitalize("_id"), "_id");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn inference_is_pure() {
        let shape = classify(&json!([{"x": 1}]));
        assert_eq!(infer(&shape, &[]), infer(&shape, &[]));
    }
}
