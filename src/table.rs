use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{debug, trace};

use crate::domain::TVConfig;
use crate::schema::{ColumnSet, ColumnSource, ColumnWidth, capitalize, infer, message_columns};
use crate::shape::{Record, Shape};

pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const EMPTY_LIST_MESSAGE: &str = "No items found";
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid data format";

// Shared by all tables, so a handle never resolves in a table it did not come from.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Opaque handle from a rendered row into the table's record arena.
/// Only valid for the render cycle that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle {
    generation: u64,
    index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub cells: Vec<String>,
    pub handle: Option<RowHandle>,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub large_payload_fields: Vec<String>,
    pub truncate_len: usize,
    pub max_column_width: usize,
    pub wide_column_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions::from(&TVConfig::default())
    }
}

impl From<&TVConfig> for RenderOptions {
    fn from(cfg: &TVConfig) -> Self {
        Self {
            large_payload_fields: cfg.large_payload_fields.clone(),
            truncate_len: cfg.truncate_len,
            max_column_width: cfg.max_column_width,
            wide_column_width: cfg.wide_column_width,
        }
    }
}

/// A column slice handed to the UI for drawing.
#[derive(Clone, Debug)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Rows and columns of one render cycle plus the arena of untruncated records.
#[derive(Debug, Default)]
pub struct RenderedTable {
    columns: ColumnSet,
    rows: Vec<RenderedRow>,
    records: Vec<Record>,
    generation: u64,
}

/// Stringify a cell. Strings are shown bare, everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clip(text: String, len: usize) -> String {
    if text.chars().count() > len {
        text.chars().take(len).collect()
    } else {
        text
    }
}

impl RenderedTable {
    pub fn from_shape(shape: &Shape, opts: &RenderOptions) -> Self {
        let mut table = RenderedTable::default();
        table.render(shape, opts);
        table
    }

    /// A single-column table holding one message row.
    pub fn message(text: impl Into<String>) -> Self {
        let mut table = RenderedTable::default();
        table.columns = message_columns();
        table.push_message(text.into());
        table
    }

    fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.records.clear();
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    }

    /// Rebuild the table from scratch for a new shape.
    pub fn render(&mut self, shape: &Shape, opts: &RenderOptions) {
        self.clear();
        self.columns = infer(shape, &opts.large_payload_fields);

        match shape {
            Shape::EmptyList => self.push_message(EMPTY_LIST_MESSAGE.to_string()),
            Shape::Failure { status, raw_text } => {
                self.push_message(format!("Error: {status} - {raw_text}"))
            }
            Shape::RecordList(items) => {
                if !matches!(items.first(), Some(Value::Object(_))) {
                    self.push_message(INVALID_FORMAT_MESSAGE.to_string());
                } else {
                    for item in items {
                        match item {
                            Value::Object(record) => self.push_record(record.clone(), opts),
                            other => {
                                debug!("Skipping cells of non-record list element {other}");
                                self.rows.push(RenderedRow {
                                    cells: vec![String::new(); self.columns.len()],
                                    handle: None,
                                });
                            }
                        }
                    }
                }
            }
            Shape::StatusObject { entries, .. } => {
                for (key, value) in entries {
                    self.rows.push(RenderedRow {
                        cells: vec![capitalize(key), display_value(value)],
                        handle: None,
                    });
                }
            }
            Shape::SingleRecord(record) => self.push_record(record.clone(), opts),
        }
        trace!(
            "Rendered {} as {} columns x {} rows",
            shape.label(),
            self.columns.len(),
            self.rows.len()
        );
    }

    fn push_message(&mut self, text: String) {
        self.rows.push(RenderedRow {
            cells: vec![text],
            handle: None,
        });
    }

    fn push_record(&mut self, record: Record, opts: &RenderOptions) {
        let cells = self
            .columns
            .iter()
            .map(|column| match &column.source {
                ColumnSource::Field(field) => {
                    let text = record.get(field).map(display_value).unwrap_or_default();
                    if opts.large_payload_fields.iter().any(|f| f == field) {
                        clip(text, opts.truncate_len)
                    } else {
                        text
                    }
                }
                _ => String::new(),
            })
            .collect();
        let handle = RowHandle {
            generation: self.generation,
            index: self.records.len(),
        };
        self.records.push(record);
        self.rows.push(RenderedRow {
            cells,
            handle: Some(handle),
        });
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn handle_at(&self, row: usize) -> Option<RowHandle> {
        self.rows.get(row).and_then(|r| r.handle)
    }

    pub fn lookup(&self, handle: RowHandle) -> Option<&Record> {
        if handle.generation != self.generation {
            return None;
        }
        self.records.get(handle.index)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.cells.get(column))
            .map(String::as_str)
    }

    fn column_width(&self, idx: usize, opts: &RenderOptions) -> usize {
        let Some(column) = self.columns.get(idx) else {
            return 0;
        };
        let content = self
            .rows
            .iter()
            .filter_map(|r| r.cells.get(idx))
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);
        let width = std::cmp::max(column.name.chars().count(), content) + COLUMN_WIDTH_MARGIN;
        match column.width {
            ColumnWidth::Narrow => std::cmp::min(width, opts.max_column_width),
            ColumnWidth::Wide => std::cmp::min(width, opts.wide_column_width),
        }
    }

    /// Column slices for the visible row window `[rbegin, rend)`.
    pub fn column_views(
        &self,
        rbegin: usize,
        rend: usize,
        opts: &RenderOptions,
    ) -> Vec<ColumnView> {
        let rend = std::cmp::min(rend, self.rows.len());
        let rbegin = std::cmp::min(rbegin, rend);
        self.columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| ColumnView {
                name: column.name.clone(),
                width: self.column_width(cidx, opts),
                data: self.rows[rbegin..rend]
                    .iter()
                    .map(|r| r.cells.get(cidx).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::classify;
    use serde_json::json;

    fn cells(table: &RenderedTable) -> Vec<Vec<&str>> {
        table
            .rows()
            .iter()
            .map(|r| r.cells.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn record_list_fills_missing_cells() {
        let table = RenderedTable::from_shape(
            &classify(&json!([{"a": 1, "b": 2}, {"a": 3}])),
            &RenderOptions::default(),
        );
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(cells(&table), vec![vec!["1", "2"], vec!["3", ""]]);
    }

    #[test]
    fn later_extra_keys_are_dropped() {
        let table = RenderedTable::from_shape(
            &classify(&json!([{"a": 1}, {"a": 2, "z": 9}])),
            &RenderOptions::default(),
        );
        assert_eq!(cells(&table), vec![vec!["1"], vec!["2"]]);
        // The arena still holds the whole record.
        let handle = table.handle_at(1).unwrap();
        assert_eq!(table.lookup(handle).unwrap().get("z"), Some(&json!(9)));
    }

    #[test]
    fn empty_list_renders_single_message() {
        let table = RenderedTable::from_shape(&classify(&json!([])), &RenderOptions::default());
        assert_eq!(table.columns().len(), 1);
        assert_eq!(cells(&table), vec![vec!["No items found"]]);
        assert_eq!(table.handle_at(0), None);
    }

    #[test]
    fn status_object_rows() {
        let table = RenderedTable::from_shape(
            &classify(&json!({"error": "X", "code": 7})),
            &RenderOptions::default(),
        );
        assert_eq!(cells(&table), vec![vec!["Error", "X"], vec!["Code", "7"]]);
    }

    #[test]
    fn failure_renders_status_and_text() {
        let shape = Shape::Failure {
            status: 500,
            raw_text: "boom".into(),
        };
        let table = RenderedTable::from_shape(&shape, &RenderOptions::default());
        assert_eq!(cells(&table), vec![vec!["Error: 500 - boom"]]);
    }

    #[test]
    fn malformed_first_element() {
        let table =
            RenderedTable::from_shape(&classify(&json!([1, {"a": 2}])), &RenderOptions::default());
        assert_eq!(cells(&table), vec![vec![INVALID_FORMAT_MESSAGE]]);
    }

    #[test]
    fn large_payload_is_clipped_but_record_is_not() {
        let image = "A".repeat(120);
        let table = RenderedTable::from_shape(
            &classify(&json!([{"address": "Elm St", "image": image.clone()}])),
            &RenderOptions::default(),
        );
        assert_eq!(table.cell(0, 1).unwrap().len(), 50);
        let record = table.lookup(table.handle_at(0).unwrap()).unwrap();
        assert_eq!(record["image"], json!(image));
    }

    #[test]
    fn rerender_replaces_everything() {
        let opts = RenderOptions::default();
        let mut table =
            RenderedTable::from_shape(&classify(&json!([{"a": 1}, {"a": 2}, {"a": 3}])), &opts);
        let old = table.handle_at(2).unwrap();
        table.render(&classify(&json!({"message": "Item deleted"})), &opts);
        assert_eq!(cells(&table), vec![vec!["Message", "Item deleted"]]);
        assert!(table.lookup(old).is_none());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn handles_do_not_survive_a_rerender() {
        let opts = RenderOptions::default();
        let mut table =
            RenderedTable::from_shape(&classify(&json!([{"a": "old"}, {"a": "old2"}])), &opts);
        let stale = table.handle_at(1).unwrap();
        table.render(&classify(&json!([{"a": "new"}, {"a": "new2"}])), &opts);
        assert!(table.lookup(stale).is_none());
        let fresh = table.handle_at(1).unwrap();
        assert_eq!(table.lookup(fresh).unwrap()["a"], json!("new2"));
    }

    #[test]
    fn handles_belong_to_their_table() {
        let opts = RenderOptions::default();
        let one = RenderedTable::from_shape(&classify(&json!([{"a": 1}])), &opts);
        let two = RenderedTable::from_shape(&classify(&json!([{"a": 2}])), &opts);
        assert!(two.lookup(one.handle_at(0).unwrap()).is_none());
    }

    #[test]
    fn column_views_window() {
        let opts = RenderOptions::default();
        let table = RenderedTable::from_shape(
            &classify(&json!([{"a": "x"}, {"a": "yy"}, {"a": "zzz"}])),
            &opts,
        );
        let views = table.column_views(1, 10, &opts);
        assert_eq!(views[0].data, vec!["yy", "zzz"]);
        assert_eq!(views[0].width, 4);
    }
}
