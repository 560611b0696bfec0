use serde_json::Value;
use tracing::{debug, info, trace};

use crate::domain::TVConfig;
use crate::preview::{ImagePreview, decode_preview};
use crate::schema::capitalize;
use crate::shape::{Record, classify};
use crate::table::{RenderOptions, RenderedTable, RowHandle};

pub const NO_DATA_MESSAGE: &str = "No data available";

// Preview grid in pixels. Two pixel rows share one terminal line.
const PREVIEW_WIDTH: u32 = 48;
const PREVIEW_HEIGHT: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    Image,
    SubTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedField {
    pub name: String,
    pub kind: NestedKind,
}

#[derive(Debug)]
pub enum PopupContent {
    Image(Result<ImagePreview, String>),
    Table { table: RenderedTable, selected: usize },
}

/// A drill-down window. Owns its content and nothing else.
#[derive(Debug)]
pub struct Popup {
    pub field: String,
    pub title: String,
    pub content: PopupContent,
}

impl Popup {
    pub fn error_text(&self) -> Option<&str> {
        match &self.content {
            PopupContent::Image(Err(e)) => Some(e),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&RenderedTable> {
        match &self.content {
            PopupContent::Table { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn selected_handle(&self) -> Option<RowHandle> {
        match &self.content {
            PopupContent::Table { table, selected } => table.handle_at(*selected),
            _ => None,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if let PopupContent::Table { table, selected } = &mut self.content {
            let last = table.nrows().saturating_sub(1);
            *selected = selected.saturating_add_signed(delta).min(last);
        }
    }
}

// null, "", [], {}, false and 0 do not open a popup
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub struct Dispatcher {
    fields: Vec<NestedField>,
    label_field: String,
    opts: RenderOptions,
}

impl Dispatcher {
    pub fn new(
        fields: Vec<NestedField>,
        label_field: impl Into<String>,
        opts: RenderOptions,
    ) -> Self {
        Self {
            fields,
            label_field: label_field.into(),
            opts,
        }
    }

    /// Image fields come first, then sub-table fields, each in configured order.
    pub fn from_config(cfg: &TVConfig) -> Self {
        let images = cfg.image_fields.iter().map(|name| NestedField {
            name: name.clone(),
            kind: NestedKind::Image,
        });
        let tables = cfg.subtable_fields.iter().map(|name| NestedField {
            name: name.clone(),
            kind: NestedKind::SubTable,
        });
        Self::new(
            images.chain(tables).collect(),
            cfg.label_field.clone(),
            RenderOptions::from(cfg),
        )
    }

    /// Open popups for the record behind `handle`. Unknown handles are a no-op.
    pub fn on_row_selected(&self, table: &RenderedTable, handle: RowHandle) -> Vec<Popup> {
        match table.lookup(handle) {
            Some(record) => self.dispatch(record),
            None => {
                trace!("No record behind {handle:?}");
                Vec::new()
            }
        }
    }

    pub fn dispatch(&self, record: &Record) -> Vec<Popup> {
        let label = record.get(&self.label_field).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let popups: Vec<Popup> = self
            .fields
            .iter()
            .filter_map(|field| {
                let value = record.get(&field.name).filter(|v| is_present(v))?;
                Some(match field.kind {
                    NestedKind::Image => self.image_popup(&field.name, value, label.as_deref()),
                    NestedKind::SubTable => {
                        self.subtable_popup(&field.name, value, label.as_deref())
                    }
                })
            })
            .collect();
        info!("Drill-down opened {} popup(s)", popups.len());
        popups
    }

    fn title(field: &str, label: Option<&str>) -> String {
        let name = capitalize(field).replace('_', " ");
        match label {
            Some(l) => format!("{name} at {l}"),
            None => name,
        }
    }

    fn image_popup(&self, field: &str, value: &Value, label: Option<&str>) -> Popup {
        let content = match value {
            Value::String(payload) => decode_preview(payload, PREVIEW_WIDTH, PREVIEW_HEIGHT)
                .map_err(|e| e.to_string()),
            other => Err(format!("Error decoding image: expected a base64 string, got {other}")),
        };
        if let Err(e) = &content {
            debug!("Image popup for {field} shows error: {e}");
        }
        Popup {
            field: field.to_string(),
            title: Self::title(field, label),
            content: PopupContent::Image(content),
        }
    }

    fn subtable_popup(&self, field: &str, value: &Value, label: Option<&str>) -> Popup {
        let table = match value {
            Value::Array(_) => RenderedTable::from_shape(&classify(value), &self.opts),
            _ => RenderedTable::message(NO_DATA_MESSAGE),
        };
        Popup {
            field: field.to_string(),
            title: Self::title(field, label),
            content: PopupContent::Table { table, selected: 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::png_base64;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not a record"),
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::from_config(&TVConfig::default())
    }

    #[test]
    fn gardens_open_sub_table() {
        let popups = dispatcher().dispatch(&record(json!({
            "address": "12 Elm St",
            "gardens": [{"type": "rose"}]
        })));
        assert_eq!(popups.len(), 1);
        assert_eq!(popups[0].title, "Gardens at 12 Elm St");
        let table = popups[0].table().unwrap();
        assert_eq!(table.columns()[0].name, "Type");
        assert_eq!(table.nrows(), 1);
        assert_eq!(table.cell(0, 0), Some("rose"));
    }

    #[test]
    fn valid_image_has_no_error() {
        let popups = dispatcher().dispatch(&record(json!({"image": png_base64(2, 2)})));
        assert_eq!(popups.len(), 1);
        assert!(popups[0].error_text().is_none());
        assert!(matches!(popups[0].content, PopupContent::Image(Ok(_))));
    }

    #[test]
    fn invalid_image_shows_error() {
        let popups = dispatcher().dispatch(&record(json!({"image": "%%%not-base64%%%"})));
        assert_eq!(popups.len(), 1);
        assert!(popups[0].error_text().unwrap().contains("Error"));
    }

    #[test]
    fn one_click_opens_several_popups() {
        let popups = dispatcher().dispatch(&record(json!({
            "address": "1 Main",
            "room_data": [{"room": "kitchen", "size": 12}],
            "image": png_base64(1, 1),
            "gardens": [{"type": "herb"}]
        })));
        let fields: Vec<_> = popups.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["image", "gardens", "room_data"]);
        assert_eq!(popups[2].title, "Room data at 1 Main");
    }

    #[test]
    fn empty_or_missing_fields_are_ignored() {
        let popups = dispatcher().dispatch(&record(json!({
            "image": "",
            "gardens": [],
            "room_data": null
        })));
        assert!(popups.is_empty());
    }

    #[test]
    fn malformed_sub_lists() {
        let popups =
            dispatcher().dispatch(&record(json!({"gardens": "lots", "room_data": [1, 2]})));
        assert_eq!(popups[0].table().unwrap().cell(0, 0), Some(NO_DATA_MESSAGE));
        assert_eq!(popups[1].table().unwrap().cell(0, 0), Some("Invalid data format"));
    }

    #[test]
    fn unknown_handle_is_noop() {
        let table = RenderedTable::message("No items found");
        let d = dispatcher();
        assert!(table.handle_at(0).is_none());
        let other = RenderedTable::from_shape(
            &classify(&json!([{"gardens": [{"a": 1}]}])),
            &RenderOptions::default(),
        );
        let handle = other.handle_at(0).unwrap();
        assert!(d.on_row_selected(&table, handle).is_empty());
        assert_eq!(d.on_row_selected(&other, handle).len(), 1);
    }

    #[test]
    fn nested_lists_recurse() {
        let d = Dispatcher::new(
            vec![
                NestedField { name: "rooms".into(), kind: NestedKind::SubTable },
                NestedField { name: "furniture".into(), kind: NestedKind::SubTable },
            ],
            "name",
            RenderOptions::default(),
        );
        let popups = d.dispatch(&record(json!({
            "name": "house",
            "rooms": [{"name": "kitchen", "furniture": [{"item": "table"}, {"item": "chair"}]}]
        })));
        assert_eq!(popups.len(), 1);
        let rooms = popups[0].table().unwrap();
        let handle = popups[0].selected_handle().unwrap();
        let deeper = d.on_row_selected(rooms, handle);
        assert_eq!(deeper.len(), 1);
        assert_eq!(deeper[0].title, "Furniture at kitchen");
        assert_eq!(deeper[0].table().unwrap().nrows(), 2);
    }

    #[test]
    fn selection_is_clamped() {
        let mut popup = dispatcher()
            .dispatch(&record(json!({"gardens": [{"t": 1}, {"t": 2}]})))
            .remove(0);
        popup.move_selection(5);
        assert_eq!(popup.selected_handle(), popup.table().unwrap().handle_at(1));
        popup.move_selection(-9);
        assert_eq!(popup.selected_handle(), popup.table().unwrap().handle_at(0));
    }
}
