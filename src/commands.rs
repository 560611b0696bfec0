use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{ApiRequest, ApiResponse, Method};
use crate::domain::{DocError, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudAction {
    Create,
    ReadAll,
    ReadOne,
    Query,
    Update,
    Delete,
    BulkUpdate,
    BulkDelete,
}

impl CrudAction {
    pub const ALL: [CrudAction; 8] = [
        CrudAction::Create,
        CrudAction::ReadAll,
        CrudAction::Query,
        CrudAction::Update,
        CrudAction::Delete,
        CrudAction::BulkUpdate,
        CrudAction::BulkDelete,
        CrudAction::ReadOne,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CrudAction::Create => "Create",
            CrudAction::ReadAll => "Read all",
            CrudAction::ReadOne => "Read one",
            CrudAction::Query => "Query",
            CrudAction::Update => "Update",
            CrudAction::Delete => "Delete",
            CrudAction::BulkUpdate => "Bulk update",
            CrudAction::BulkDelete => "Bulk delete",
        }
    }

    /// Number key bound to the action in the shell.
    pub fn from_key(c: char) -> Option<Self> {
        let idx = c.to_digit(10)?.checked_sub(1)?;
        Self::ALL.get(idx as usize).copied()
    }

    fn needs_input(&self) -> bool {
        !matches!(self, CrudAction::ReadAll)
    }

    fn expected_status(&self) -> u16 {
        match self {
            CrudAction::Create => 201,
            _ => 200,
        }
    }
}

fn parse_input(input: &str) -> Result<Value, DocError> {
    serde_json::from_str(input.trim()).map_err(|e| DocError::InvalidInput(e.to_string()))
}

fn as_object(value: Value, what: &str) -> Result<Map<String, Value>, DocError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DocError::InvalidInput(format!("{what} must be a JSON object"))),
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the request for `action` from the user's JSON input.
/// Input errors are returned before anything goes over the wire.
pub fn build_request(
    action: CrudAction,
    input: &str,
    endpoint: &str,
) -> Result<ApiRequest, DocError> {
    let data = if action.needs_input() {
        Some(parse_input(input)?)
    } else {
        None
    };

    let request = match (action, data) {
        (CrudAction::ReadAll, _) => ApiRequest::new(Method::Get, endpoint, None),
        (CrudAction::Create, Some(body)) => ApiRequest::new(Method::Post, endpoint, Some(body)),
        (CrudAction::Query, Some(filter)) => {
            ApiRequest::new(Method::Get, format!("{endpoint}/query"), Some(filter))
        }
        (CrudAction::ReadOne, Some(data)) => {
            let data = as_object(data, "Input")?;
            let id = data
                .get("_id")
                .ok_or_else(|| DocError::InvalidInput("JSON must include '_id' for read".into()))?;
            ApiRequest::new(Method::Get, format!("{endpoint}/{}", id_string(id)), None)
        }
        (CrudAction::Update, Some(data)) => {
            let mut data = as_object(data, "Input")?;
            let id = data
                .shift_remove("_id")
                .ok_or_else(|| {
                    DocError::InvalidInput("JSON must include '_id' for update".into())
                })?;
            ApiRequest::new(
                Method::Put,
                format!("{endpoint}/{}", id_string(&id)),
                Some(Value::Object(data)),
            )
        }
        (CrudAction::Delete, Some(data)) => {
            let data = as_object(data, "Input")?;
            let id = data
                .get("_id")
                .ok_or_else(|| {
                    DocError::InvalidInput("JSON must include '_id' for delete".into())
                })?;
            ApiRequest::new(Method::Delete, format!("{endpoint}/{}", id_string(id)), None)
        }
        (CrudAction::BulkUpdate, Some(data)) => {
            let map = as_object(data, "Input")?;
            if !map.contains_key("query") || !map.contains_key("update") {
                return Err(DocError::InvalidInput(
                    "JSON must include 'query' and 'update' fields".into(),
                ));
            }
            ApiRequest::new(
                Method::Put,
                format!("{endpoint}/bulk-update"),
                Some(Value::Object(map)),
            )
        }
        (CrudAction::BulkDelete, Some(data)) => {
            let map = as_object(data, "Input")?;
            if !map.contains_key("query") {
                return Err(DocError::InvalidInput("JSON must include 'query' field".into()));
            }
            ApiRequest::new(
                Method::Delete,
                format!("{endpoint}/bulk-delete"),
                Some(Value::Object(map)),
            )
        }
        (action, None) => {
            return Err(DocError::InvalidInput(format!(
                "{} needs a JSON input",
                action.label()
            )));
        }
    };
    debug!("Built request {} {}", request.method, request.url);
    Ok(request)
}

fn count(body: &Value, key: &str) -> String {
    body.get(key)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Notification for a completed round trip.
pub fn outcome(action: CrudAction, response: &ApiResponse) -> Notification {
    if response.status != action.expected_status() {
        let err = DocError::Server {
            status: response.status,
            text: response.text.clone(),
        };
        return Notification::error(err.to_string());
    }
    let body = match response.json() {
        Ok(body) => body,
        Err(e) => return Notification::error(e.to_string()),
    };
    match action {
        CrudAction::Create => Notification::success("Item created successfully!"),
        CrudAction::ReadAll => {
            let n = body.as_array().map_or(0, Vec::len);
            Notification::info(format!("Loaded {n} items"))
        }
        CrudAction::ReadOne => Notification::info("Item loaded"),
        CrudAction::Query => {
            let n = body.as_array().map_or(0, Vec::len);
            Notification::success(format!("Found {n} items"))
        }
        CrudAction::Update => Notification::success("Item updated successfully!"),
        CrudAction::Delete => Notification::success("Item deleted successfully!"),
        CrudAction::BulkUpdate => Notification::success(format!(
            "Bulk update completed: {} items modified",
            count(&body, "modified_count")
        )),
        CrudAction::BulkDelete => Notification::success(format!(
            "Bulk delete completed: {} items deleted",
            count(&body, "deleted_count")
        )),
    }
}
