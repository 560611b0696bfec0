use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::{ApiRequest, Transport};
use crate::commands::{CrudAction, build_request, outcome};
use crate::domain::{DocError, Notification, NotifyKind, TVConfig};
use crate::drilldown::{Dispatcher, Popup};
use crate::shape::{Shape, classify, classify_body};
use crate::table::{RenderOptions, RenderedTable, RowHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Requesting,
    Succeeded,
    Failed,
}

/// State behind the main window: the current response table, the open
/// popups and the outcome of the last request.
pub struct Session {
    endpoint: String,
    opts: RenderOptions,
    dispatcher: Dispatcher,
    table: RenderedTable,
    popups: Vec<Popup>,
    state: RequestState,
    raw_response: String,
    curl: String,
    notifications: Vec<Notification>,
}

impl Session {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            opts: RenderOptions::from(config),
            dispatcher: Dispatcher::from_config(config),
            table: RenderedTable::default(),
            popups: Vec::new(),
            state: RequestState::Idle,
            raw_response: String::new(),
            curl: String::new(),
            notifications: Vec::new(),
        }
    }

    pub fn render_response(&mut self, value: &Value) {
        self.render_shape(&classify(value));
    }

    pub fn render_shape(&mut self, shape: &Shape) {
        self.table.render(shape, &self.opts);
    }

    /// Drill into the row behind `handle`, opening zero or more popups.
    pub fn on_row_click(&mut self, handle: RowHandle) -> usize {
        let opened = self.dispatcher.on_row_selected(&self.table, handle);
        let n = opened.len();
        self.popups.extend(opened);
        n
    }

    /// Drill into a row of the popup at `idx`. The new popups get their own tables.
    pub fn on_popup_row_click(&mut self, idx: usize) -> usize {
        let opened = match self.popups.get(idx) {
            Some(popup) => match (popup.table(), popup.selected_handle()) {
                (Some(table), Some(handle)) => self.dispatcher.on_row_selected(table, handle),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        let n = opened.len();
        self.popups.extend(opened);
        n
    }

    pub fn close_popup(&mut self, idx: usize) -> Option<Popup> {
        if idx < self.popups.len() {
            Some(self.popups.remove(idx))
        } else {
            None
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        match notification.kind {
            NotifyKind::Error => warn!("{}", notification.text),
            _ => info!("{}", notification.text),
        }
        self.notifications.push(notification);
    }

    /// Run one CRUD action end to end: build, send, render, report.
    pub fn run_action(&mut self, action: CrudAction, input: &str, transport: &dyn Transport) {
        let request = match build_request(action, input, &self.endpoint) {
            Ok(r) => r,
            Err(e) => {
                debug!("{} rejected before sending: {e}", action.label());
                let text = match e {
                    DocError::InvalidInput(ref detail) if detail.contains("must include") => {
                        detail.clone()
                    }
                    DocError::InvalidInput(_) => "Invalid JSON input".to_string(),
                    other => other.to_string(),
                };
                self.notify(Notification::error(text));
                return;
            }
        };
        self.execute(action, request, transport);
    }

    fn execute(&mut self, action: CrudAction, request: ApiRequest, transport: &dyn Transport) {
        self.state = RequestState::Requesting;
        self.curl = request.to_curl();
        match transport.send(&request) {
            Ok(response) => {
                self.raw_response = response.pretty();
                self.render_shape(&classify_body(response.status, &response.text));
                let note = outcome(action, &response);
                self.state = match note.kind {
                    NotifyKind::Error => RequestState::Failed,
                    _ => RequestState::Succeeded,
                };
                self.notify(note);
            }
            Err(e) => {
                error!("{} failed: {e}", action.label());
                self.state = RequestState::Failed;
                self.raw_response.clear();
                // The old rows belong to an earlier request.
                self.table = RenderedTable::message(e.to_string());
                self.notify(Notification::error(e.to_string()));
            }
        }
    }

    pub fn table(&self) -> &RenderedTable {
        &self.table
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    pub fn popup_mut(&mut self, idx: usize) -> Option<&mut Popup> {
        self.popups.get_mut(idx)
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn curl(&self) -> &str {
        &self.curl
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.opts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::ApiResponse;
    use serde_json::json;
    use std::cell::RefCell;

    /// Replays canned responses and records what was sent.
    pub struct FakeTransport {
        pub responses: RefCell<Vec<Result<ApiResponse, DocError>>>,
        pub sent: RefCell<Vec<ApiRequest>>,
    }

    impl FakeTransport {
        pub fn new(responses: Vec<Result<ApiResponse, DocError>>) -> Self {
            Self {
                responses: RefCell::new(responses),
                sent: RefCell::new(Vec::new()),
            }
        }

        pub fn reply(status: u16, text: &str) -> Self {
            Self::new(vec![Ok(ApiResponse {
                status,
                text: text.to_string(),
            })])
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, request: &ApiRequest) -> Result<ApiResponse, DocError> {
            self.sent.borrow_mut().push(request.clone());
            let mut responses = self.responses.borrow_mut();
            if responses.is_empty() {
                return Err(DocError::Transport("connection refused".into()));
            }
            responses.remove(0)
        }
    }

    fn session() -> Session {
        Session::new(&TVConfig::default())
    }

    #[test]
    fn successful_read_renders_and_notifies() {
        let transport =
            FakeTransport::reply(200, r#"[{"_id":"a","address":"1 Main"},{"_id":"b"}]"#);
        let mut s = session();
        s.run_action(CrudAction::ReadAll, "", &transport);
        assert_eq!(s.state(), RequestState::Succeeded);
        assert_eq!(s.table().nrows(), 2);
        assert_eq!(s.curl(), "curl -X GET \"http://localhost:5000/items\"");
        assert_eq!(s.last_notification().unwrap().text, "Loaded 2 items");
        assert!(s.raw_response().contains("\"address\": \"1 Main\""));
    }

    #[test]
    fn invalid_input_never_sends() {
        let transport = FakeTransport::new(vec![]);
        let mut s = session();
        s.run_action(CrudAction::Create, "{oops", &transport);
        assert!(transport.sent.borrow().is_empty());
        assert_eq!(s.state(), RequestState::Idle);
        assert_eq!(s.last_notification().unwrap().text, "Invalid JSON input");
    }

    #[test]
    fn missing_id_reports_the_rule() {
        let transport = FakeTransport::new(vec![]);
        let mut s = session();
        s.run_action(CrudAction::Delete, "{}", &transport);
        assert_eq!(
            s.last_notification().unwrap().text,
            "JSON must include '_id' for delete"
        );
    }

    #[test]
    fn server_error_still_renders_body() {
        let transport = FakeTransport::reply(404, r#"{"error":"Item not found"}"#);
        let mut s = session();
        s.run_action(CrudAction::Delete, r#"{"_id":"x"}"#, &transport);
        assert_eq!(s.state(), RequestState::Failed);
        assert_eq!(s.table().cell(0, 0), Some("Error"));
        assert_eq!(s.table().cell(0, 1), Some("Item not found"));
        assert_eq!(s.last_notification().unwrap().kind, NotifyKind::Error);
    }

    #[test]
    fn non_json_success_falls_back_to_message() {
        let transport = FakeTransport::reply(200, "<html>proxy page</html>");
        let mut s = session();
        s.run_action(CrudAction::ReadAll, "", &transport);
        assert_eq!(s.table().cell(0, 0), Some("Error: 200 - <html>proxy page</html>"));
        assert_eq!(s.state(), RequestState::Failed);
        let note = s.last_notification().unwrap();
        assert_eq!(note.kind, NotifyKind::Error);
        assert!(note.text.starts_with("Response is not JSON"));
    }

    #[test]
    fn transport_error_is_terminal_for_the_action_only() {
        let transport = FakeTransport::new(vec![
            Err(DocError::Transport("connection refused".into())),
            Ok(ApiResponse { status: 200, text: "[]".into() }),
        ]);
        let mut s = session();
        s.run_action(CrudAction::ReadAll, "", &transport);
        assert_eq!(s.state(), RequestState::Failed);
        assert_eq!(
            s.last_notification().unwrap().text,
            "Network error: connection refused"
        );
        s.run_action(CrudAction::ReadAll, "", &transport);
        assert_eq!(s.state(), RequestState::Succeeded);
        assert_eq!(s.table().cell(0, 0), Some("No items found"));
    }

    #[test]
    fn transport_error_drops_the_previous_table() {
        let transport = FakeTransport::new(vec![
            Ok(ApiResponse { status: 200, text: r#"[{"address": "1 Main"}]"#.into() }),
            Err(DocError::Transport("connection reset".into())),
        ]);
        let mut s = session();
        s.run_action(CrudAction::ReadAll, "", &transport);
        let old = s.table().handle_at(0).unwrap();
        s.run_action(CrudAction::Query, r#"{"city": "Oslo"}"#, &transport);
        assert!(s.curl().contains("/items/query"));
        assert!(s.raw_response().is_empty());
        assert_eq!(s.table().nrows(), 1);
        assert_eq!(s.table().cell(0, 0), Some("Network error: connection reset"));
        assert!(s.table().handle_at(0).is_none());
        assert_eq!(s.on_row_click(old), 0);
    }

    #[test]
    fn row_click_opens_popups_and_popups_drill_further() {
        let mut s = session();
        s.render_response(&json!([
            {"address": "7 Oak", "gardens": [{"type": "rose", "room_data": [{"x": 1}]}]}
        ]));
        let handle = s.table().handle_at(0).unwrap();
        assert_eq!(s.on_row_click(handle), 1);
        assert_eq!(s.popups()[0].title, "Gardens at 7 Oak");
        assert_eq!(s.on_popup_row_click(0), 1);
        assert_eq!(s.popups().len(), 2);
        assert!(s.close_popup(0).is_some());
        assert_eq!(s.popups().len(), 1);
        assert_eq!(s.popups()[0].field, "room_data");
    }

    #[test]
    fn new_response_replaces_old_rows() {
        let mut s = session();
        s.render_response(&json!([{"address": "old"}, {"address": "old2"}]));
        let stale = s.table().handle_at(1).unwrap();
        s.render_response(&json!([
            {"address": "new A", "gardens": [{"type": "fern"}]},
            {"address": "new B", "gardens": [{"type": "moss"}]}
        ]));
        assert_eq!(s.table().nrows(), 2);
        assert_eq!(s.on_row_click(stale), 0);
        assert!(s.popups().is_empty());
    }
}
