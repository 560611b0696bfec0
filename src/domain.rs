use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::commands::CrudAction;

#[derive(Debug, Error)]
pub enum DocError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Malformed JSON typed by the user. The request is never sent.
    #[error("Invalid JSON input: {0}")]
    InvalidInput(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Failed: {status} - {text}")]
    Server { status: u16, text: String },
    #[error("Response is not JSON: {0}")]
    ResponseDecode(#[from] serde_json::Error),
    #[error("Error decoding image: {0}")]
    ImageDecode(String),
    #[error("Invalid object id: {0}")]
    InvalidId(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Logging setup failed: {0}")]
    LoggingFailed(String),
}

impl From<reqwest::Error> for DocError {
    fn from(err: reqwest::Error) -> Self {
        DocError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct TVConfig {
    pub base_url: String,
    pub collection: String,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub wide_column_width: usize,
    pub truncate_len: usize,
    pub large_payload_fields: Vec<String>,
    pub image_fields: Vec<String>,
    pub subtable_fields: Vec<String>,
    pub label_field: String,
    pub log_file: Option<PathBuf>,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            collection: "items".to_string(),
            event_poll_time: 100,
            max_column_width: 24,
            wide_column_width: 52,
            truncate_len: 50,
            large_payload_fields: vec!["image".to_string()],
            image_fields: vec!["image".to_string()],
            subtable_fields: vec!["gardens".to_string(), "room_data".to_string()],
            label_field: "address".to_string(),
            log_file: None,
        }
    }
}

impl TVConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.collection
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotifyKind,
    pub text: String,
}

impl Notification {
    pub fn new(kind: NotifyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NotifyKind::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NotifyKind::Error, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NotifyKind::Info, text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Enter,
    Exit,
    Help,
    EditInput,
    Run(CrudAction),
    CopyCurl,
    CopyCell,
    ToggleRaw,
    CyclePopup,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
doctv - document store client

 Navigation
   j / Down        next row
   k / Up          previous row
   PgDown / PgUp   scroll a page
   g / G           first / last row
   Enter           open nested fields of the selected row
   Tab             focus next popup
   Esc             close focused popup / help

 Requests (use the JSON input as body)
   e               edit JSON input
   1 Create        2 Read all      3 Query
   4 Update        5 Delete        6 Bulk update
   7 Bulk delete   8 Read one

 Other
   y               copy curl command
   c               copy selected cell
   r               toggle raw response
   ?               help
   q               quit
";
