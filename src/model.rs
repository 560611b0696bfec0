use arboard::Clipboard;
use std::time::Instant;
use tracing::{debug, trace};

use crate::client::Transport;
use crate::commands::CrudAction;
use crate::domain::{DocError, HELP_TEXT, Message, Notification, TVConfig};
use crate::inputter::{InputResult, Inputter};
use crate::session::Session;
use crate::table::ColumnView;
use crate::ui::{
    CURL_HEIGHT, INPUT_HEIGHT, RAW_RESPONSE_HEIGHT, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    INPUT,
    POPUP,
    HELP,
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize, // Total number of rows in the response table
    pub selected_row: usize,
    pub abs_selected_row: usize,
    pub show_help: bool,
    pub help_message: String,
    pub show_raw: bool,
    pub layout: UILayout,
    pub last_update: Instant,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub json_input: String,
    pub focused_popup: Option<usize>,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            nrows: 0,
            selected_row: 0,
            abs_selected_row: 0,
            show_help: false,
            help_message: String::new(),
            show_raw: true,
            layout: UILayout::default(),
            last_update: Instant::now(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            json_input: String::new(),
            focused_popup: None,
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub raw_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, show_raw: bool) -> Self {
        let raw_height = if show_raw { RAW_RESPONSE_HEIGHT } else { 0 };
        let chrome =
            INPUT_HEIGHT + CURL_HEIGHT + STATUSLINE_HEIGHT + raw_height + TABLE_HEADER_HEIGHT;
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(2),
            table_height: std::cmp::max(ui_height.saturating_sub(chrome), 1),
            raw_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    session: Session,
    transport: Box<dyn Transport>,
    curser_row: usize,
    offset_row: usize,
    focused_popup: usize,
    show_raw: bool,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    json_input: String,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        transport: Box<dyn Transport>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, DocError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            session: Session::new(config),
            transport,
            curser_row: 0,
            offset_row: 0,
            focused_popup: 0,
            show_raw: true,
            uilayout: UILayout::from_values(ui_width, ui_height, true),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            json_input: "{}".to_string(),
        };
        model
            .session
            .notify(Notification::info(format!("Connected to {}", config.endpoint())));
        model.update_uidata();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::INPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height, self.show_raw);
        self.scroll_into_view();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DocError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => {
                        self.select_row(self.session.table().nrows().saturating_sub(1))
                    }
                    Message::Enter => self.enter(),
                    Message::CyclePopup => self.cycle_popup(),
                    Message::EditInput => self.enter_input_mode(),
                    Message::Run(action) => self.run(action),
                    Message::CopyCurl => self.copy_curl(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::ToggleRaw => self.toggle_raw(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_popup_selection(1),
                    Message::MoveUp => self.move_popup_selection(-1),
                    Message::MovePageDown => self.move_popup_selection(10),
                    Message::MovePageUp => self.move_popup_selection(-10),
                    Message::MoveBeginning => self.move_popup_selection(isize::MIN),
                    Message::MoveEnd => self.move_popup_selection(isize::MAX),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::CyclePopup => self.cycle_popup(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::HELP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help | Message::Enter => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::INPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        match self.modus {
            Modus::TABLE => {
                let row = self.offset_row + self.curser_row;
                let Some(handle) = self.session.table().handle_at(row) else {
                    trace!("Row {row} has no record behind it");
                    return;
                };
                if self.session.on_row_click(handle) > 0 {
                    self.focus_popup(self.session.popups().len() - 1);
                }
            }
            Modus::POPUP => {
                if self.session.on_popup_row_click(self.focused_popup) > 0 {
                    self.focus_popup(self.session.popups().len() - 1);
                }
            }
            Modus::HELP | Modus::INPUT => {}
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::POPUP => {
                if let Some(popup) = self.session.close_popup(self.focused_popup) {
                    trace!("Closed popup {}", popup.title);
                }
                let remaining = self.session.popups().len();
                if remaining == 0 {
                    self.modus = Modus::TABLE;
                    self.previous_modus = Modus::POPUP;
                } else {
                    self.focused_popup = std::cmp::min(self.focused_popup, remaining - 1);
                }
            }
            Modus::HELP => {
                trace!("Close help ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::HELP;
            }
            Modus::INPUT => {}
        }
    }

    fn focus_popup(&mut self, idx: usize) {
        self.focused_popup = idx;
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
            self.modus = Modus::POPUP;
        }
    }

    /// Tab walks through the open popups and then back to the main table.
    fn cycle_popup(&mut self) {
        let n = self.session.popups().len();
        match self.modus {
            Modus::TABLE if n > 0 => self.focus_popup(0),
            Modus::POPUP if self.focused_popup + 1 < n => self.focused_popup += 1,
            Modus::POPUP => {
                self.previous_modus = Modus::POPUP;
                self.modus = Modus::TABLE;
            }
            _ => {}
        }
    }

    fn move_popup_selection(&mut self, delta: isize) {
        if let Some(popup) = self.session.popup_mut(self.focused_popup) {
            popup.move_selection(delta);
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::HELP;
    }

    fn enter_input_mode(&mut self) {
        trace!("Entering input mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::INPUT;
        self.input.begin(&self.json_input);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            if !self.last_input.canceled {
                self.json_input = self.last_input.input.clone();
                debug!("JSON input set to {}", self.json_input);
            }
            self.modus = self.previous_modus;
            self.previous_modus = Modus::INPUT;
        }
    }

    fn run(&mut self, action: CrudAction) {
        self.session
            .run_action(action, &self.json_input, self.transport.as_ref());
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn toggle_raw(&mut self) {
        self.show_raw = !self.show_raw;
        self.uilayout =
            UILayout::from_values(self.uilayout.width, self.uilayout.height, self.show_raw);
        self.scroll_into_view();
    }

    fn clipboard(&mut self) -> Option<&mut Clipboard> {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(c) => self.clipboard = Some(c),
                Err(e) => {
                    self.session
                        .notify(Notification::error(format!("Clipboard unavailable: {e}")));
                    return None;
                }
            }
        }
        self.clipboard.as_mut()
    }

    fn copy_text(&mut self, text: String, what: &str) {
        if text.is_empty() {
            self.session
                .notify(Notification::info(format!("Nothing to copy, {what} is empty")));
            return;
        }
        let result = self.clipboard().map(|c| c.set_text(text));
        match result {
            Some(Ok(_)) => self
                .session
                .notify(Notification::info(format!("Copied {what} to clipboard"))),
            Some(Err(e)) => self
                .session
                .notify(Notification::error(format!("Error copying to clipboard: {e}"))),
            None => {}
        }
    }

    fn copy_curl(&mut self) {
        let curl = self.session.curl().to_string();
        self.copy_text(curl, "curl command");
    }

    fn copy_table_cell(&mut self) {
        let row = self.offset_row + self.curser_row;
        let cell = self
            .session
            .table()
            .rows()
            .get(row)
            .map(|r| r.cells.join(" | "))
            .unwrap_or_default();
        trace!("Row content: {}", cell);
        self.copy_text(cell, "row");
    }

    fn select_row(&mut self, row: usize) {
        let nrows = self.session.table().nrows();
        let row = std::cmp::min(row, nrows.saturating_sub(1));
        let height = self.uilayout.table_height;
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + height {
            self.offset_row = row + 1 - height;
        }
        self.curser_row = row - self.offset_row;
    }

    fn scroll_into_view(&mut self) {
        self.select_row(self.offset_row + self.curser_row);
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let row = (self.offset_row + self.curser_row).saturating_sub(size);
        self.select_row(row);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let row = self.offset_row + self.curser_row + size;
        self.select_row(row);
    }

    fn update_uidata(&mut self) {
        let table = self.session.table();
        let rbegin = self.offset_row;
        let rend = rbegin + self.uilayout.table_height;
        self.uidata = UIData {
            name: self.config.endpoint(),
            table: table.column_views(rbegin, rend, self.session.render_options()),
            nrows: table.nrows(),
            selected_row: self.curser_row,
            abs_selected_row: self.offset_row + self.curser_row,
            show_help: self.modus == Modus::HELP,
            help_message: HELP_TEXT.to_string(),
            show_raw: self.show_raw,
            layout: self.uilayout.clone(),
            last_update: Instant::now(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.modus == Modus::INPUT,
            json_input: self.json_input.clone(),
            focused_popup: (self.modus == Modus::POPUP).then_some(self.focused_popup),
        };
    }
}
