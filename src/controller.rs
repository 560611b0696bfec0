use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};

use crate::commands::CrudAction;
use crate::domain::{DocError, Message, TVConfig};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DocError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    return Ok(self.handle_key(model, key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        // While editing the JSON input every key goes to the editor.
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::Char('G') | KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Tab => Some(Message::CyclePopup),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('e') => Some(Message::EditInput),
            KeyCode::Char('y') => Some(Message::CopyCurl),
            KeyCode::Char('c') => Some(Message::CopyCell),
            KeyCode::Char('r') => Some(Message::ToggleRaw),
            KeyCode::Char(c) => CrudAction::from_key(c).map(Message::Run),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
