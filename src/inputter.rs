use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line editor for the JSON request body.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    saved_input: String,
    curser_pos: usize, // in chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) | (KeyCode::Char('a'), KeyModifiers::CONTROL) => self.home(),
            (KeyCode::End, _) | (KeyCode::Char('e'), KeyModifiers::CONTROL) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.current_input.clear();
                self.curser_pos = 0;
                self.get()
            }
            (kc, km) => self.key(kc, km),
        }
    }

    /// Start an edit session on `s`. Escape restores it.
    pub fn begin(&mut self, s: &str) {
        self.finished = false;
        self.canceled = false;
        self.current_input = s.to_string();
        self.saved_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    fn enter(&mut self) -> InputResult {
        trace!("Input finished: {}", self.current_input);
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.current_input = self.saved_input.clone();
        self.curser_pos = self.current_input.chars().count();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let at = self.getbytepos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let at = self.getbytepos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.contains(KeyModifiers::CONTROL) {
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            self.current_input.insert(self.getbytepos(), chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(inputter: &mut Inputter, code: KeyCode) -> InputResult {
        inputter.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(inputter: &mut Inputter, s: &str) {
        for c in s.chars() {
            press(inputter, KeyCode::Char(c));
        }
    }

    #[test]
    fn typing_and_enter() {
        let mut input = Inputter::default();
        input.begin("");
        type_str(&mut input, r#"{"a":1}"#);
        let result = press(&mut input, KeyCode::Enter);
        assert!(result.finished && !result.canceled);
        assert_eq!(result.input, r#"{"a":1}"#);
    }

    #[test]
    fn backspace_in_the_middle() {
        let mut input = Inputter::default();
        input.begin("abcd");
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Left);
        let result = press(&mut input, KeyCode::Backspace);
        assert_eq!(result.input, "acd");
        assert_eq!(result.curser_pos, 1);
    }

    #[test]
    fn insert_after_multibyte_chars() {
        let mut input = Inputter::default();
        input.begin("ø");
        press(&mut input, KeyCode::Home);
        type_str(&mut input, "x");
        press(&mut input, KeyCode::End);
        type_str(&mut input, "y");
        assert_eq!(input.value(), "xøy");
        press(&mut input, KeyCode::Home);
        let result = press(&mut input, KeyCode::Delete);
        assert_eq!(result.input, "øy");
    }

    #[test]
    fn escape_restores_previous_value() {
        let mut input = Inputter::default();
        input.begin("{}");
        type_str(&mut input, "junk");
        let result = press(&mut input, KeyCode::Esc);
        assert!(result.canceled);
        assert_eq!(result.input, "{}");
    }
}
