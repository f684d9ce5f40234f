//! Message composer state.
//!
//! Holds the text being typed and a two-state machine (`Idle`, `Sending`)
//! that keeps one control from firing overlapping sends.

use crate::session::SendOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Idle,
    Sending,
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    text: String,
    cursor: usize, // in characters, not bytes
    mode: InputMode,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn is_sending(&self) -> bool {
        self.mode == InputMode::Sending
    }

    /// Whether a submit right now would start a send.
    pub fn can_submit(&self) -> bool {
        self.mode == InputMode::Idle && !self.text.trim().is_empty()
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// `Idle -> Sending`. Returns the text to send, or `None` when the input
    /// is blank or a send is already running.
    pub fn submit(&mut self) -> Option<String> {
        if !self.can_submit() {
            return None;
        }
        self.mode = InputMode::Sending;
        Some(self.text.clone())
    }

    /// `Sending -> Idle`, whatever the outcome. Only a successful send
    /// clears the text.
    pub fn complete(&mut self, outcome: SendOutcome) {
        self.mode = InputMode::Idle;
        if outcome == SendOutcome::Answered {
            self.text.clear();
            self.cursor = 0;
        }
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
