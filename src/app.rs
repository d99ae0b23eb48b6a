use parley::{ChatError, Exchange};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Transcript, input buffer, busy flag and error slot live here
    pub exchange: Exchange,
    pub cursor: usize, // cursor position in the input buffer, in chars

    // Chat scroll state, max_scroll and chat_height are refreshed on every draw
    pub scroll: u16,
    pub max_scroll: u16,
    pub chat_height: u16,
    pub follow_bottom: bool,

    pub reply_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub animation_frame: u8,
}

impl App {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            exchange,
            cursor: 0,
            scroll: 0,
            max_scroll: 0,
            chat_height: 0,
            follow_bottom: true,
            reply_task: None,
            animation_frame: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.exchange.is_busy()
    }

    /// Submit the input buffer. The request runs on a spawned task; `apply_reply` finishes it.
    pub fn submit(&mut self) {
        match self.exchange.begin_input() {
            Ok(Some(pending)) => {
                self.cursor = 0;
                self.follow_bottom = true;
                self.reply_task = Some(tokio::spawn(pending.send()));
            }
            Ok(None) => {
                // Blank input leaves the buffer alone; a config error already cleared it
                self.cursor = self.cursor.min(self.exchange.input().chars().count());
                self.follow_bottom = true;
            }
            Err(ChatError::Busy) => {}
            Err(e) => warn!(error = %e, "submit rejected"),
        }
    }

    /// Wait for the in-flight request. Never resolves when there is none.
    pub async fn wait_reply(&mut self) -> Result<String, ChatError> {
        match self.reply_task.as_mut() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(ChatError::Transport(format!("request task failed: {}", e))),
            },
            None => std::future::pending().await,
        }
    }

    pub fn apply_reply(&mut self, result: Result<String, ChatError>) {
        self.reply_task = None;
        self.exchange.finish(result);
        self.follow_bottom = true;
    }

    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let cursor = self.cursor;
        let input = self.exchange.input_mut();
        let byte_pos = char_to_byte_index(input, cursor);
        input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        // Single-line input: pasted newlines become spaces
        for c in text.chars() {
            self.insert_char(if c == '\n' || c == '\r' { ' ' } else { c });
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let cursor = self.cursor;
            let input = self.exchange.input_mut();
            let byte_pos = char_to_byte_index(input, cursor);
            input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        let cursor = self.cursor;
        let input = self.exchange.input_mut();
        if cursor < input.chars().count() {
            let byte_pos = char_to_byte_index(input, cursor);
            input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.exchange.input().chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.exchange.input().chars().count();
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow_bottom = true;
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_bottom = false;
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.scroll = self.max_scroll;
    }
}
