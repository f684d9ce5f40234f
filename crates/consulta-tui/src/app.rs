use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{error, info};

use consulta_core::error::{ChatError, Result as ChatResult};
use consulta_core::{ChatReply, ChatSession, InputState, SendOutcome};

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession,
    pub input: InputState,

    // Background request for the pending turn
    pub send_task: Option<JoinHandle<ChatResult<ChatReply>>>,

    // Chat pane scrolling
    pub chat_scroll: u16,
    pub follow_bottom: bool, // keep the newest turn in view
    pub max_scroll: u16,     // updated during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(session: ChatSession) -> Self {
        Self {
            should_quit: false,
            session,
            input: InputState::new(),
            send_task: None,
            chat_scroll: 0,
            follow_bottom: true,
            max_scroll: 0,
            animation_frame: 0,
            chat_area: None,
        }
    }

    pub fn pending(&self) -> bool {
        self.session.pending()
    }

    /// Send whatever is in the input box, if it is sendable.
    ///
    /// The user turn is on screen before the request task starts.
    pub fn submit(&mut self) {
        let Some(text) = self.input.submit() else {
            return;
        };

        match self.session.begin(&text) {
            Some(turn) => {
                self.follow_bottom = true;
                self.send_task = Some(tokio::spawn(turn.resolve()));
            }
            // The session refused (already pending); put the control back.
            None => self.input.complete(SendOutcome::Ignored),
        }
    }

    /// Collect the background request if it has finished.
    pub async fn poll_send_task(&mut self) {
        let finished = self
            .send_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.send_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "chat request task did not complete");
                    Err(ChatError::Cancelled)
                }
            };
            self.complete_send(result);
        }
    }

    pub fn complete_send(&mut self, result: ChatResult<ChatReply>) {
        let outcome = self.session.finish(result);
        self.input.complete(outcome);
        self.follow_bottom = true;
        info!(?outcome, turns = self.session.messages().len(), "send completed");
    }

    pub fn quit(&mut self) {
        self.session.cancel_all();
        self.should_quit = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll);
        if self.chat_scroll >= self.max_scroll {
            self.follow_bottom = true;
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.max_scroll;
    }

    /// Half the visible chat height, at least one line.
    pub fn page_size(&self) -> u16 {
        self.chat_area
            .map(|r| r.height.saturating_sub(2) / 2)
            .unwrap_or(5)
            .max(1)
    }
}
