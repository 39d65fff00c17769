use ratatui::layout::Rect;
use saab_core::{ChatClient, Config, Conversation, StreamChunk};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub conversation: Conversation,
    pub client: ChatClient,
    events: UnboundedSender<AppEvent>,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the message area
    pub chat_width: u16,  // inner width of the message area
    pub chat_total_lines: u16,
    /// Set whenever the message list changes; the next render scrolls to the bottom.
    pub pin_to_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing indicator

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
}

impl App {
    pub fn new(config: &Config, client: ChatClient, events: UnboundedSender<AppEvent>) -> Self {
        let greeting = config.greeting();
        let conversation = if greeting.is_empty() {
            Conversation::new(config.initial_state())
        } else {
            Conversation::new(config.initial_state()).with_greeting(greeting)
        };

        Self {
            should_quit: false,
            conversation,
            client,
            events,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_total_lines: 0,
            pin_to_bottom: true,

            animation_frame: 0,

            chat_area: None,
            send_area: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    /// Send the current input as a new turn.
    ///
    /// Blank input leaves everything untouched. Returns true if a request was started.
    pub fn send_message(&mut self) -> bool {
        let Some(request) = self.conversation.begin_turn(&self.input) else {
            return false;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.animation_frame = 0;
        self.pin_to_bottom = true;

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let chunk_events = events.clone();
            let outcome = client
                .drive_turn(&request, move |chunk| {
                    let _ = chunk_events.send(AppEvent::Chunk(chunk));
                })
                .await;
            let _ = events.send(AppEvent::TurnFinished(outcome));
        });

        true
    }

    pub fn apply_chunk(&mut self, chunk: StreamChunk) {
        if self.conversation.apply_chunk(chunk) {
            self.pin_to_bottom = true;
        }
    }

    pub fn finish_turn(&mut self, outcome: saab_core::Result<()>) {
        self.conversation.finish_turn(outcome);
        // The typing indicator goes away
        self.pin_to_bottom = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_chat_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    /// Record the rendered line count, pinning to the bottom if the list changed.
    pub fn sync_chat_scroll(&mut self, total_lines: usize) {
        self.chat_total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);
        if self.pin_to_bottom {
            self.chat_scroll = self.max_chat_scroll();
            self.pin_to_bottom = false;
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_chat_scroll());
        }
    }

    pub fn is_scrolled_to_bottom(&self) -> bool {
        self.chat_scroll >= self.max_chat_scroll()
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll());
    }

    pub fn page_size(&self) -> u16 {
        self.chat_height.saturating_sub(1).max(1)
    }
}
