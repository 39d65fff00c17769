//! The chat panel's model: message log, opaque state, and the loading flag.
//!
//! A turn goes `begin_turn` -> any number of `apply_chunk` -> `finish_turn`.
//! The model does not guard against a second `begin_turn` while loading; front
//! ends are expected to disable their input instead.

use crate::error::Result;
use crate::state::{ChatMessage, ChatRole, ConversationState, StreamChunk, TurnRequest};

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    state: ConversationState,
    loading: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ConversationState::default())
    }
}

impl Conversation {
    pub fn new(state: ConversationState) -> Self {
        Self {
            messages: Vec::new(),
            state,
            loading: false,
        }
    }

    /// Seed the log with a system greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(greeting));
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Start a turn for `input`.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the user message and
    /// an empty system placeholder are appended, loading is set, and the request
    /// body to send is returned.
    pub fn begin_turn(&mut self, input: &str) -> Option<TurnRequest> {
        if input.trim().is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::system(""));
        self.loading = true;

        Some(TurnRequest {
            message: input.to_string(),
            state: self.state.clone(),
        })
    }

    /// Apply one decoded chunk. Returns true if the message log changed.
    pub fn apply_chunk(&mut self, chunk: StreamChunk) -> bool {
        let mut changed = false;

        if let Some(token) = chunk.text() {
            // Only ever extends a trailing system message
            if let Some(last) = self
                .messages
                .last_mut()
                .filter(|m| m.role == ChatRole::System)
            {
                last.text.push_str(token);
                changed = true;
            }
        }

        if let Some(message) = &chunk.message {
            tracing::debug!(%message, "server notice");
        }
        if let Some(error) = &chunk.error {
            tracing::warn!(%error, "server reported an error");
        }
        if chunk.complete == Some(true) {
            tracing::debug!("server marked the turn complete");
        }

        if let Some(state) = chunk.state {
            self.state = state.continued();
        }

        changed
    }

    /// End the turn, whatever the outcome. Failures are only logged.
    pub fn finish_turn(&mut self, outcome: Result<()>) {
        match outcome {
            Ok(()) => tracing::info!("chat turn finished"),
            Err(e) => tracing::error!(error = %e, "chat request failed"),
        }
        self.loading = false;
    }
}
