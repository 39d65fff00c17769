//! UI-agnostic chat types
//!
//! These types are shared by any front end and carry no rendering concerns.
//! The conversation state is deliberately opaque: the client creates it with
//! defaults, forwards it on every request, and swaps in whatever the server
//! sends back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key the server reads to tell a fresh conversation from a follow-up.
/// The spelling is part of the wire contract.
pub const INITIAL_PROMPT_KEY: &str = "is_initail_prompt";

/// A chat message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    System,
}

/// Opaque per-conversation state echoed between client and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState(Map<String, Value>);

impl ConversationState {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// True until the server has replaced the state at least once.
    pub fn is_initial_prompt(&self) -> bool {
        self.0
            .get(INITIAL_PROMPT_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Tag a server-provided state as belonging to a follow-up turn.
    pub fn continued(mut self) -> Self {
        self.0.insert(INITIAL_PROMPT_KEY.to_string(), Value::Bool(false));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Default for ConversationState {
    /// Client-side defaults sent with the very first turn.
    fn default() -> Self {
        let mut fields = Map::new();
        fields.insert(INITIAL_PROMPT_KEY.to_string(), Value::Bool(true));
        fields.insert("confidence_threshold".to_string(), Value::from(0.7));
        fields.insert("symptom_similarity_threshold".to_string(), Value::from(0.7));
        fields.insert("asked_symptoms".to_string(), Value::Array(Vec::new()));
        fields.insert("excluded_candidates".to_string(), Value::Array(Vec::new()));
        fields.insert("depth".to_string(), Value::from(0));
        fields.insert("max_depth".to_string(), Value::from(5));
        fields.insert("initial_prompt".to_string(), Value::String(String::new()));
        Self(fields)
    }
}

/// One parsed `data:` line from the response stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    /// Text fragment to append to the in-progress reply.
    pub token: Option<String>,
    /// Replacement conversation state.
    pub state: Option<ConversationState>,
    /// Final notice the server sends when it gives up on a diagnosis.
    pub message: Option<String>,
    /// Server-side failure notice.
    pub error: Option<String>,
    pub complete: Option<bool>,
}

impl StreamChunk {
    /// Read each known field on its own, so one badly typed field is
    /// skipped without losing the rest of the chunk.
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        Self {
            token: take_string(&mut fields, "token"),
            state: match fields.remove("state") {
                Some(Value::Object(map)) => Some(ConversationState::from_map(map)),
                Some(Value::Null) | None => None,
                Some(other) => {
                    tracing::warn!(value = %other, "ignoring non-object state in chunk");
                    None
                }
            },
            message: take_string(&mut fields, "message"),
            error: take_string(&mut fields, "error"),
            complete: fields.remove("complete").and_then(|v| v.as_bool()),
        }
    }

    /// The text this chunk adds to the reply. Only `token` counts.
    pub fn text(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            tracing::warn!(field = key, value = %other, "ignoring non-string field in chunk");
            None
        }
    }
}

/// Body of the single POST issued per turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRequest {
    pub message: String,
    pub state: ConversationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_initial() {
        let state = ConversationState::default();
        assert!(state.is_initial_prompt());
        assert_eq!(state.get("max_depth"), Some(&Value::from(5)));
        assert_eq!(state.get("initial_prompt"), Some(&Value::String(String::new())));
    }

    #[test]
    fn test_continued_clears_flag_and_keeps_fields() {
        let mut fields = Map::new();
        fields.insert("depth".to_string(), Value::from(2));
        let state = ConversationState::from_map(fields).continued();
        assert!(!state.is_initial_prompt());
        assert_eq!(state.get("depth"), Some(&Value::from(2)));
    }

    #[test]
    fn test_only_token_is_reply_text() {
        let chunk = StreamChunk {
            token: Some(String::new()),
            message: Some("Please consult a doctor.".to_string()),
            error: Some("An error occurred.".to_string()),
            ..Default::default()
        };
        assert_eq!(chunk.text(), None);

        let chunk = StreamChunk {
            token: Some("Rest".to_string()),
            ..Default::default()
        };
        assert_eq!(chunk.text(), Some("Rest"));
    }

    #[test]
    fn test_bad_field_only_skips_itself() {
        let fields = serde_json::json!({"token": "A", "state": "oops", "message": 3});
        let Value::Object(fields) = fields else { unreachable!() };
        let chunk = StreamChunk::from_fields(fields);
        assert_eq!(chunk.token.as_deref(), Some("A"));
        assert_eq!(chunk.state, None);
        assert_eq!(chunk.message, None);

        let fields = serde_json::json!({"token": 7, "state": {"depth": 2}, "complete": true});
        let Value::Object(fields) = fields else { unreachable!() };
        let chunk = StreamChunk::from_fields(fields);
        assert_eq!(chunk.token, None);
        assert_eq!(chunk.state.unwrap().get("depth"), Some(&Value::from(2)));
        assert_eq!(chunk.complete, Some(true));
    }

    #[test]
    fn test_turn_request_wire_shape() {
        let request = TurnRequest {
            message: "headache".to_string(),
            state: ConversationState::default(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["message"], "headache");
        assert_eq!(body["state"][INITIAL_PROMPT_KEY], true);
    }
}
