//! Conversation state machine
//!
//! Owns the ordered message list and gates the single in-flight flow run.
//! The machine itself never performs I/O: `submit` hands back the request to
//! send, and the caller reports the outcome through `complete`.

use serde_json::Value;
use uuid::Uuid;

use crate::state::ChatMessage;
use crate::transport::{extract_reply, TransportError};

pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received";
pub const CONNECTION_ERROR_MESSAGE: &str = "⚠️ Connection error. Check if Langflow server is running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Awaiting,
}

/// Everything a transport needs to run one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub input_value: String,
    pub session_id: String,
}

#[derive(Debug)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
    status: Status,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            status: Status::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_awaiting(&self) -> bool {
        self.status == Status::Awaiting
    }

    /// Append the user's message and return the request to send, or `None`
    /// when the text is blank or a run is already outstanding. A rejected
    /// submission leaves the conversation untouched.
    pub fn submit(&mut self, text: &str) -> Option<TurnRequest> {
        if text.trim().is_empty() || self.is_awaiting() {
            return None;
        }

        self.messages.push(ChatMessage::user(text));
        self.status = Status::Awaiting;
        tracing::debug!(session = %self.id, turn = self.messages.len(), "awaiting flow response");

        Some(TurnRequest {
            input_value: text.to_string(),
            session_id: self.id.clone(),
        })
    }

    /// Record the outcome of the outstanding run. Returns `false` if there was
    /// no run to complete.
    pub fn complete(&mut self, outcome: Result<Value, TransportError>) -> bool {
        match outcome {
            Ok(payload) => self.on_transport_success(&payload),
            Err(err) => self.on_transport_failure(&err),
        }
    }

    pub fn on_transport_success(&mut self, payload: &Value) -> bool {
        if !self.is_awaiting() {
            tracing::debug!(session = %self.id, "ignoring response with no outstanding run");
            return false;
        }

        let text = extract_reply(payload).or_placeholder(NO_RESPONSE_PLACEHOLDER);
        self.finish_turn(ChatMessage::assistant(text));
        true
    }

    pub fn on_transport_failure(&mut self, error: &TransportError) -> bool {
        if !self.is_awaiting() {
            tracing::debug!(session = %self.id, %error, "ignoring failure with no outstanding run");
            return false;
        }

        tracing::error!(session = %self.id, %error, "flow run failed");
        self.finish_turn(ChatMessage::assistant(CONNECTION_ERROR_MESSAGE));
        true
    }

    fn finish_turn(&mut self, reply: ChatMessage) {
        self.messages.push(reply);
        self.status = Status::Idle;
    }
}
