use crate::core::types::Message;
use serde::Serialize;

/// Everything a view needs to render the conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub loading: bool,
    /// A 503 was received and the retry delay is running
    pub warming_up: bool,
    pub error: Option<String>,
    pub session_id: Option<String>,
}

impl SessionSnapshot {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send: empty text and no image
    Ignored,
    Completed,
    /// An error banner and an assistant error turn were added
    Failed,
    /// A newer send or a new chat cancelled this call; no state was written
    Superseded,
}
