//! Backend access
//!
//! The session talks to the agent through [`ChatBackend`] so it can be driven
//! by the HTTP client in production and by a scripted backend in tests.

pub mod client;
pub mod types;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use types::{ChatRequest, ChatResponse};

/// Result of one `POST /api/chat` round trip that reached the server
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Completed(ChatResponse),
    /// 503: backend still warming up
    WarmingUp {
        retry_after: Option<Duration>,
        detail: Option<String>,
    },
    /// Any other non-success status
    Rejected { status: u16, detail: Option<String> },
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome>;
}
