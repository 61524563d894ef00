//! Shopchat - client for the shopping-assistant agent
//!
//! This library provides the client side of the assistant: a chat session
//! that tracks history, the backend session id and the warm-up retry
//! protocol, plus the image pipeline that shrinks uploads before they are
//! sent for image search.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod session;
pub mod storage;
pub mod upload;
pub mod utils;

pub use self::config::Settings;
pub use self::core::client::BackendClient;
pub use self::core::types::{ChatRequest, ChatResponse, Message, Product, Role};
pub use self::core::{ChatBackend, ChatOutcome};
pub use error::{Error, Result};
pub use session::{ChatSession, SendOutcome, SessionSnapshot};
pub use storage::{FileSystemStorage, Transcript, TranscriptStorage};
pub use upload::{AttachmentSlot, ImagePreprocessor, PreparedImage};

use std::sync::Arc;

/// Chat session wired to the backend named in `settings`
pub fn connect(settings: &Settings) -> Result<(Arc<BackendClient>, ChatSession)> {
    let client = Arc::new(BackendClient::new(&settings.backend)?);
    let session = ChatSession::new(client.clone(), settings.retry.clone());
    tracing::info!("Shopchat connected to {}", client.base_url());
    Ok((client, session))
}
