//! Transcript Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - The CLI resumes a conversation without knowing where it was kept
//! - Each storage implementation encapsulates its own data structures

use crate::core::types::Message;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod filesystem;

pub use filesystem::FileSystemStorage;

/// A saved conversation: backend session id plus the rendered turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: Option<String>,
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Trait defining transcript storage interface
#[async_trait]
pub trait TranscriptStorage: Send + Sync {
    /// Save a transcript under `name`, replacing any previous one
    async fn save(&self, name: &str, transcript: &Transcript) -> Result<()>;

    /// Load a transcript
    /// Returns an empty transcript if `name` doesn't exist
    async fn load(&self, name: &str) -> Result<Transcript>;

    async fn delete(&self, name: &str) -> Result<()>;

    /// List all saved transcript names
    async fn list(&self) -> Result<Vec<String>>;

    async fn exists(&self, name: &str) -> Result<bool>;
}
