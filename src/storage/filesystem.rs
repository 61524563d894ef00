//! File System Transcript Storage
//!
//! Information Hiding:
//! - File paths and JSON serialization format hidden from users
//! - Directory structure management hidden behind interface

use super::{Transcript, TranscriptStorage};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Each transcript is stored as {base_path}/{name}.json
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .context("Failed to create storage directory")?;

        Ok(Self { base_path })
    }

    fn transcript_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(|c: char| matches!(c, '/' | '\\'))
        {
            bail!("Invalid transcript name: {:?}", name);
        }
        Ok(self.base_path.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl TranscriptStorage for FileSystemStorage {
    async fn save(&self, name: &str, transcript: &Transcript) -> Result<()> {
        let path = self.transcript_path(name)?;
        let json =
            serde_json::to_string_pretty(transcript).context("Failed to serialize transcript")?;

        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write transcript file: {:?}", path))?;

        tracing::debug!(
            "[FileSystemStorage] Saved {} messages for '{}' to {:?}",
            transcript.messages.len(),
            name,
            path
        );
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Transcript> {
        let path = self.transcript_path(name)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("[FileSystemStorage] Transcript '{}' does not exist", name);
            return Ok(Transcript::default());
        }

        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read transcript file: {:?}", path))?;

        let transcript: Transcript =
            serde_json::from_str(&json).context("Failed to deserialize transcript")?;

        tracing::debug!(
            "[FileSystemStorage] Loaded {} messages for '{}' from {:?}",
            transcript.messages.len(),
            name,
            path
        );
        Ok(transcript)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.transcript_path(name)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete transcript file: {:?}", path))?;
            tracing::debug!("[FileSystemStorage] Deleted '{}' at {:?}", name, path);
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .context("Failed to read storage directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.transcript_path(name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}
