//! Attachment slot
//!
//! Information Hiding:
//! - Each upload attempt owns a cancellation token; callers never see it
//! - Preview and payload are separate slots filled by separate operations
//! - Superseded attempts are cancelled and their previews released

use super::preprocess::{ImagePreprocessor, PreparedImage};
use crate::error::{Error, Result};
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What the UI can show as soon as a file is picked
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub name: String,
    pub mime: Option<&'static str>,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

#[derive(Debug, Clone)]
pub enum PayloadState {
    Pending,
    Ready(Arc<PreparedImage>),
    /// The file could not be decoded or encoded; send without an image
    Failed(String),
    /// A newer attempt or `clear` superseded this one
    Cancelled,
}

/// Awaitable view of one attempt's payload slot
#[derive(Debug, Clone)]
pub struct PayloadHandle {
    rx: watch::Receiver<PayloadState>,
}

impl PayloadHandle {
    /// `Ok(None)` when the image was unusable, `Err(Cancelled)` when superseded
    pub async fn wait(mut self) -> Result<Option<Arc<PreparedImage>>> {
        let state = match self
            .rx
            .wait_for(|state| !matches!(state, PayloadState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => PayloadState::Failed("preprocessing task ended early".to_string()),
        };

        match state {
            PayloadState::Ready(prepared) => Ok(Some(prepared)),
            PayloadState::Failed(reason) => {
                tracing::warn!("[AttachmentSlot] Sending without image: {}", reason);
                Ok(None)
            }
            PayloadState::Cancelled | PayloadState::Pending => Err(Error::Cancelled),
        }
    }
}

struct Attempt {
    preview: Arc<Preview>,
    payload: watch::Receiver<PayloadState>,
    cancel: CancellationToken,
}

pub struct AttachmentSlot {
    preprocessor: Arc<ImagePreprocessor>,
    current: Option<Attempt>,
}

impl AttachmentSlot {
    pub fn new(preprocessor: Arc<ImagePreprocessor>) -> Self {
        Self {
            preprocessor,
            current: None,
        }
    }

    /// Start a new upload attempt. Any previous attempt is cancelled and its
    /// preview released first. Must be called inside a tokio runtime.
    pub fn attach(&mut self, name: impl Into<String>, raw: Vec<u8>) -> Result<Arc<Preview>> {
        self.clear();

        let reader = ImageReader::new(Cursor::new(&raw))
            .with_guessed_format()
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        let mime = reader.format().map(|f| f.to_mime_type());
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| Error::ImageDecode(e.to_string()))?;

        let preview = Arc::new(Preview {
            name: name.into(),
            mime,
            width,
            height,
            byte_len: raw.len(),
        });

        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(PayloadState::Pending);
        let preprocessor = Arc::clone(&self.preprocessor);
        let token = cancel.clone();

        tokio::spawn(async move {
            let job = tokio::task::spawn_blocking(move || preprocessor.prepare(&raw));
            let state = tokio::select! {
                _ = token.cancelled() => PayloadState::Cancelled,
                joined = job => match joined {
                    Ok(Ok(prepared)) => PayloadState::Ready(Arc::new(prepared)),
                    Ok(Err(e)) => PayloadState::Failed(e.to_string()),
                    Err(e) => PayloadState::Failed(format!("preprocessing task failed: {}", e)),
                },
            };

            // a cancel that lands after the job finished still wins
            let state = if token.is_cancelled() {
                PayloadState::Cancelled
            } else {
                state
            };
            let _ = tx.send(state);
        });

        tracing::debug!(
            "[AttachmentSlot] Attached '{}' ({}x{}, {} bytes)",
            preview.name,
            preview.width,
            preview.height,
            preview.byte_len
        );

        self.current = Some(Attempt {
            preview: Arc::clone(&preview),
            payload: rx,
            cancel,
        });

        Ok(preview)
    }

    pub async fn attach_file(&mut self, path: &Path) -> Result<Arc<Preview>> {
        let raw = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.attach(name, raw)
    }

    /// Like `attach_file`, but an unreadable or undecodable file leaves the
    /// slot empty so the message goes out without an image
    pub async fn attach_file_or_skip(&mut self, path: &Path) -> Option<Arc<Preview>> {
        match self.attach_file(path).await {
            Ok(preview) => Some(preview),
            Err(e) => {
                tracing::warn!(
                    "[AttachmentSlot] Skipping {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn preview(&self) -> Option<Arc<Preview>> {
        self.current.as_ref().map(|a| Arc::clone(&a.preview))
    }

    pub fn payload_state(&self) -> Option<PayloadState> {
        self.current.as_ref().map(|a| a.payload.borrow().clone())
    }

    pub fn payload(&self) -> Option<PayloadHandle> {
        self.current.as_ref().map(|a| PayloadHandle {
            rx: a.payload.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Cancel the current attempt and release its preview
    pub fn clear(&mut self) {
        if let Some(attempt) = self.current.take() {
            attempt.cancel.cancel();
            tracing::debug!("[AttachmentSlot] Released '{}'", attempt.preview.name);
        }
    }
}

impl Drop for AttachmentSlot {
    fn drop(&mut self) {
        self.clear();
    }
}
