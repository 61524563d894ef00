//! Chat Session - conversation state plus the request/retry protocol
//!
//! Information Hiding:
//! - Session id and history are read fresh from state for every attempt
//! - In-flight calls are tracked by a cancellation token; callers only see
//!   the resulting state changes
//! - Warm-up retries are bounded and cancellable

use super::state::{SendOutcome, SessionSnapshot};
use crate::config::RetryConfig;
use crate::core::types::{ChatRequest, ChatResponse, Message, IMAGE_ONLY_PROMPT};
use crate::core::{ChatBackend, ChatOutcome};
use crate::storage::Transcript;
use crate::upload::PreparedImage;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    state: watch::Sender<SessionSnapshot>,
    inflight: Mutex<CancellationToken>,
    retry: RetryConfig,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, retry: RetryConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            backend,
            state,
            inflight: Mutex::new(CancellationToken::new()),
            retry,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Send one user turn.
    ///
    /// The user turn is appended before the request goes out. A 503 is retried
    /// after its `Retry-After` delay, up to `max_warmup_retries` times, without
    /// appending the user turn again. Any other failure becomes an error banner
    /// plus an assistant error turn.
    pub async fn send_message(
        &self,
        text: Option<&str>,
        image: Option<&PreparedImage>,
    ) -> SendOutcome {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() && image.is_none() {
            return SendOutcome::Ignored;
        }

        let message = if text.is_empty() {
            IMAGE_ONLY_PROMPT.to_string()
        } else {
            text.to_string()
        };
        let image_base64 = image.map(PreparedImage::to_data_url);

        // cancel-and-append runs under the state lock so concurrent sends
        // land their user turns in the order they took the token
        let mut token = CancellationToken::new();
        let mut prior = Vec::new();
        self.state.send_modify(|s| {
            token = self.begin_call();
            prior = s.messages.clone();
            s.messages.push(Message::user(message.clone()));
            s.loading = true;
            s.warming_up = false;
            s.error = None;
        });

        self.run(&token, &message, image_base64, &prior).await
    }

    /// Drop the conversation, the session id and any error. Cancels whatever
    /// request or warm-up wait is in flight.
    pub fn start_new_chat(&self) {
        self.state.send_modify(|s| {
            self.begin_call();
            *s = SessionSnapshot::default();
        });
        tracing::info!("[ChatSession] Started new chat");
    }

    /// Replace the conversation with a saved one
    pub fn restore(&self, transcript: Transcript) {
        self.state.send_modify(|s| {
            self.begin_call();
            *s = SessionSnapshot {
                messages: transcript.messages,
                session_id: transcript.session_id,
                ..SessionSnapshot::default()
            }
        });
    }

    pub fn transcript(&self) -> Transcript {
        let state = self.state.borrow();
        Transcript {
            session_id: state.session_id.clone(),
            messages: state.messages.clone(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.state.borrow().messages.len()
    }

    async fn run(
        &self,
        token: &CancellationToken,
        message: &str,
        image_base64: Option<String>,
        prior: &[Message],
    ) -> SendOutcome {
        let mut warmup_retries = 0;

        loop {
            let session_id = self.state.borrow().session_id.clone();
            let request =
                ChatRequest::from_history(message, image_base64.clone(), session_id, prior);

            let result = tokio::select! {
                _ = token.cancelled() => return self.superseded(),
                result = self.backend.chat(&request) => result,
            };

            match result {
                Ok(ChatOutcome::Completed(response)) => return self.complete(token, response),
                Ok(ChatOutcome::WarmingUp { retry_after, .. })
                    if warmup_retries < self.retry.max_warmup_retries =>
                {
                    warmup_retries += 1;
                    let wait = retry_after
                        .unwrap_or(Duration::from_secs(self.retry.default_retry_after_secs));
                    tracing::info!(
                        "[ChatSession] Backend warming up, retry {}/{} in {:?}",
                        warmup_retries,
                        self.retry.max_warmup_retries,
                        wait
                    );

                    if !self.apply(token, |s| s.warming_up = true) {
                        return self.superseded();
                    }
                    tokio::select! {
                        _ = token.cancelled() => return self.superseded(),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Ok(ChatOutcome::WarmingUp { detail, .. }) => {
                    let error = detail.unwrap_or_else(|| {
                        "The assistant is still warming up. Please try again shortly.".to_string()
                    });
                    return self.fail(token, error);
                }
                Ok(ChatOutcome::Rejected { status, detail }) => {
                    let error =
                        detail.unwrap_or_else(|| format!("Request failed with status {}", status));
                    return self.fail(token, error);
                }
                Err(e) => return self.fail(token, e.to_string()),
            }
        }
    }

    fn complete(&self, token: &CancellationToken, response: ChatResponse) -> SendOutcome {
        let ChatResponse {
            response,
            products,
            intent,
            session_id,
        } = response;
        tracing::debug!(
            "[ChatSession] Reply received (intent={}, products={})",
            intent,
            products.len()
        );

        let applied = self.apply(token, |s| {
            if let Some(id) = session_id.filter(|id| !id.is_empty()) {
                s.session_id = Some(id);
            }
            s.messages.push(Message::assistant(response, Some(products)));
            s.loading = false;
            s.warming_up = false;
        });

        if applied {
            SendOutcome::Completed
        } else {
            self.superseded()
        }
    }

    fn fail(&self, token: &CancellationToken, error: String) -> SendOutcome {
        tracing::warn!("[ChatSession] Send failed: {}", error);

        let applied = self.apply(token, |s| {
            s.messages.push(Message::assistant(
                format!("Sorry, something went wrong: {}", error),
                None,
            ));
            s.error = Some(error);
            s.loading = false;
            s.warming_up = false;
        });

        if applied {
            SendOutcome::Failed
        } else {
            self.superseded()
        }
    }

    fn superseded(&self) -> SendOutcome {
        tracing::debug!("[ChatSession] Discarding result of a superseded send");
        SendOutcome::Superseded
    }

    /// Mutate state unless `token` was cancelled. The check runs under the
    /// state lock, so a superseded call never writes after its successor.
    fn apply(&self, token: &CancellationToken, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.state.send_if_modified(|s| {
            if token.is_cancelled() {
                return false;
            }
            f(s);
            true
        })
    }

    /// Cancel the in-flight call, if any, and hand out a token for the next one.
    /// Always called inside a state modification.
    fn begin_call(&self) -> CancellationToken {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        inflight.cancel();
        *inflight = CancellationToken::new();
        inflight.clone()
    }
}
