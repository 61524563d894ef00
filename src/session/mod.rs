//! Chat session client
//!
//! Owns the conversation, the backend-assigned session id and the warm-up
//! retry protocol. Presentation layers observe [`SessionSnapshot`]s through a
//! watch channel and drive the session with `send_message` and
//! `start_new_chat`.

mod chat_session;
mod state;

pub use chat_session::ChatSession;
pub use state::{SendOutcome, SessionSnapshot};
