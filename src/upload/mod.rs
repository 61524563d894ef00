//! Image uploads
//!
//! [`preprocess`] turns raw image bytes into a payload that fits the
//! backend's size budget. [`attachment`] runs that work in the background
//! for one upload attempt while a preview is available immediately.

pub mod attachment;
pub mod preprocess;

pub use attachment::{AttachmentSlot, PayloadHandle, PayloadState, Preview};
pub use preprocess::{ImagePreprocessor, PreparedImage};
