mod settings;

pub use settings::{BackendConfig, ImageConfig, LoggingConfig, RetryConfig, Settings};
