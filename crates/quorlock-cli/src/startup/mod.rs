//! Process startup: logging and metric registration

pub mod logging;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
