//! Device command dispatch with response correlation.
//!
//! Provides:
//! - Command kinds and the outbound command envelope
//! - The correlation registry linking commands to their responses
//! - The dispatcher that publishes a command and blocks the caller until
//!   a matching response arrives or the deadline fires

pub mod command;
pub mod correlation;
pub mod dispatcher;

// Re-exports
pub use command::{CommandEnvelope, CommandKind, CommandResponse, TargetDevice};

pub use correlation::{CorrelationError, CorrelationRegistry};

pub use dispatcher::{CommandDispatcher, CommandError, DispatcherConfig};
