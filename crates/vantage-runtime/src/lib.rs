//! Runtime wiring for the Vantage backend core.
//!
//! Provides:
//! - The inbound event router (single consumer loop, fan-out by topic)
//! - Service assembly: correlation registry, dispatcher, health monitor,
//!   reconciler and the scheduled maintenance sweep

pub mod config;
pub mod router;
pub mod service;

// Re-exports
pub use config::ServiceConfig;

pub use router::{DetectionEvent, InboundRouter};

pub use service::VantageService;
