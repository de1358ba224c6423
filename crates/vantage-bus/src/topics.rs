//! Fixed topic names shared with the edge agents.

/// Outbound device commands.
pub const COMMAND_REQUEST: &str = "vms/command/request";

/// Inbound command responses, keyed by correlation ID.
pub const COMMAND_RESPONSE: &str = "vms/command/response";

/// Inbound device liveness reports.
pub const DEVICE_HEALTH: &str = "vms/device/health";

/// Inbound AI detection events.
pub const AI_EVENT: &str = "vms/ai/event";

/// Every inbound topic the backend consumes.
pub const INBOUND: &[&str] = &[COMMAND_RESPONSE, DEVICE_HEALTH, AI_EVENT];
