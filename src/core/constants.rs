//! Protocol constants for the legacy binary APNs gateway.
//!
//! These values are fixed by Apple's binary-interface documentation and
//! MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// GATEWAY ENDPOINTS
// =============================================================================

/// Production push gateway host.
pub const GATEWAY_HOST: &str = "gateway.push.apple.com";

/// Sandbox push gateway host.
pub const GATEWAY_SANDBOX_HOST: &str = "gateway.sandbox.push.apple.com";

/// Push gateway port (production and sandbox).
pub const GATEWAY_PORT: u16 = 2195;

/// Production feedback-service host.
pub const FEEDBACK_HOST: &str = "feedback.push.apple.com";

/// Sandbox feedback-service host.
pub const FEEDBACK_SANDBOX_HOST: &str = "feedback.sandbox.push.apple.com";

/// Feedback-service port (production and sandbox).
pub const FEEDBACK_PORT: u16 = 2196;

// =============================================================================
// WIRE LIMITS
// =============================================================================

/// Maximum JSON-encoded payload size in bytes.
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Device token size in bytes (64 hex characters).
pub const DEVICE_TOKEN_LEN: usize = 32;

/// Error-response packet size in bytes.
pub const ERROR_RESPONSE_LEN: usize = 6;

// =============================================================================
// TIMING
// =============================================================================

/// Deadline for writing one frame to the gateway.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Sent notifications older than this are dropped from the replay buffer.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(60);

/// Interval between replay-buffer expiry sweeps.
pub const EXPIRE_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between feedback-service polls.
pub const FEEDBACK_CHECK_PERIOD: Duration = Duration::from_secs(5);
