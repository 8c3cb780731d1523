//! Structured tracing span names and field keys.
//!
//! Spans follow the hierarchy:
//!
//! ```text
//! haruko.turn
//!   ├─> haruko.provider.pass
//!   └─> haruko.tool.dispatch
//! ```

/// Root span for one user turn.
pub const SPAN_TURN: &str = "haruko.turn";

/// Span for one provider-chain pass (first or second).
pub const SPAN_PROVIDER_PASS: &str = "haruko.provider.pass";

/// Span for dispatching one pass's action directives.
pub const SPAN_TOOL_DISPATCH: &str = "haruko.tool.dispatch";

/// Provider name field.
pub const FIELD_PROVIDER: &str = "provider";

/// Pass number field (1 or 2).
pub const FIELD_PASS: &str = "pass";

/// Turn identifier field (UUID v4).
pub const FIELD_TURN_ID: &str = "turn_id";

/// Session identifier field.
pub const FIELD_SESSION_ID: &str = "session_id";

/// Tool name field.
pub const FIELD_TOOL_NAME: &str = "tool_name";
