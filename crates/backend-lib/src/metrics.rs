// ==============
// crates/backend-lib/src/metrics.rs

//! Metric keys recorded through the `metrics` facade
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const MEETING_CREATED: &str = "meeting.created";
pub const MEETING_ENDED: &str = "meeting.ended";
pub const MEETING_ACTIVE: &str = "meeting.active";
pub const MEETING_JOINED: &str = "meeting.joined";
pub const SIGNAL_RELAYED: &str = "signal.relayed";
pub const SIGNAL_DROPPED: &str = "signal.dropped";
pub const ACTION_REJECTED: &str = "action.rejected";
pub const POLL_CLOSED: &str = "poll.closed";
pub const FILE_SHARED: &str = "file.shared";
