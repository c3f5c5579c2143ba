//! Identity headers shared by every agent.
//!
//! All agents present the same browser-like User-Agent; they are told apart
//! server-side only through `X-Agent-ID`.

/// Browser User-Agent sent by every agent unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Header carrying the agent id, for correlating server logs.
pub const AGENT_ID_HEADER: &str = "X-Agent-ID";

/// `Accept-Language` sent with every request.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ja;q=0.8";

/// Tool identification appended to the library version, used in debug logs.
#[must_use]
pub(crate) fn tool_identity() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("docfetch/{version}")
}
