//! Shared HTTP plumbing for the network-backed tools.

use std::time::Duration;
use wayfarer_core::error::ToolError;

const USER_AGENT: &str = concat!("wayfarer/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by every tool.
pub fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a transport failure to a tool error.
pub fn transport_error(tool_name: &str, timeout_secs: u64, err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        ToolError::Timeout {
            tool_name: tool_name.to_string(),
            timeout_secs,
        }
    } else {
        ToolError::Transport {
            tool_name: tool_name.to_string(),
            reason: err.to_string(),
        }
    }
}
