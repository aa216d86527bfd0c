use thiserror::Error;

/// Top-level error type for the ntpclock library.
#[derive(Error, Debug)]
pub enum NtpError {
    /// Response too short or carrying unusable field values.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    /// No reply from `host` within the configured timeout.
    #[error("timeout: no response from {host} within {timeout_ms} ms")]
    Timeout { host: String, timeout_ms: u128 },
    /// DNS resolution failure.
    #[error("dns: {0}")]
    Dns(String),
    /// Socket bind, connect, send or receive failure.
    #[error("transport: {0}")]
    Transport(String),
    /// Every configured host failed.
    #[error("all servers unreachable (tried {}): {last}", .attempted.join(", "))]
    AllServersUnreachable {
        attempted: Vec<String>,
        #[source]
        last: Box<NtpError>,
    },
    /// Target string could not be parsed.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// Other error cases.
    #[error("other: {0}")]
    Other(String),
}

impl NtpError {
    /// True when the error (or the last error behind an exhausted host list)
    /// is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            NtpError::Timeout { .. } => true,
            NtpError::AllServersUnreachable { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// True for resolution and target parsing failures.
    pub fn is_resolution(&self) -> bool {
        match self {
            NtpError::Dns(_) | NtpError::InvalidTarget(_) => true,
            NtpError::AllServersUnreachable { last, .. } => last.is_resolution(),
            _ => false,
        }
    }
}
