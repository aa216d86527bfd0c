//! ntpclock library: RFC 5905 packet codec and an NTP query engine with
//! sequential multi-server fallback.

pub mod adapters;
pub mod domain;
mod error;
pub mod fmt;
pub mod ntp;
pub mod services;
pub mod stats;

pub use domain::ntp::{
    LeapIndicator, Metrics, NtpTimestamp, Packet, PacketHeader, QueryResult,
};
pub use error::NtpError;
pub use ntp::codec::{build_request, compute_metrics, parse_response};
pub use services::query::{ClientConfig, NtpClient, parse_target};
