//! NTP domain types: parsed timestamps, packet header, packet and query result.

use chrono::{DateTime, Utc};
use std::net::IpAddr;

#[cfg(feature = "json")]
use serde::Serialize;

use crate::ntp::codec;

/// Seconds between the NTP era 0 epoch (1900-01-01) and the Unix epoch.
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Size of an NTP packet without extension fields.
pub const PACKET_LEN: usize = 48;

const FRACTION_SCALE: f64 = 4_294_967_296.0; // 2^32

/// NTP timestamp read from the wire, with its derived Unix views.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct NtpTimestamp {
    /// Raw seconds since 1900-01-01T00:00:00Z.
    pub seconds: u32,
    /// Raw binary fraction of a second (fraction / 2^32).
    pub fraction: u32,
    /// `seconds - NTP_UNIX_OFFSET`.
    pub unix_seconds: i64,
    /// Fraction expressed in milliseconds, unrounded.
    pub fractional_ms: f64,
    /// Milliseconds since the Unix epoch (`unix_seconds * 1000 + fractional_ms`).
    pub timestamp_ms: f64,
}

impl NtpTimestamp {
    pub fn from_parts(seconds: u32, fraction: u32) -> Self {
        let unix_seconds = i64::from(seconds) - NTP_UNIX_OFFSET as i64;
        let fractional_ms = f64::from(fraction) / FRACTION_SCALE * 1000.0;
        Self {
            seconds,
            fraction,
            unix_seconds,
            fractional_ms,
            timestamp_ms: unix_seconds as f64 * 1000.0 + fractional_ms,
        }
    }

    /// Seconds since the Unix epoch as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.unix_seconds as f64 + f64::from(self.fraction) / FRACTION_SCALE
    }

    /// True for the all-zero "unset" timestamp.
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }

    /// Calendar value, `None` when outside chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let nanos = ((u64::from(self.fraction) * 1_000_000_000) >> 32) as u32;
        DateTime::from_timestamp(self.unix_seconds, nanos)
    }

    /// RFC 3339 rendering; `None` for an unset (all-zero) field or one
    /// outside chrono's range.
    pub fn to_rfc3339(&self) -> Option<String> {
        if self.is_zero() {
            return None;
        }
        self.to_datetime().map(|dt| dt.to_rfc3339())
    }
}

/// Leap second warning carried in the two top bits of the first header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub enum LeapIndicator {
    NoWarning,
    InsertSecond,
    DeleteSecond,
    Unsynchronized,
}

impl LeapIndicator {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::InsertSecond,
            2 => LeapIndicator::DeleteSecond,
            _ => LeapIndicator::Unsynchronized,
        }
    }
}

impl std::fmt::Display for LeapIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeapIndicator::NoWarning => write!(f, "no warning"),
            LeapIndicator::InsertSecond => write!(f, "last minute has 61 seconds"),
            LeapIndicator::DeleteSecond => write!(f, "last minute has 59 seconds"),
            LeapIndicator::Unsynchronized => write!(f, "clock unsynchronized"),
        }
    }
}

/// Human readable association mode.
pub fn mode_name(mode: u8) -> &'static str {
    match mode {
        1 => "symmetric active",
        2 => "symmetric passive",
        3 => "client",
        4 => "server",
        5 => "broadcast",
        6 => "control",
        7 => "private",
        _ => "reserved",
    }
}

/// Fixed 16-byte NTP header that precedes the timestamps.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct PacketHeader {
    pub leap_indicator: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    /// Poll interval exponent (log2 seconds).
    pub poll: i8,
    /// Clock precision exponent (log2 seconds).
    pub precision: i8,
    /// Root delay in seconds (16.16 fixed-point on the wire).
    pub root_delay: f64,
    /// Root dispersion in seconds (16.16 fixed-point on the wire).
    pub root_dispersion: f64,
    pub reference_id_raw: u32,
    /// Stratum-dependent rendering of `reference_id_raw`.
    pub reference_id: String,
}

impl PacketHeader {
    pub fn leap(&self) -> LeapIndicator {
        LeapIndicator::from_bits(self.leap_indicator)
    }

    pub fn poll_interval_secs(&self) -> f64 {
        2f64.powi(i32::from(self.poll))
    }

    pub fn precision_secs(&self) -> f64 {
        2f64.powi(i32::from(self.precision))
    }
}

/// Decoded NTP packet. Delay and offset stay `None` until
/// [`Packet::apply_metrics`] is called.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Packet {
    pub header: PacketHeader,
    pub reference: NtpTimestamp,
    pub originate: NtpTimestamp,
    pub receive: NtpTimestamp,
    pub transmit: NtpTimestamp,
    /// Round-trip delay in seconds.
    pub round_trip_delay: Option<f64>,
    /// Clock offset in seconds, positive when the local clock is behind.
    pub clock_offset: Option<f64>,
}

impl Packet {
    /// Stratum 0 replies are kiss-of-death control messages.
    pub fn is_kiss_of_death(&self) -> bool {
        self.header.stratum == 0
    }

    /// Kiss code (`DENY`, `RSTR`, `RATE`, ...) of a kiss-of-death reply.
    pub fn kiss_code(&self) -> Option<&str> {
        self.is_kiss_of_death()
            .then_some(self.header.reference_id.as_str())
    }

    /// Compute the four-timestamp metrics and store them on the packet.
    pub fn apply_metrics(&mut self, client_send_ms: f64, client_receive_ms: f64) -> Metrics {
        let metrics = codec::compute_metrics(self, client_send_ms, client_receive_ms);
        self.round_trip_delay = Some(metrics.round_trip_delay_secs);
        self.clock_offset = Some(metrics.clock_offset_secs);
        metrics
    }
}

/// Round-trip delay and clock offset from the four protocol timestamps.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Metrics {
    pub round_trip_delay_secs: f64,
    pub clock_offset_secs: f64,
    pub round_trip_delay_ms: f64,
    pub clock_offset_ms: f64,
}

/// Result of a successful query against one of the configured hosts.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct QueryResult {
    /// Response bytes exactly as received.
    pub raw: Vec<u8>,
    pub packet: Packet,
    pub server_ip: IpAddr,
    pub port: u16,
    /// Configured host string that answered.
    pub used_server: String,
    /// Local clock right before the request was sent (ms since Unix epoch).
    pub client_send_ms: f64,
    /// Local clock right after the reply arrived (ms since Unix epoch).
    pub client_receive_ms: f64,
}

impl QueryResult {
    /// Two-point offset: server transmit time minus local receive time, in ms.
    pub fn offset_ms(&self) -> f64 {
        self.packet.transmit.timestamp_ms - self.client_receive_ms
    }

    /// Four-timestamp delay/offset using the recorded local send and receive times.
    pub fn metrics(&self) -> Metrics {
        codec::compute_metrics(&self.packet, self.client_send_ms, self.client_receive_ms)
    }

    /// Server time (transmit timestamp) as a calendar value.
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        self.packet.transmit.to_datetime()
    }

    /// Raw 8 bytes of the transmit timestamp field.
    pub fn transmit_bytes(&self) -> &[u8] {
        &self.raw[40..PACKET_LEN]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_seconds_is_raw_minus_epoch_offset() {
        for seconds in [0u32, 1, 2_208_988_800, 3_900_000_000, u32::MAX] {
            let ts = NtpTimestamp::from_parts(seconds, 0);
            assert_eq!(ts.unix_seconds, i64::from(seconds) - 2_208_988_800);
        }
    }

    #[test]
    fn fraction_to_milliseconds() {
        assert_eq!(NtpTimestamp::from_parts(0, 0).fractional_ms, 0.0);
        assert_eq!(NtpTimestamp::from_parts(0, 0x8000_0000).fractional_ms, 500.0);
        let max = NtpTimestamp::from_parts(0, u32::MAX).fractional_ms;
        assert!((max - 999.999_999_77).abs() < 1e-6, "{max}");
    }

    #[test]
    fn timestamp_ms_combines_unrounded_fraction() {
        // 2024-01-01T00:00:00Z plus a quarter second
        let ts = NtpTimestamp::from_parts(3_913_056_000, 0x4000_0000);
        assert_eq!(ts.unix_seconds, 1_704_067_200);
        assert_eq!(ts.timestamp_ms, 1_704_067_200_250.0);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T00:00:00.250+00:00");
        assert_eq!(ts.to_rfc3339().as_deref(), Some("2024-01-01T00:00:00.250+00:00"));
    }

    #[test]
    fn unset_timestamp_has_no_calendar_rendering() {
        let ts = NtpTimestamp::from_parts(0, 0);
        assert!(ts.is_zero());
        assert!(ts.to_datetime().is_some());
        assert_eq!(ts.to_rfc3339(), None);
    }

    #[test]
    fn header_exponents() {
        let header = PacketHeader {
            leap_indicator: 3,
            version: 4,
            mode: 4,
            stratum: 2,
            poll: 6,
            precision: -20,
            root_delay: 0.0,
            root_dispersion: 0.0,
            reference_id_raw: 0,
            reference_id: String::new(),
        };
        assert_eq!(header.poll_interval_secs(), 64.0);
        assert!((header.precision_secs() - 9.5367e-7).abs() < 1e-10);
        assert_eq!(header.leap(), LeapIndicator::Unsynchronized);
        assert_eq!(mode_name(header.mode), "server");
    }
}
