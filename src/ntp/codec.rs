//! RFC 5905 packet codec: request building, response parsing and the
//! four-timestamp offset/delay arithmetic. No I/O happens here.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::ntp::{
    Metrics, NTP_UNIX_OFFSET, NtpTimestamp, PACKET_LEN, Packet, PacketHeader,
};
use crate::error::NtpError;

/// First byte of every request: leap 0, version field 4, client mode.
pub const REQUEST_HEADER: u8 = 0x23;

const TRANSMIT_OFFSET: usize = 40;

/// Build a client-mode request stamped with the current time.
pub fn build_request() -> [u8; PACKET_LEN] {
    build_request_at(Utc::now())
}

/// Build a client-mode request stamped with `now`.
///
/// The transmit fraction carries a random nonce rather than sub-second time;
/// a server echoes it back in the originate field.
pub fn build_request_at(now: DateTime<Utc>) -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    buf[0] = REQUEST_HEADER;
    // Truncation to u32 wraps into the next NTP era after 2036.
    let seconds = (now.timestamp() + NTP_UNIX_OFFSET as i64) as u32;
    let nonce: u32 = rand::thread_rng().r#gen();
    write_u32(&mut buf, TRANSMIT_OFFSET, seconds);
    write_u32(&mut buf, TRANSMIT_OFFSET + 4, nonce);
    buf
}

/// The 8-byte transmit timestamp field of a request or response.
pub fn transmit_field(buf: &[u8; PACKET_LEN]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[TRANSMIT_OFFSET..PACKET_LEN]);
    out
}

/// Decode a server response. Anything after the first 48 bytes
/// (extension fields, MAC) is ignored.
pub fn parse_response(bytes: &[u8]) -> Result<Packet, NtpError> {
    if bytes.len() < PACKET_LEN {
        return Err(NtpError::MalformedPacket(format!(
            "expected at least {PACKET_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let stratum = bytes[1];
    let reference_id_raw = read_u32(bytes, 12);
    let header = PacketHeader {
        leap_indicator: bytes[0] >> 6,
        version: (bytes[0] >> 3) & 0b111,
        mode: bytes[0] & 0b111,
        stratum,
        poll: bytes[2] as i8,
        precision: bytes[3] as i8,
        root_delay: short_format_secs(read_u32(bytes, 4)),
        root_dispersion: short_format_secs(read_u32(bytes, 8)),
        reference_id_raw,
        reference_id: format_reference_id(stratum, reference_id_raw),
    };

    Ok(Packet {
        header,
        reference: read_timestamp(bytes, 16),
        originate: read_timestamp(bytes, 24),
        receive: read_timestamp(bytes, 32),
        transmit: read_timestamp(bytes, 40),
        round_trip_delay: None,
        clock_offset: None,
    })
}

/// Encode a packet back into its 48-byte wire form.
pub fn encode_packet(packet: &Packet) -> [u8; PACKET_LEN] {
    let h = &packet.header;
    let mut buf = [0u8; PACKET_LEN];
    buf[0] = (h.leap_indicator & 0b11) << 6 | (h.version & 0b111) << 3 | (h.mode & 0b111);
    buf[1] = h.stratum;
    buf[2] = h.poll as u8;
    buf[3] = h.precision as u8;
    write_u32(&mut buf, 4, (h.root_delay * 65536.0) as u32);
    write_u32(&mut buf, 8, (h.root_dispersion * 65536.0) as u32);
    write_u32(&mut buf, 12, h.reference_id_raw);
    buf[16..24].copy_from_slice(&packet.reference.to_bytes());
    buf[24..32].copy_from_slice(&packet.originate.to_bytes());
    buf[32..40].copy_from_slice(&packet.receive.to_bytes());
    buf[40..48].copy_from_slice(&packet.transmit.to_bytes());
    buf
}

/// Render the reference identifier the way its stratum defines it.
///
/// * stratum 0: kiss code in ASCII (`DENY`, `RATE`, ...), `KISS` if unreadable
/// * stratum 1: reference clock code, NUL padding trimmed (`GPS`, `LOCL`)
/// * stratum 2+: upstream server address as `0x` + 8 uppercase hex digits
pub fn format_reference_id(stratum: u8, raw: u32) -> String {
    let bytes = raw.to_be_bytes();
    match stratum {
        0 => {
            let code = ascii_code(&bytes);
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_graphic()) {
                code
            } else {
                "KISS".to_string()
            }
        }
        1 => ascii_code(&bytes),
        _ => format!("0x{raw:08X}"),
    }
}

/// Four-timestamp delay and offset.
///
/// T1 = `client_send_ms`, T2 = packet receive, T3 = packet transmit,
/// T4 = `client_receive_ms`. Client times are milliseconds since the Unix
/// epoch.
pub fn compute_metrics(packet: &Packet, client_send_ms: f64, client_receive_ms: f64) -> Metrics {
    let t1 = client_send_ms / 1000.0;
    let t2 = packet.receive.as_secs_f64();
    let t3 = packet.transmit.as_secs_f64();
    let t4 = client_receive_ms / 1000.0;

    let delay = (t4 - t1) - (t3 - t2);
    let offset = ((t2 - t1) + (t3 - t4)) / 2.0;
    Metrics {
        round_trip_delay_secs: delay,
        clock_offset_secs: offset,
        round_trip_delay_ms: delay * 1000.0,
        clock_offset_ms: offset * 1000.0,
    }
}

impl NtpTimestamp {
    /// Big-endian wire encoding (seconds then fraction).
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.seconds.to_be_bytes());
        out[4..].copy_from_slice(&self.fraction.to_be_bytes());
        out
    }

    /// Convert a Unix time in milliseconds into an NTP timestamp.
    pub fn from_unix_ms(ms: f64) -> Self {
        let secs = (ms / 1000.0).floor();
        let frac = ((ms / 1000.0 - secs) * 4_294_967_296.0) as u32;
        let seconds = (secs as i64 + NTP_UNIX_OFFSET as i64) as u32;
        NtpTimestamp::from_parts(seconds, frac)
    }
}

fn ascii_code(bytes: &[u8; 4]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0 => '\0',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '?',
        })
        .collect::<String>()
        .trim_matches('\0')
        .to_string()
}

fn short_format_secs(raw: u32) -> f64 {
    f64::from(raw) / 65536.0
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn read_timestamp(bytes: &[u8], offset: usize) -> NtpTimestamp {
    NtpTimestamp::from_parts(read_u32(bytes, offset), read_u32(bytes, offset + 4))
}
