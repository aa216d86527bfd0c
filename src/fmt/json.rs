#[cfg(feature = "json")]
use serde::Serialize;

use crate::domain::ntp::QueryResult;
use crate::error::NtpError;
use crate::stats::Stats;

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonServer {
    pub address: String,
    pub hostname: String,
    pub stratum: u8,
    pub reference_id: String,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonMetrics {
    pub round_trip_delay_ms: f64,
    pub clock_offset_ms: f64,
    pub root_delay: f64,
    pub root_dispersion: f64,
    pub leap_indicator: u8,
    pub mode: u8,
    pub poll: i8,
    pub reference: Option<String>,
    pub originate: Option<String>,
    pub receive: Option<String>,
    pub transmit: Option<String>,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonResult {
    /// Server time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// `null` when the server left the transmit timestamp unset.
    pub iso: Option<String>,
    pub server: JsonServer,
    pub offset_ms: f64,
    pub precision: i8,
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kiss_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonMetrics>,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonStats<'a> {
    pub server: &'a str,
    #[serde(flatten)]
    pub stats: &'a Stats,
}

#[cfg(feature = "json")]
fn result_view(r: &QueryResult, verbose: bool) -> JsonResult {
    let p = &r.packet;
    let h = &p.header;
    let details = verbose.then(|| {
        let m = r.metrics();
        JsonMetrics {
            round_trip_delay_ms: m.round_trip_delay_ms,
            clock_offset_ms: m.clock_offset_ms,
            root_delay: h.root_delay,
            root_dispersion: h.root_dispersion,
            leap_indicator: h.leap_indicator,
            mode: h.mode,
            poll: h.poll,
            reference: p.reference.to_rfc3339(),
            originate: p.originate.to_rfc3339(),
            receive: p.receive.to_rfc3339(),
            transmit: p.transmit.to_rfc3339(),
        }
    });
    JsonResult {
        timestamp: p.transmit.timestamp_ms.floor() as i64,
        iso: p.transmit.to_rfc3339(),
        server: JsonServer {
            address: r.server_ip.to_string(),
            hostname: r.used_server.clone(),
            stratum: h.stratum,
            reference_id: h.reference_id.clone(),
        },
        offset_ms: r.offset_ms(),
        precision: h.precision,
        version: h.version,
        kiss_code: p.kiss_code().map(str::to_string),
        details,
    }
}

#[cfg(feature = "json")]
fn serialize<T: Serialize>(value: &T, pretty: bool) -> Result<String, NtpError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.map_err(|e| NtpError::Other(e.to_string()))
}

/// Serialize a query result into the machine JSON view.
#[allow(unused_variables)]
pub fn to_json(result: &QueryResult, pretty: bool, verbose: bool) -> Result<String, NtpError> {
    #[cfg(feature = "json")]
    {
        serialize(&result_view(result, verbose), pretty)
    }
    #[cfg(not(feature = "json"))]
    {
        Err(NtpError::Other("json feature disabled".into()))
    }
}

/// Serialize monitoring statistics for one server.
#[allow(unused_variables)]
pub fn stats_to_json(name: &str, stats: &Stats, pretty: bool) -> Result<String, NtpError> {
    #[cfg(feature = "json")]
    {
        serialize(
            &JsonStats {
                server: name,
                stats,
            },
            pretty,
        )
    }
    #[cfg(not(feature = "json"))]
    {
        Err(NtpError::Other("json feature disabled".into()))
    }
}
