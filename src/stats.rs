use crate::domain::ntp::QueryResult;
#[cfg(feature = "json")]
use serde::Serialize;

/// Summary over repeated queries of the same server.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Stats {
    pub count: usize,
    pub offset_avg: f64,
    pub offset_min: f64,
    pub offset_max: f64,
    pub rtt_avg: f64,
}

/// Offsets use the two-point formula; round trip uses the four-timestamp delay.
pub fn compute_stats(results: &[QueryResult]) -> Stats {
    if results.is_empty() {
        return Stats::default();
    }
    let count = results.len();
    let offsets: Vec<f64> = results.iter().map(QueryResult::offset_ms).collect();
    let offset_avg = offsets.iter().sum::<f64>() / count as f64;
    let offset_min = offsets.iter().copied().fold(f64::INFINITY, f64::min);
    let offset_max = offsets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let rtt_avg = results
        .iter()
        .map(|r| r.metrics().round_trip_delay_ms)
        .sum::<f64>()
        / count as f64;
    Stats {
        count,
        offset_avg,
        offset_min,
        offset_max,
        rtt_avg,
    }
}
