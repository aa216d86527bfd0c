use crate::domain::ntp::{NtpTimestamp, QueryResult, mode_name};
use crate::stats::Stats;
use console::style;

fn iso(ts: &NtpTimestamp) -> String {
    ts.to_rfc3339().unwrap_or_else(|| "-".to_string())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default human view, with the full protocol dump appended when `verbose`.
pub fn render_result(r: &QueryResult, verbose: bool) -> String {
    let ip_version = if r.server_ip.is_ipv6() { "v6" } else { "v4" };
    let (utc, local) = match r.server_time() {
        Some(dt) => (
            dt.to_rfc2822(),
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
        ),
        None => ("-".to_string(), "-".to_string()),
    };
    let h = &r.packet.header;

    let mut out = format!(
        "{srv_lbl} {srv_val} ({host}, {ver})\n\
         {utc_lbl} {utc_val}\n\
         {loc_lbl} {loc_val}\n\
         {off_lbl} {off_val:+.3} s\n\
         {prc_lbl} 2^{prc_val}\n\
         {str_lbl} {str_val}",
        srv_lbl = style("Server:").cyan().bold(),
        srv_val = style(r.server_ip).green(),
        host = r.used_server,
        ver = ip_version,
        utc_lbl = style("UTC Time:").cyan().bold(),
        utc_val = style(utc).green(),
        loc_lbl = style("Local Time:").cyan().bold(),
        loc_val = style(local).green(),
        off_lbl = style("Clock Offset:").cyan().bold(),
        off_val = r.offset_ms() / 1000.0,
        prc_lbl = style("Precision:").cyan().bold(),
        prc_val = h.precision,
        str_lbl = style("Stratum:").cyan().bold(),
        str_val = h.stratum,
    );

    if let Some(code) = r.packet.kiss_code() {
        out.push_str(&format!(
            "\n{} {}",
            style("Kiss-of-Death:").red().bold(),
            style(code).red()
        ));
    }

    if verbose {
        out.push('\n');
        out.push_str(&render_verbose(r));
    }
    out
}

/// Protocol dump: header fields, the four timestamps, the raw transmit
/// field and the four-timestamp metrics.
pub fn render_verbose(r: &QueryResult) -> String {
    let h = &r.packet.header;
    let p = &r.packet;
    let metrics = r.metrics();
    let mut out = String::new();

    out.push_str(&format!("{}\n", style("=== Header ===").bold()));
    out.push_str(&format!(
        "  {} {} ({})\n",
        style("Leap Indicator:").cyan(),
        h.leap_indicator,
        h.leap()
    ));
    out.push_str(&format!("  {} {}\n", style("Version:").cyan(), h.version));
    out.push_str(&format!(
        "  {} {} ({})\n",
        style("Mode:").cyan(),
        h.mode,
        mode_name(h.mode)
    ));
    out.push_str(&format!("  {} {}\n", style("Stratum:").cyan(), h.stratum));
    out.push_str(&format!(
        "  {} 2^{} ({} s)\n",
        style("Poll Interval:").cyan(),
        h.poll,
        h.poll_interval_secs()
    ));
    out.push_str(&format!(
        "  {} 2^{} ({:.9} s)\n",
        style("Precision:").cyan(),
        h.precision,
        h.precision_secs()
    ));
    out.push_str(&format!(
        "  {} {:.6} s\n",
        style("Root Delay:").cyan(),
        h.root_delay
    ));
    out.push_str(&format!(
        "  {} {:.6} s\n",
        style("Root Dispersion:").cyan(),
        h.root_dispersion
    ));
    out.push_str(&format!(
        "  {} {}\n",
        style("Reference ID:").cyan(),
        h.reference_id
    ));

    out.push_str(&format!("{}\n", style("=== Timestamps ===").bold()));
    for (label, ts) in [
        ("Reference:", &p.reference),
        ("Originate:", &p.originate),
        ("Receive:", &p.receive),
        ("Transmit:", &p.transmit),
    ] {
        out.push_str(&format!("  {:<11} {}\n", style(label).cyan(), iso(ts)));
    }

    let raw = r.transmit_bytes();
    let t = &p.transmit;
    out.push_str(&format!("{}\n", style("=== Transmit Timestamp ===").bold()));
    out.push_str(&format!("  {} {}\n", style("Raw:").cyan(), hex(raw)));
    out.push_str(&format!(
        "  {} {} = {} (unix {})\n",
        style("Seconds:").cyan(),
        hex(&raw[..4]),
        t.seconds,
        t.unix_seconds
    ));
    out.push_str(&format!(
        "  {} {} = {} ({:.3} ms)\n",
        style("Fraction:").cyan(),
        hex(&raw[4..]),
        t.fraction,
        t.fractional_ms
    ));

    out.push_str(&format!("{}\n", style("=== Metrics ===").bold()));
    out.push_str(&format!(
        "  {} {:.3} ms\n",
        style("Round Trip Delay:").cyan(),
        metrics.round_trip_delay_ms
    ));
    out.push_str(&format!(
        "  {} {:+.3} ms",
        style("Clock Offset (4-point):").cyan(),
        metrics.clock_offset_ms
    ));
    out
}

/// Offset only, in seconds, for scripting.
pub fn render_offset(r: &QueryResult) -> String {
    format!("{:.6}", r.offset_ms() / 1000.0)
}

/// One line per sample for monitoring mode.
pub fn render_short_result(r: &QueryResult) -> String {
    let time = r
        .server_time()
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} [{}] offset {} stratum {}",
        style(time).dim(),
        style(&r.used_server).green(),
        r.server_ip,
        style(format!("{:+.3} ms", r.offset_ms())).yellow(),
        r.packet.header.stratum
    )
}

/// Summary line printed after repeated queries.
pub fn render_stats(name: &str, st: &Stats) -> String {
    format!(
        "{} {}: count {} offset avg {:.3} ms (min {:.3}, max {:.3}) rtt avg {:.3} ms",
        style("Stats").bold(),
        style(name).green(),
        st.count,
        st.offset_avg,
        st.offset_min,
        st.offset_max,
        st.rtt_avg
    )
}
