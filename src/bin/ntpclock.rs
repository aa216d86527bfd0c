use clap::{Parser, ValueEnum};
use console::{Term, set_colors_enabled, style};
use std::io::{self, IsTerminal};
use std::process;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ntpclock::{
    ClientConfig, NtpClient, NtpError, QueryResult,
    fmt as render,
    services::query::{DEFAULT_HOST, DEFAULT_PORT},
    stats::compute_stats,
};

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Offset,
    Simple,
}

#[derive(Parser, Debug)]
#[command(name = "ntpclock")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query NTP servers and report the local clock offset")]
#[command(long_about = Some(
    "Query an NTP server and report its time and the local clock offset.\n\
     \n\
     Examples:\n\
       ntpclock\n\
       ntpclock time.google.com --verbose\n\
       ntpclock ntp1.example --fallback ntp2.example --json\n\
       ntpclock 192.168.1.23:1123 --offset --infinite --interval 10"
))]
struct Args {
    /// Server to query (can include port) - Examples: [time.google.com, [2001:4860:4860::8888]:123, 192.168.1.23:123]
    #[arg(index = 1)]
    target: Option<String>,

    /// Server to query (alternative to the positional argument)
    #[arg(short, long)]
    server: Option<String>,

    /// Fallback servers, tried in order when the primary fails
    #[arg(short = 'F', long = "fallback")]
    fallbacks: Vec<String>,

    /// Port for servers given without one
    #[arg(short = 'P', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Per-server timeout in seconds
    #[arg(long, default_value_t = 5.0)]
    timeout: f64,

    /// Show the full protocol dump
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Output format
    #[arg(short = 'f', long, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Alias for JSON output
    #[arg(short = 'j', long)]
    json: bool,

    /// Alias for offset-only output
    #[arg(short = 'o', long)]
    offset: bool,

    /// Alias for one-line output
    #[arg(short = 'S', long)]
    short: bool,

    /// Pretty-print JSON
    #[arg(short = 'p', long)]
    pretty: bool,

    /// Disable colored output
    #[arg(long = "no-color", alias = "nocolor")]
    no_color: bool,

    /// Use IPv6 resolution only
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Query until interrupted
    #[arg(short = '8', long)]
    infinite: bool,

    /// Interval between queries in seconds (only with --infinite or --count)
    #[arg(short = 'i', long, default_value_t = 1.0)]
    interval: f64,

    /// Number of queries
    #[arg(short = 'c', long, default_value_t = 1)]
    count: u32,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short = 'd', long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ntpclock={level}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let mut args = Args::parse();
    init_logging(args.debug);

    if args.json {
        args.format = OutputFormat::Json;
    }
    if args.offset {
        args.format = OutputFormat::Offset;
    }
    if args.short {
        args.format = OutputFormat::Simple;
    }
    let want_color = matches!(args.format, OutputFormat::Text | OutputFormat::Simple)
        && io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none()
        && !args.no_color;
    set_colors_enabled(want_color);

    let term = Term::stdout();

    if args.infinite && args.count != 1 {
        term.write_line(
            &style("--infinite cannot be used with --count")
                .red()
                .to_string(),
        )
        .ok();
        process::exit(2);
    }
    if args.interval != 1.0 && !args.infinite && args.count == 1 {
        term.write_line(
            &style("--interval requires --infinite or --count")
                .red()
                .to_string(),
        )
        .ok();
        process::exit(2);
    }
    let timeout = match Duration::try_from_secs_f64(args.timeout) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            term.write_line(
                &style(format!("invalid --timeout: {}", args.timeout))
                    .red()
                    .to_string(),
            )
            .ok();
            process::exit(2);
        }
    };
    let Ok(interval) = Duration::try_from_secs_f64(args.interval) else {
        term.write_line(
            &style(format!("invalid --interval: {}", args.interval))
                .red()
                .to_string(),
        )
        .ok();
        process::exit(2);
    };
    if args.pretty && !matches!(args.format, OutputFormat::Json) {
        term.write_line(
            &style("--pretty has no effect without JSON output")
                .yellow()
                .to_string(),
        )
        .ok();
    }

    let host = args
        .server
        .clone()
        .or_else(|| args.target.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let config = ClientConfig::default()
        .with_host(host)
        .with_port(args.port)
        .with_timeout(timeout)
        .with_fallbacks(args.fallbacks.clone())
        .with_ipv6(args.ipv6);
    let client = NtpClient::new(config);

    let exit_code = if args.infinite || args.count > 1 {
        monitor_loop(&client, &args, interval, &term).await
    } else {
        match client.query().await {
            Ok(res) => {
                output(&term, &res, &args);
                0
            }
            Err(e) => handle_error(&term, e),
        }
    };

    process::exit(exit_code);
}

/// Repeated queries; failures are reported and retried on the next tick.
async fn monitor_loop(client: &NtpClient, args: &Args, interval: Duration, term: &Term) -> i32 {
    let mut all: Vec<QueryResult> = Vec::new();
    let mut n = 0u32;
    loop {
        match client.query().await {
            Ok(res) => {
                match args.format {
                    OutputFormat::Text if !args.verbose => {
                        term.write_line(&render::text::render_short_result(&res)).ok();
                    }
                    _ => output(term, &res, args),
                }
                let stop = matches!(res.packet.kiss_code(), Some("DENY" | "RSTR"));
                if let Some(code) = res.packet.kiss_code() {
                    warn!(server = %res.used_server, code, "kiss-of-death received");
                }
                all.push(res);
                if stop {
                    term.write_line(
                        &style("Server refused access (kiss-of-death), stopping")
                            .red()
                            .to_string(),
                    )
                    .ok();
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "query failed, retrying next interval");
                term.write_line(&style(format!("Error: {}", e)).red().to_string())
                    .ok();
            }
        }
        n += 1;
        if !args.infinite && n >= args.count {
            break;
        }
        let sleep = tokio::time::sleep(interval);
        tokio::select! {
            _ = sleep => {},
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if all.len() > 1 {
        let stats = compute_stats(&all);
        let name = client.config().host.as_str();
        match args.format {
            OutputFormat::Json => match render::json::stats_to_json(name, &stats, args.pretty) {
                Ok(s) => println!("{}", s),
                Err(e) => eprintln!("error serializing: {}", e),
            },
            OutputFormat::Offset => {}
            _ => {
                term.write_line(&render::text::render_stats(name, &stats))
                    .ok();
            }
        }
    }

    if all.is_empty() { 1 } else { 0 }
}

fn output(term: &Term, res: &QueryResult, args: &Args) {
    match args.format {
        OutputFormat::Text => {
            term.write_line(&render::text::render_result(res, args.verbose))
                .ok();
        }
        OutputFormat::Json => match render::json::to_json(res, args.pretty, args.verbose) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serializing: {}", e),
        },
        OutputFormat::Offset => {
            term.write_line(&render::text::render_offset(res)).ok();
        }
        OutputFormat::Simple => {
            term.write_line(&render::text::render_short_result(res)).ok();
        }
    }
}

fn handle_error(term: &Term, err: NtpError) -> i32 {
    term.write_line(&style(format!("Error: {}", err)).red().to_string())
        .ok();
    if err.is_resolution() {
        2
    } else if err.is_timeout() {
        3
    } else {
        1
    }
}
