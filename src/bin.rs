//! `auto-commenter` executable.
//!
//! Parses the command line, installs the tracing subscriber and hands control
//! to the interactive menu.

use std::path::PathBuf;

use auto_commenter::base::{config::Config, types::Void};
use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Posts a fixed comment under new posts in the Telegram channels you watch.
///
/// Accounts and channels are added from the menu and kept in a JSON file.
/// Runtime settings are read from `AUTO_COMMENTER_*` variables and, when
/// present, a TOML settings file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML settings file; `.hidden/config.toml` is tried when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log more: `-v` for debug output, `-vv` for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Also ship spans to an OTLP/HTTP collector.
    #[arg(long)]
    otlp: bool,
}

fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber: leveled log lines on stderr, plus OTLP export on request.
fn init_tracing(args: &Args) -> Void {
    // The menu owns stdout.
    let log_lines = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_file(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    let otlp = match args.otlp {
        true => {
            let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
            let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build();

            Some(tracing_opentelemetry::layer().with_tracer(provider.tracer("auto-commenter")))
        }
        false => None,
    };

    tracing_subscriber::registry()
        .with(otlp)
        .with(LevelFilter::from_level(level_for(args.verbose)))
        .with(log_lines)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    init_tracing(&args)?;

    let config = Config::load(args.config.as_deref())?;

    auto_commenter::start(config).await
}
