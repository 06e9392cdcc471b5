//! edgecert - unattended certificate renewal for CDN-fronted domains
//!
//! Renews the certificate through ACME DNS-01 and deploys it to the CDN,
//! either on a cron schedule and authenticated HTTP trigger (`serve`) or once
//! from the command line (`renew`).

mod commands;
mod trigger;

use clap::{Parser, Subcommand};
use commands::{RenewCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "EDGECERT_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full, json
    #[arg(
        long,
        default_value = "compact",
        env = "EDGECERT_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger and run renewals on a schedule
    Serve(ServeCommand),
    /// Run a single renewal and print the outcome as JSON
    Renew(RenewCommand),
}

/// edgecert crates at `level`, noisy dependencies at warn.
fn default_filter(level: &str) -> String {
    format!(
        "edgecert={level},\
         edgecert_core={level},\
         edgecert_acme={level},\
         edgecert_dns={level},\
         edgecert_cdn={level},\
         edgecert_renewal={level},\
         instant_acme=warn,\
         hickory_resolver=warn,\
         hickory_proto=warn,\
         h2=warn,\
         tower=warn,\
         tower_http=warn,\
         hyper=warn,\
         hyper_util=warn,\
         reqwest=warn,\
         rustls=warn",
        level = level
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(default_filter(&log_level))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
        Commands::Renew(renew_cmd) => renew_cmd.execute(),
    }
}
