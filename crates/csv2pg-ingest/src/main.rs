//! csv2pg - bulk-load a directory of CSV files into PostgreSQL

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, warn};

use csv2pg_common::connection::{DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER};
use csv2pg_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use csv2pg_common::ConnectionConfig;
use csv2pg_ingest::config::{
    parse_delimiter, DEFAULT_BATCH_ROWS, DEFAULT_EXTENSION, DEFAULT_PROBE_TIMEOUT_SECS,
};
use csv2pg_ingest::progress::ConsoleSink;
use csv2pg_ingest::{probe, Engine, LoadOptions, RunSummary};

/// Exit code for usage and configuration errors, matching fatal run aborts.
const EXIT_FATAL: i32 = 2;

/// Exit code after a second interrupt.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "csv2pg")]
#[command(author, version, about = "Bulk-load a directory of CSV files into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every CSV file in a directory, one table per file
    Load(LoadArgs),

    /// Check that the server is reachable with these credentials
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Database host
    #[arg(long, env = "PGHOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Database port
    #[arg(long, env = "PGPORT", default_value_t = DEFAULT_PORT,
          value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Database name
    #[arg(long, env = "PGDATABASE", default_value = DEFAULT_DATABASE)]
    database: String,

    /// Login role
    #[arg(short, long, env = "PGUSER", default_value = DEFAULT_USER)]
    user: String,

    /// Password
    #[arg(long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    password: String,
}

impl ConnectionArgs {
    fn into_config(self) -> ConnectionConfig {
        ConnectionConfig::new()
            .with_host(self.host)
            .with_port(self.port)
            .with_database(self.database)
            .with_user(self.user)
            .with_password(self.password)
    }
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Directory containing the source files
    #[arg(short, long)]
    dir: PathBuf,

    /// Target schema, created if missing
    #[arg(short, long, default_value = "public")]
    schema: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// File extension to pick up, case-insensitive
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    extension: String,

    /// Field delimiter (a single character, or "tab")
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Rows per COPY chunk
    #[arg(long, default_value_t = DEFAULT_BATCH_ROWS as u64,
          value_parser = clap::value_parser!(u64).range(1..))]
    batch_rows: u64,

    /// Give up connecting after this many seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: Option<u64>,

    /// Print the run summary as JSON on stdout; progress goes to stderr
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Seconds to wait for the server
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("csv2pg")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {e}");
            log_config
        }
    };

    let guard = init_logging(&log_config).context("Failed to initialize logging")?;

    let outcome = match cli.command {
        Command::Load(args) => load(args).await,
        Command::Check(args) => check(args).await,
    };
    let code = outcome.unwrap_or_else(|e| {
        error!(error = %e, "csv2pg failed");
        eprintln!("Error: {e:#}");
        EXIT_FATAL
    });

    // process::exit skips destructors; flush file logs first
    drop(guard);
    process::exit(code);
}

async fn load(args: LoadArgs) -> Result<i32> {
    let config = args.connection.into_config();
    config.validate().context("Invalid connection settings")?;

    let batch_rows = usize::try_from(args.batch_rows).unwrap_or(usize::MAX);
    let mut options = LoadOptions::new()
        .with_extension(args.extension)
        .with_delimiter(args.delimiter)
        .with_batch_rows(batch_rows);
    if let Some(secs) = args.connect_timeout {
        options = options.with_connect_timeout(Duration::from_secs(secs));
    }

    let engine = Engine::postgres(options);
    cancel_on_interrupt(engine.cancellation_token());

    let summary: RunSummary = if args.json {
        let sink = |line: &str| eprintln!("{line}");
        engine.run(config, &args.schema, &args.dir, &sink).await
    } else {
        let sink = ConsoleSink::new();
        let summary = engine.run(config, &args.schema, &args.dir, &sink).await;
        sink.finish();
        summary
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?;
        println!("{json}");
    }

    Ok(summary.exit_code())
}

async fn check(args: CheckArgs) -> Result<i32> {
    let config = args.connection.into_config();
    config.validate().context("Invalid connection settings")?;

    let report = probe(&config, Duration::from_secs(args.timeout))
        .await
        .context("Connectivity check failed")?;

    println!(
        "OK: connected to {} as {} (PostgreSQL {}, {} ms)",
        config.display_target(),
        config.user,
        report.server_version,
        report.elapsed.as_millis()
    );
    Ok(0)
}

/// First Ctrl-C cancels the run cleanly; a second one exits immediately.
fn cancel_on_interrupt(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, cancelling after the current step");
        eprintln!("Interrupted: rolling back the current file. Press Ctrl-C again to quit.");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            process::exit(EXIT_INTERRUPTED);
        }
    });
}
