mod config;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use eventseq_engine::{
    ensure_empty_account, render_discovery, verify_bundle, AccountReset, CommandExporter,
    CommandReset, EngineError, FixtureWriter, Runner,
};
use eventseq_provider::StripeClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{select_keys, HarnessConfig, RunPayload};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Record Stripe event fixtures by running scripted timelines.
#[derive(Parser)]
#[command(
    name = "eventseq",
    version,
    about = "Record Stripe event fixtures by running scripted timelines"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a timeline (or `*` for all missing ones) and write its fixture bundle
    Run {
        /// JSON payload: {"data_dir", "stripe_sec_key", "event_seq_key", "fast_mode"?}
        #[arg(long)]
        data: String,
        /// Harness config TOML (defaults to $EVENTSEQ_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List registered timeline keys
    List,

    /// Check a written bundle: event partition, step types and snapshot hashes
    Verify {
        /// Bundle directory (<data_dir>/<key>)
        dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, config } => {
            cmd_run(&data, config.as_deref(), cli.output, cli.quiet);
        }
        Commands::List => cmd_list(cli.output),
        Commands::Verify { dir } => cmd_verify(&dir, cli.output, cli.quiet),
    }
}

fn cmd_list(output: OutputFormat) {
    let keys: Vec<&str> = eventseq_timelines::registry().keys().copied().collect();
    match output {
        OutputFormat::Text => {
            for key in keys {
                println!("{}", key);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!(keys));
        }
    }
}

fn cmd_verify(dir: &Path, output: OutputFormat, quiet: bool) {
    match verify_bundle(dir) {
        Ok(summary) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Text => println!(
                    "valid: {} steps, {} events, {} snapshots",
                    summary.steps, summary.events, summary.snapshots
                ),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "steps": summary.steps,
                        "events": summary.events,
                        "snapshots": summary.snapshots,
                    })
                ),
            }
        }
        Err(e) => {
            report_error(&format!("invalid bundle: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_run(data: &str, config_path: Option<&Path>, output: OutputFormat, quiet: bool) {
    let payload = match RunPayload::parse(data) {
        Ok(p) => p,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };
    let config = match HarnessConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let registry = eventseq_timelines::registry();
    let registered: Vec<&str> = registry.keys().copied().collect();
    let keys = match select_keys(&payload.event_seq_key, &registered, &payload.data_dir) {
        Ok(k) => k,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if !payload.fast_mode && config.exporter.binary.is_none() {
        report_error(
            "error: no exporter binary configured; set [exporter].binary or EVENTSEQ_EXPORTER_BIN",
            output,
            quiet,
        );
        process::exit(1);
    }
    tracing::info!(timelines = ?keys, fast_mode = payload.fast_mode, "selected timelines");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let stripe = StripeClient::with_config(&payload.stripe_sec_key, &config.stripe);
    for key in keys {
        let Some(build) = registry.get(key) else {
            continue;
        };
        let result = runtime.block_on(run_timeline(key, *build, &stripe, &payload, &config));
        if let Err(e) = result {
            report_error(&format!("timeline '{}' failed: {}", key, e), output, quiet);
            process::exit(1);
        }
    }
}

async fn run_timeline(
    key: &str,
    build: eventseq_timelines::Builder,
    stripe: &StripeClient,
    payload: &RunPayload,
    config: &HarnessConfig,
) -> Result<(), EngineError> {
    tracing::info!(timeline = key, "writing timeline");
    let timeline = build(stripe);

    if payload.fast_mode {
        let options = config.run_options(&std::env::temp_dir());
        let steps = Runner::new(stripe, options).discover(timeline).await?;
        print!("{}", render_discovery(&steps));
        return Ok(());
    }

    let reset = config.reset.command.as_deref().map(CommandReset::new);
    ensure_empty_account(
        stripe,
        reset.as_ref().map(|r| r as &dyn AccountReset),
        config.reset.policy(),
    )
    .await?;

    let Some(binary) = &config.exporter.binary else {
        return Err(EngineError::Export("no exporter binary configured".to_string()));
    };
    let mut exporter = CommandExporter::new(binary, &payload.stripe_sec_key);
    if let Some(build_command) = &config.exporter.build_command {
        exporter = exporter.with_build_command(build_command);
    }

    let writer = FixtureWriter::new(&payload.data_dir, key)
        .with_snapshot_extension(&config.exporter.snapshot_extension);
    writer.prepare()?;

    let options = config.run_options(&writer.downloads_dir());
    let record = Runner::new(stripe, options)
        .with_exporter(&exporter)
        .run(timeline)
        .await;
    let written = record.and_then(|record| writer.write(record));
    if let Err(e) = written {
        if let Err(cleanup) = writer.discard() {
            tracing::warn!(error = %cleanup, "could not remove partial bundle");
        }
        return Err(e);
    }

    tracing::info!(timeline = key, dir = %writer.dir().display(), "timeline written");
    Ok(())
}

fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
