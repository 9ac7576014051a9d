//! AFT counter check tool
//!
//! Main entry point for aftcheck. Collects next-hop counters over gNMI,
//! correlates them with the AFT and the offered traffic, and exits with
//! status 1 when validation fails.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AU-3: Content of Audit Records - Structured logging
//! - CM-6: Configuration Settings - File and command line settings
//! - SI-4: System Monitoring - Forwarding counter validation

use anyhow::Context;
use clap::{Parser, Subcommand};
use sonic_aftcheck::config::DEFAULT_CONFIG_PATH;
use sonic_aftcheck::inputs::{load_aft, load_flows, load_snapshot, write_json};
use sonic_aftcheck::parser::{NEXT_HOP_ELEM, NEXT_HOP_KEY};
use sonic_aftcheck::{
    check_distribution, collect_counters, correlate, AftCheckConfig, Collection,
    CorrelationInput, CounterSnapshot,
};
use sonic_gnmi::{GnmiClient, SampleStream, UintLeaf};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for errors other than a failed validation
const EXIT_ERROR: u8 = 2;

/// AFT next-hop counter correlation
#[derive(Parser, Debug)]
#[command(name = "aftcheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// gNMI target address, overrides the configuration file
    #[arg(long, global = true)]
    target: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect one counter snapshot
    Collect {
        /// Snapshot output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Correlate two saved snapshots
    Correlate {
        /// Baseline snapshot
        #[arg(long)]
        pre: PathBuf,

        /// Updated snapshot
        #[arg(long)]
        post: PathBuf,

        /// AFT dump
        #[arg(long)]
        aft: PathBuf,

        /// Offered flows
        #[arg(long)]
        flows: PathBuf,

        #[command(flatten)]
        validation: ValidationArgs,
    },

    /// Collect, wait for the traffic window, collect again and correlate
    Run {
        /// AFT dump
        #[arg(long)]
        aft: PathBuf,

        /// Offered flows, with packet counts known after the traffic window
        #[arg(long)]
        flows: PathBuf,

        /// Seconds to wait between the two collections
        #[arg(long)]
        traffic_window_secs: u64,

        #[command(flatten)]
        validation: ValidationArgs,
    },

    /// Check how traffic spread across next-hops between two saved snapshots
    Distribution {
        /// Baseline snapshot
        #[arg(long)]
        pre: PathBuf,

        /// Updated snapshot
        #[arg(long)]
        post: PathBuf,

        /// Next-hop indices, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        indices: Vec<String>,

        /// Wanted share of each index, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        weights: Vec<f64>,

        /// Allowed absolute deviation of each share
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Sample one next-hop counter
    Watch {
        /// Next-hop index
        #[arg(long)]
        index: String,

        /// Number of samples
        #[arg(long, default_value = "5")]
        samples: usize,
    },
}

#[derive(clap::Args, Debug)]
struct ValidationArgs {
    /// Validation mode (exact, increment, transit)
    #[arg(long)]
    mode: Option<String>,

    /// Exact mode tolerance in percent of offered packets
    #[arg(long)]
    tolerance: Option<f64>,
}

impl ValidationArgs {
    fn apply(&self, config: &mut AftCheckConfig) {
        if let Some(mode) = &self.mode {
            config.validation.mode = mode.clone();
        }
        if let Some(tolerance) = self.tolerance {
            config.validation.tolerance_percent = tolerance;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("aftcheck: {:#}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("aftcheck failed: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))
}

/// Runs one command; `Ok(false)` means the check did not pass.
async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = AftCheckConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(target) = args.target {
        config.target.address = target;
    }

    match args.command {
        Command::Collect { output } => {
            config.validate()?;
            let client = connect(&config).await?;
            let collection = collect(&client, &config).await?;
            write_json(&collection.snapshot, output.as_deref())?;
            Ok(collection.is_complete())
        }
        Command::Correlate {
            pre,
            post,
            aft,
            flows,
            validation,
        } => {
            validation.apply(&mut config);
            config.validate()?;
            let pre = load_snapshot(&pre).with_context(|| format!("loading {}", pre.display()))?;
            let post =
                load_snapshot(&post).with_context(|| format!("loading {}", post.display()))?;
            correlate_and_report(&config, &pre, &post, aft, flows)
        }
        Command::Run {
            aft,
            flows,
            traffic_window_secs,
            validation,
        } => {
            validation.apply(&mut config);
            config.validate()?;
            let client = connect(&config).await?;

            let pre = collect(&client, &config).await?;
            info!(
                indices = pre.snapshot.len(),
                window_secs = traffic_window_secs,
                "Baseline collected, waiting for traffic window"
            );
            tokio::time::sleep(Duration::from_secs(traffic_window_secs)).await;
            let post = collect(&client, &config).await?;

            correlate_and_report(&config, &pre.snapshot, &post.snapshot, aft, flows)
        }
        Command::Distribution {
            pre,
            post,
            indices,
            weights,
            tolerance,
        } => {
            if let Some(tolerance) = tolerance {
                config.validation.distribution_tolerance = tolerance;
            }
            config.validate()?;
            let pre = load_snapshot(&pre).with_context(|| format!("loading {}", pre.display()))?;
            let post =
                load_snapshot(&post).with_context(|| format!("loading {}", post.display()))?;

            let deltas: Vec<u64> = indices
                .iter()
                .map(|i| post.get(i).saturating_sub(pre.get(i)))
                .collect();
            let outcome =
                check_distribution(&weights, &deltas, config.validation.distribution_tolerance);
            write_json(&outcome, None)?;

            if !outcome.passed() {
                warn!(message = %outcome.message, "Distribution check failed");
            }
            Ok(outcome.passed())
        }
        Command::Watch { index, samples } => {
            config.validate()?;
            let client = connect(&config).await?;
            let mut path = config.collector_config()?.path;
            let elem = path
                .elem
                .iter_mut()
                .find(|e| e.name == NEXT_HOP_ELEM)
                .context("counter path has no next-hop element")?;
            elem.key.insert(NEXT_HOP_KEY.to_string(), index.clone());

            let mut stream =
                SampleStream::new(&client, UintLeaf::new(path), config.sample_interval()).await?;
            for sample in stream.nexts(samples).await {
                let line = match sample {
                    Some(s) => serde_json::json!({
                        "index": index,
                        "timestamp": s.timestamp,
                        "packets-forwarded": s.value,
                    }),
                    None => serde_json::json!({ "index": index, "packets-forwarded": null }),
                };
                println!("{}", line);
            }
            stream.close().await;
            Ok(true)
        }
    }
}

async fn connect(config: &AftCheckConfig) -> anyhow::Result<GnmiClient> {
    let target = config.target_config();
    GnmiClient::connect(target)
        .await
        .with_context(|| format!("connecting to {}", config.target.address))
}

/// Runs one collection; a stream failure keeps the partial snapshot.
async fn collect(client: &GnmiClient, config: &AftCheckConfig) -> anyhow::Result<Collection> {
    let collection = collect_counters(client, &config.collector_config()?).await?;
    if let Some(e) = &collection.terminal_error {
        warn!(
            error = %e,
            indices = collection.snapshot.len(),
            "Collection ended early, continuing with partial snapshot"
        );
    }
    Ok(collection)
}

fn correlate_and_report(
    config: &AftCheckConfig,
    pre: &CounterSnapshot,
    post: &CounterSnapshot,
    aft: PathBuf,
    flows: PathBuf,
) -> anyhow::Result<bool> {
    let aft_dump = load_aft(&aft).with_context(|| format!("loading {}", aft.display()))?;
    let flows = load_flows(&flows).with_context(|| format!("loading {}", flows.display()))?;

    let report = correlate(CorrelationInput {
        pre,
        post,
        aft: &aft_dump,
        flows: &flows,
        mode: config.validation_mode()?,
        tolerance_percent: config.validation.tolerance_percent,
    });
    write_json(&report, None)?;

    if !report.passed() {
        warn!(message = %report.outcome.message, "Validation failed");
    }
    Ok(report.passed())
}
