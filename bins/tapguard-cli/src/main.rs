//! TapGuard operator CLI.
//!
//! Replays recorded tap streams through the engine, simulates client
//! profiles, and prints sanction decisions and the effective configuration.
//! Everything runs against an in-process memory store.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tapguard_core::constants::ACCEPT_RELIEF;
use tapguard_core::{
    Clock, EngineConfig, ManualClock, PlayerId, SanctionOutcome, SanctionTier, SystemClock,
    TapEvent, TapRequest,
};
use tapguard_engine::sanction::{outcome_for, tier_for};
use tapguard_engine::scorer::relieve;
use tapguard_engine::AntiCheatEngine;
use tapguard_store::MemoryCounterStore;
use tracing::{debug, info, warn};

/// Simulated sessions start here so runs are reproducible.
const SIMULATION_EPOCH_MS: i64 = 1_700_000_000_000;

/// Replay sweeps the store after this many requests, on top of the store's
/// own per-second sweep.
const PURGE_EVERY_LINES: u64 = 10_000;

#[derive(Parser)]
#[command(name = "tapguard")]
#[command(version, about = "Tap validation and anomaly scoring")]
struct Cli {
    /// Configuration file (TOML, YAML, or JSON). TAPGUARD_* env vars override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON-lines stream of tap requests.
    Validate(ValidateArgs),
    /// Run a generated tap stream through the engine.
    Simulate(SimulateArgs),
    /// Print the sanction decision for a score.
    Sanction(SanctionArgs),
    /// Print the effective configuration.
    Config,
}

#[derive(Args)]
struct ValidateArgs {
    /// Input file, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Treat each request's client timestamp as server time.
    ///
    /// Useful when replaying a captured log offline.
    #[arg(long)]
    use_client_time: bool,

    /// Apply sanctions for each verdict's resulting score.
    #[arg(long)]
    apply_sanctions: bool,
}

#[derive(Args)]
struct SimulateArgs {
    /// Client behaviour to generate
    #[arg(short, long, value_enum, default_value = "human")]
    profile: Profile,

    /// Number of taps
    #[arg(short, long, default_value = "100")]
    taps: u64,

    /// RNG seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Player id used for the session
    #[arg(long, default_value = "1")]
    player: u64,
}

#[derive(Args)]
struct SanctionArgs {
    /// Anomaly score to evaluate
    #[arg(short, long)]
    score: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum Profile {
    /// Irregular gaps between 150 and 400 ms.
    Human,
    /// Machine-fast taps around 20 ms apart.
    Autoclicker,
    /// Constant 150 ms spacing.
    Metronome,
}

impl Profile {
    fn next_interval_ms(self, rng: &mut StdRng) -> i64 {
        match self {
            Profile::Human => rng.gen_range(150..=400),
            Profile::Autoclicker => rng.gen_range(18..=22),
            Profile::Metronome => 150,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let config = EngineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Validate(args) => run_validate(config, args),
        Commands::Simulate(args) => run_simulate(config, args),
        Commands::Sanction(args) => run_sanction(args),
        Commands::Config => print_json(&config),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ValidateLine<'a> {
    player_id: PlayerId,
    sequence_number: u64,
    #[serde(flatten)]
    verdict: &'a tapguard_core::TapVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    sanction: Option<SanctionOutcome>,
}

fn run_validate(config: EngineConfig, args: ValidateArgs) -> Result<()> {
    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open input {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let manual = Arc::new(ManualClock::new(0));
    let clock: Arc<dyn Clock> = if args.use_client_time {
        manual.clone()
    } else {
        Arc::new(SystemClock)
    };
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let engine = AntiCheatEngine::new(config, store.clone(), clock);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut processed = 0u64;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: TapRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(line = index + 1, error = %e, "validate: skipping malformed request");
                continue;
            }
        };

        if args.use_client_time {
            manual.set_ms(request.event.client_timestamp_ms);
        }

        let verdict = engine.validate(&request);
        let sanction = args
            .apply_sanctions
            .then(|| engine.apply_sanctions(request.event.player_id, verdict.new_anomaly_score));

        let record = ValidateLine {
            player_id: request.event.player_id,
            sequence_number: request.event.sequence_number,
            verdict: &verdict,
            sanction,
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
        processed += 1;

        if processed % PURGE_EVERY_LINES == 0 {
            let purged = store.purge_expired();
            debug!(processed, purged, resident = store.resident_len(), "validate: store swept");
        }
    }

    info!(processed, "validate: done");
    Ok(())
}

// ---------------------------------------------------------------------------
// simulate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SimulationSummary {
    profile: Profile,
    seed: u64,
    taps: u64,
    accepted: u64,
    rejected: BTreeMap<String, u64>,
    total_delta: f64,
    peak_score: f64,
    final_score: f64,
    tier: SanctionTier,
    sanction: SanctionOutcome,
    reward_multiplier: f64,
    action_blocked: bool,
}

fn run_simulate(config: EngineConfig, args: SimulateArgs) -> Result<()> {
    let clock = Arc::new(ManualClock::new(SIMULATION_EPOCH_MS));
    let store = Arc::new(MemoryCounterStore::new(clock.clone()));
    let engine = AntiCheatEngine::new(config, store, clock.clone());
    let mut rng = StdRng::seed_from_u64(args.seed);
    let player = PlayerId(args.player);

    let mut score = 0.0;
    let mut peak_score: f64 = 0.0;
    let mut total_delta = 0.0;
    let mut accepted = 0u64;
    let mut rejected: BTreeMap<String, u64> = BTreeMap::new();

    for seq in 1..=args.taps {
        if seq > 1 {
            clock.advance_ms(args.profile.next_interval_ms(&mut rng));
        }
        let event = TapEvent {
            player_id: player,
            client_timestamp_ms: clock.now_ms(),
            sequence_number: seq,
            nonce: format!("{:016x}", rng.r#gen::<u64>()),
        };

        let verdict = engine.validate_tap(&event, score);
        total_delta += verdict.anomaly_delta;
        score = verdict.new_anomaly_score;
        peak_score = peak_score.max(score);
        match verdict.reason {
            None => {
                accepted += 1;
                score = relieve(score, ACCEPT_RELIEF);
            }
            Some(reason) => *rejected.entry(reason.as_str().to_string()).or_default() += 1,
        }
    }

    let tier = tier_for(score);
    let sanction = engine.apply_sanctions(player, score);

    let summary = SimulationSummary {
        profile: args.profile,
        seed: args.seed,
        taps: args.taps,
        accepted,
        rejected,
        total_delta,
        peak_score,
        final_score: score,
        tier,
        sanction,
        reward_multiplier: engine.sanctions().reward_multiplier(player),
        action_blocked: engine.sanctions().is_action_blocked(player),
    };
    info!(profile = ?args.profile, final_score = score, "simulate: done");
    print_json(&summary)
}

// ---------------------------------------------------------------------------
// sanction
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SanctionReport {
    score: f64,
    tier: SanctionTier,
    #[serde(flatten)]
    outcome: SanctionOutcome,
}

fn run_sanction(args: SanctionArgs) -> Result<()> {
    let tier = tier_for(args.score);
    print_json(&SanctionReport {
        score: args.score,
        tier,
        outcome: outcome_for(tier),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout stays JSON.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .init();
    }
}
