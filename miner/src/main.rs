//! RandomJS miner
//!
//! Usage: randomjs-miner [options] <command>
//!
//! Commands:
//!   mine [TEMPLATE]       Grind nonces for a fixed duration, then re-verify
//!   stats                 Run many programs and summarize their runtimes
//!   generate              Print the program synthesized for a key
//!   verify [TEMPLATE]     Check solutions from a JSON file
//!
//! TEMPLATE is a 76-byte hashing blob as 152 lowercase hex characters; the
//! built-in test blob is used when it is omitted.

mod config;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use randomjs_pow::{
    blake2b_256, collect_stats, mine_for, BlockTemplate, FailurePolicy, Key, Miner,
    ProcessInterpreter, ProgramFactory, ProgramRunner, Solution, Verification,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::MinerConfig;
use report::{log, log_separator};

/// RandomJS proof-of-work miner
#[derive(Parser)]
#[command(name = "randomjs-miner")]
#[command(about = "RandomJS proof-of-work miner, verifier and statistics collector", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "RANDOMJS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Interpreter command, fed the program on stdin
    #[arg(long, env = "RANDOMJS_INTERPRETER", global = true)]
    interpreter: Option<String>,

    /// Per-program timeout in milliseconds
    #[arg(long, env = "RANDOMJS_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, env = "RANDOMJS_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "RANDOMJS_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine for a fixed duration and re-verify every solution
    Mine {
        /// Block template (152 hex characters)
        template: Option<String>,

        /// Session length in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Worker threads (default: one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Asymmetry exponent N (1-8)
        #[arg(short = 'n', long)]
        asymmetry: Option<u8>,

        /// Program failure policy: skip or abort
        #[arg(long)]
        policy: Option<FailurePolicy>,

        /// Write solutions as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Collect runtime and complexity statistics
    Stats {
        /// Number of programs
        #[arg(long, default_value_t = 10_000)]
        count: usize,

        /// First key seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Print the program for a key
    Generate {
        /// 32-byte key (64 hex characters)
        #[arg(long, conflicts_with = "seed")]
        key: Option<String>,

        /// Integer seed the key is derived from
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Verify solutions written by `mine --output`
    Verify {
        /// JSON file with a list of solutions
        #[arg(short, long)]
        solutions: PathBuf,

        /// Block template (152 hex characters)
        template: Option<String>,

        /// Asymmetry exponent N (1-8)
        #[arg(short = 'n', long)]
        asymmetry: Option<u8>,

        /// Program failure policy: skip or abort
        #[arg(long)]
        policy: Option<FailurePolicy>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration, then override with CLI args
    let mut config = MinerConfig::load(cli.config.as_deref())?;
    if let Some(command) = cli.interpreter {
        config.runner.command = command;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.runner.timeout_ms = timeout_ms;
    }

    match cli.command {
        Command::Mine {
            template,
            duration,
            workers,
            asymmetry,
            policy,
            output,
        } => {
            if let Some(duration) = duration {
                config.mining.duration_secs = duration;
            }
            if let Some(workers) = workers {
                config.mining.workers = workers;
            }
            apply_pow_overrides(&mut config, asymmetry, policy)?;
            let template = parse_template(template.as_deref(), &config)?;
            mine(&config, &template, output)
        }
        Command::Stats { count, seed } => stats(&config, count, seed),
        Command::Generate { key, seed } => generate(&config, key.as_deref(), seed),
        Command::Verify {
            solutions,
            template,
            asymmetry,
            policy,
        } => {
            apply_pow_overrides(&mut config, asymmetry, policy)?;
            let template = parse_template(template.as_deref(), &config)?;
            let solutions = read_solutions(&solutions)?;
            verify(&config, &template, &solutions)
        }
    }
}

fn apply_pow_overrides(
    config: &mut MinerConfig,
    asymmetry: Option<u8>,
    policy: Option<FailurePolicy>,
) -> anyhow::Result<()> {
    if let Some(asymmetry) = asymmetry {
        config.pow.asymmetry = asymmetry;
    }
    if let Some(policy) = policy {
        config.pow.failure_policy = policy;
    }
    config.pow.validate()?;
    Ok(())
}

fn parse_template(text: Option<&str>, config: &MinerConfig) -> anyhow::Result<BlockTemplate> {
    let offset = config.pow.nonce_offset;
    match text {
        Some(text) => BlockTemplate::from_hex(text, offset).context("invalid block template"),
        None => BlockTemplate::new(BlockTemplate::default().as_bytes().to_vec(), offset)
            .context("invalid nonce offset"),
    }
}

fn parse_key(text: &str) -> anyhow::Result<Key> {
    let bytes = hex::decode(text).context("key is not valid hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("key must be 32 bytes, got {}", b.len()))?;
    Ok(Key(bytes))
}

fn read_solutions(path: &Path) -> anyhow::Result<Vec<Solution>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read solutions from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid solutions file {}", path.display()))
}

fn new_miner(
    config: &MinerConfig,
    template: BlockTemplate,
) -> randomjs_pow::PowResult<Miner<ProcessInterpreter>> {
    Miner::new(
        config.pow,
        ProgramFactory::new(config.program.clone())?,
        ProcessInterpreter::new(config.runner.clone()),
        template,
    )
}

fn mine(
    config: &MinerConfig,
    template: &BlockTemplate,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    report::system_banner("RandomJS Miner");

    let workers = match config.mining.workers {
        0 => report::cpu_count(),
        n => n,
    };
    let duration = Duration::from_secs(config.mining.duration_secs);

    println!("\n[Configuration]");
    println!("    Template: {}", template.to_hex());
    println!("    Asymmetry: {} (bound {})", config.pow.asymmetry, config.pow.bound());
    println!("    Failure policy: {:?}", config.pow.failure_policy);
    println!("    Interpreter: {} (timeout {} ms)", config.runner.command, config.runner.timeout_ms);
    println!("    Workers: {}", workers);
    println!("    Duration: {}", report::format_duration(duration));

    log_separator();
    log(&format!("Mining for {} seconds...", config.mining.duration_secs));
    let session = mine_for(template, workers, duration, |_, template| {
        new_miner(config, template)
    })
    .context("mining failed")?;

    for solution in &session.solutions {
        log(&format!(
            "Nonce: {}, proof: {}",
            solution.nonce,
            hex::encode(solution.proof)
        ));
    }
    report::print_session(&session);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&session.solutions)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write solutions to {}", path.display()))?;
        info!(path = %path.display(), count = session.solutions.len(), "solutions written");
    }

    verify(config, template, &session.solutions)
}

fn verify(
    config: &MinerConfig,
    template: &BlockTemplate,
    solutions: &[Solution],
) -> anyhow::Result<()> {
    log_separator();
    log(&format!("Verifying {} solutions...", solutions.len()));

    let mut miner = new_miner(config, template.clone())?;
    let start = Instant::now();
    let mut invalid = 0usize;
    for solution in solutions {
        let outcome = miner
            .check(solution)
            .with_context(|| format!("verification of nonce {} failed", solution.nonce))?;
        if outcome != Verification::Valid {
            warn!(nonce = solution.nonce, %outcome, "solution rejected");
            invalid += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("    Verified:      {}", solutions.len() - invalid);
    println!("    Rejected:      {}", invalid);
    println!("    Time:          {}", report::format_duration(elapsed));
    if !solutions.is_empty() {
        println!(
            "    Per solution:  {:.3} ms",
            elapsed.as_secs_f64() * 1e3 / solutions.len() as f64
        );
    }

    if invalid > 0 {
        bail!("{} of {} solutions are invalid", invalid, solutions.len());
    }
    Ok(())
}

fn stats(config: &MinerConfig, count: usize, seed: u64) -> anyhow::Result<()> {
    report::system_banner("RandomJS Statistics");
    println!("\n[Configuration]");
    println!("    Programs: {}", report::format_number(count as u64));
    println!("    First seed: {}", seed);
    println!("    Interpreter: {} (timeout {} ms)", config.runner.command, config.runner.timeout_ms);

    let factory = ProgramFactory::new(config.program.clone())?;
    let mut runner = ProgramRunner::new(ProcessInterpreter::new(config.runner.clone()));

    log_separator();
    log("Collecting statistics...");
    let run = collect_stats(&factory, &mut runner, count, seed, |percent| {
        log(&format!("{}% complete", percent));
    })
    .context("statistics run failed")?;

    report::print_stats(&run);
    Ok(())
}

fn generate(config: &MinerConfig, key: Option<&str>, seed: Option<u64>) -> anyhow::Result<()> {
    let key = match (key, seed) {
        (Some(text), _) => parse_key(text)?,
        (None, Some(seed)) => Key::from_seed(seed),
        (None, None) => Key(blake2b_256(BlockTemplate::default().as_bytes())),
    };
    let factory = ProgramFactory::new(config.program.clone())?;
    let program = factory.generate(&key)?;
    let metrics = program.metrics();
    info!(
        %key,
        length = program.len(),
        cyclomatic = metrics.cyclomatic,
        halstead = metrics.halstead_difficulty,
        "program generated"
    );
    println!("{}", program.text());
    Ok(())
}
