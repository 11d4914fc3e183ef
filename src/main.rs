//! Qumud - demo driver
//!
//! Creates a world, registers a handful of simulated players and lets them
//! poll concurrently on their own timers while the clock runs. Each poll
//! response is printed as one JSON line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use qumud::core::clock::SystemClock;
use qumud::core::config::EngineConfig;
use qumud::core::error::Result;
use qumud::core::types::AccountId;
use qumud::engine::{Engine, PollRequest};
use qumud::store::Store;
use qumud::world::SeededContentGenerator;

#[derive(Parser, Debug)]
#[command(name = "qumud")]
#[command(about = "Run simulated players against a shared-world combat engine")]
struct Args {
    /// Engine configuration (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of simulated players
    #[arg(long, default_value_t = 4)]
    players: usize,

    /// Polls each player makes before logging off
    #[arg(long, default_value_t = 10)]
    polls: usize,

    /// World to create or join
    #[arg(long, default_value = "Avalon")]
    world: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("qumud=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: EngineConfig) -> Result<()> {
    let generator = Arc::new(SeededContentGenerator::new(config.dungeons_per_region));
    let engine = Engine::new(
        Arc::new(Store::new()),
        Arc::new(SystemClock),
        config,
        generator,
        args.seed,
    )?;

    let genesis = engine.get_or_create_world(&args.world)?;
    tracing::info!(world = %args.world, created = genesis.created, "qumud starting");

    let mut accounts: Vec<AccountId> = Vec::with_capacity(args.players);
    for i in 0..args.players {
        let account = engine.create_account(&format!("player{i}"))?;
        let character = engine.create_character(account, &format!("Hero{i}"))?;
        engine.select_character(account, character)?;
        engine.enter_world(account, genesis.world).await?;
        accounts.push(account);
    }

    let mut tasks = Vec::with_capacity(accounts.len());
    for (i, account) in accounts.into_iter().enumerate() {
        let engine = engine.clone();
        let polls = args.polls;
        let seed = args.seed.wrapping_add(i as u64);
        tasks.push(tokio::spawn(async move { play(engine, account, polls, seed).await }));
    }

    for task in tasks {
        match task.await {
            Ok(result) => result?,
            Err(err) => tracing::error!(error = %err, "player task failed"),
        }
    }

    tracing::info!("qumud finished");
    Ok(())
}

/// One simulated player: poll, sometimes travel or chat, sleep, repeat
async fn play(engine: Engine, account: AccountId, polls: usize, seed: u64) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut request = PollRequest::full();

    for _ in 0..polls {
        let response = match engine.poll(account, request).await {
            Ok(response) => response,
            Err(err) => {
                // A stale travel pick after a revive; poll in place next time
                tracing::warn!(%account, error = %err, "poll rejected");
                request = PollRequest::update();
                continue;
            }
        };
        println!("{}", serde_json::to_string(&response)?);

        request = PollRequest::update();
        if response.waiting || rng.gen_bool(0.2) {
            let options = engine.travel_options(account)?;
            if !options.is_empty() {
                let pick = &options[rng.gen_range(0..options.len())];
                request = PollRequest::travel(pick.id);
            }
        }
        if rng.gen_bool(0.1) {
            engine.post_chat(account, "Anyone up for the dungeon?")?;
        }

        let pause = rng.gen_range(500..1500);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
    Ok(())
}
