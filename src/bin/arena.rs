//! Arena CLI: run bot-vs-bot mahjong sessions from the command line.
//!
//! Usage:
//!   cargo run --release --bin arena -- --sessions 200 --strategies greedy,random,greedy,random
//!   cargo run --release --bin arena -- --variant red_dragon --rounds 8 --seed 7

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mahjong_game_engine::engine::arena::run_arena;
use mahjong_game_engine::engine::rules::{load_default_rules, load_rules};
use mahjong_game_engine::games::VariantRegistry;

#[derive(Parser)]
#[command(name = "arena", about = "Run bot-vs-bot arena experiments for mahjong variants")]
struct Cli {
    /// Variant id
    #[arg(long, default_value = "classic")]
    variant: String,

    /// Rule profile name (from rules.toml)
    #[arg(long)]
    profile: Option<String>,

    /// Path to rules.toml
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Number of sessions to play
    #[arg(long, default_value = "100")]
    sessions: usize,

    /// Rounds per session
    #[arg(long, default_value = "8")]
    rounds: u32,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Comma-separated strategies, one per seat
    #[arg(long, default_value = "greedy,random,greedy,random")]
    strategies: String,

    /// Rotate strategies through the seats between sessions
    #[arg(long, default_value = "true")]
    alternate_seats: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();

    let variants = VariantRegistry::with_builtin();
    let variant = variants
        .get(&cli.variant)
        .ok_or_else(|| format!("unknown variant '{}', expected one of {:?}", cli.variant, variants.list_game_ids()))?;

    let conf = match cli.profile {
        Some(ref name) => {
            let catalog = match cli.rules {
                Some(ref path) => load_rules(path).map_err(|e| format!("Failed to load rules: {}", e))?,
                None => load_default_rules(),
            };
            catalog
                .get(name)
                .cloned()
                .ok_or_else(|| format!("unknown rule profile '{}'", name))?
        }
        None => variant.default_rules(),
    };

    let names: Vec<String> = cli
        .strategies
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if names.len() < 2 {
        return Err("need at least two strategies".into());
    }

    println!(
        "Running {} sessions x {} rounds of {} ({})",
        cli.sessions,
        cli.rounds,
        variant.game_id(),
        names.join(" vs ")
    );
    let start = Instant::now();
    let result = run_arena(
        variant,
        &conf,
        &names,
        cli.sessions,
        cli.rounds,
        cli.seed,
        cli.alternate_seats,
    )?;
    println!("{}", result.summary());
    println!("Wall time: {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
