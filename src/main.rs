use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use mahjong_game_engine::engine::models::{Player, RoundResult, SessionResult};
use mahjong_game_engine::engine::rules::{load_default_rules, load_rules};
use mahjong_game_engine::games::VariantRegistry;
use mahjong_game_engine::table::{
    CollectingTransport, SessionObserver, Table, TableConfig, TableContext, TableRegistry,
};

#[derive(Parser)]
#[command(name = "mahjong-game-engine", about = "Mahjong table host running bot sessions")]
struct Cli {
    /// Variant id
    #[arg(long, default_value = "classic")]
    variant: String,

    /// Rule profile name from the rules file (default: the variant's own rules)
    #[arg(long)]
    profile: Option<String>,

    /// Path to rules.toml (default: auto-discover)
    #[arg(long, env = "MAHJONG_RULES")]
    rules: Option<PathBuf>,

    /// Comma-separated bot strategies, one per seat
    #[arg(long, default_value = "greedy,greedy,random,random")]
    bots: String,

    /// Rounds per session
    #[arg(long, default_value = "4")]
    rounds: u32,

    /// Tick period in milliseconds
    #[arg(long, default_value = "100", env = "MAHJONG_TICK_MS")]
    tick_ms: u64,

    /// Table seed
    #[arg(long)]
    seed: Option<u64>,
}

/// Logs round results and hands the session result back to `main`.
struct ReportingObserver {
    tx: mpsc::Sender<SessionResult>,
}

impl SessionObserver for ReportingObserver {
    fn on_round_over(&self, table_id: &str, result: &RoundResult) {
        tracing::info!(
            table_id,
            round = result.round,
            reason = ?result.reason,
            deltas = ?result.deltas,
            "round over"
        );
    }

    fn on_session_over(&self, _table_id: &str, result: &SessionResult) {
        if let Err(e) = self.tx.try_send(result.clone()) {
            tracing::warn!(error = %e, "session result dropped");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let variants = VariantRegistry::with_builtin();
    tracing::info!(variants = ?variants.list_game_ids(), "registered mahjong variants");
    let variant = variants
        .get(&cli.variant)
        .ok_or_else(|| format!("unknown variant '{}'", cli.variant))?;

    let catalog = match cli.rules {
        Some(ref path) => load_rules(path).map_err(|e| format!("Failed to load rules: {}", e))?,
        None => load_default_rules(),
    };
    let conf = match cli.profile {
        Some(ref name) => catalog
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown rule profile '{}'", name))?,
        None => variant.default_rules(),
    };

    let players: Vec<Player> = cli
        .bots
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, bot_id)| Player::bot(&format!("bot-{}", i), bot_id, 0))
        .collect();

    let (tx, mut rx) = mpsc::channel(4);
    let ctx = TableContext {
        variant,
        conf,
        config: TableConfig {
            round_count: cli.rounds,
            next_round_delay_secs: 1,
            seed: cli.seed,
            ..TableConfig::default()
        },
        transport: Arc::new(CollectingTransport::new()),
        observer: Arc::new(ReportingObserver { tx }),
    };

    let registry = Arc::new(TableRegistry::new());
    let table = Arc::new(Table::new("demo", ctx, players)?);
    registry.insert(Arc::clone(&table));
    table.attach_bots(Instant::now());
    let ticker = Arc::clone(&registry).spawn_ticker(Duration::from_millis(cli.tick_ms));

    if let Some(result) = rx.recv().await {
        println!("Session over after {} rounds ({})", result.rounds_played, result.reason);
        let mut scores: Vec<_> = result.final_scores.iter().collect();
        scores.sort();
        for (player, score) in scores {
            println!("  {:>8}: {:+}", player, score);
        }
    }
    ticker.abort();
    Ok(())
}
