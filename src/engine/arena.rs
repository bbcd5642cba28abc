//! Bot-vs-bot session runner.
//!
//! Drives rounds synchronously with a simulated clock: every prompt is
//! answered by the seat's strategy, and when nothing is pending the clock
//! jumps far enough for the round timer to fire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::bot_strategy::{strategy_by_name, BotStrategy};
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::models::{RoundEndReason, RoundResult};
use crate::engine::plugin::MahjongVariant;
use crate::engine::rules::PlayConf;
use crate::games::mahjong::play::LastGameData;
use crate::games::mahjong::state::{Round, RoundSettings};

/// Aggregated results from an arena run.
pub struct ArenaResult {
    pub num_sessions: usize,
    pub rounds_played: usize,
    /// Rounds won, keyed by strategy name.
    pub wins: HashMap<String, usize>,
    pub draws: usize,
    /// Final balance of every session, keyed by strategy name.
    pub total_scores: HashMap<String, Vec<f64>>,
    pub session_durations_ms: Vec<f64>,
}

impl ArenaResult {
    fn empty(names: &[String]) -> Self {
        Self {
            num_sessions: 0,
            rounds_played: 0,
            wins: names.iter().map(|n| (n.clone(), 0)).collect(),
            draws: 0,
            total_scores: names.iter().map(|n| (n.clone(), Vec::new())).collect(),
            session_durations_ms: Vec::new(),
        }
    }

    fn merge(mut self, other: ArenaResult) -> Self {
        self.num_sessions += other.num_sessions;
        self.rounds_played += other.rounds_played;
        self.draws += other.draws;
        for (name, wins) in other.wins {
            *self.wins.entry(name).or_insert(0) += wins;
        }
        for (name, scores) in other.total_scores {
            self.total_scores.entry(name).or_default().extend(scores);
        }
        self.session_durations_ms.extend(other.session_durations_ms);
        self
    }

    /// Share of rounds won.
    pub fn win_rate(&self, name: &str) -> f64 {
        *self.wins.get(name).unwrap_or(&0) as f64 / self.rounds_played.max(1) as f64
    }

    pub fn avg_score(&self, name: &str) -> f64 {
        match self.total_scores.get(name) {
            Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
            _ => 0.0,
        }
    }

    pub fn score_stddev(&self, name: &str) -> f64 {
        let scores = match self.total_scores.get(name) {
            Some(s) if s.len() >= 2 => s,
            _ => return 0.0,
        };
        let avg = self.avg_score(name);
        let variance = scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / (scores.len() - 1) as f64;
        variance.sqrt()
    }

    /// Wilson interval of the round win rate.
    pub fn confidence_interval_95(&self, name: &str) -> (f64, f64) {
        let n = self.rounds_played;
        if n == 0 {
            return (0.0, 0.0);
        }
        let p = self.win_rate(name);
        let z = 1.96_f64;
        let denom = 1.0 + z * z / n as f64;
        let center = (p + z * z / (2.0 * n as f64)) / denom;
        let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n as f64)) / n as f64).sqrt() / denom;
        ((center - margin).max(0.0), (center + margin).min(1.0))
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Arena Results ({} sessions, {} rounds)",
            self.num_sessions, self.rounds_played
        )];
        lines.push("=".repeat(60));
        let mut names: Vec<&String> = self.wins.keys().collect();
        names.sort();
        for name in names {
            let wr = self.win_rate(name);
            let (ci_lo, ci_hi) = self.confidence_interval_95(name);
            lines.push(format!(
                "  {:>12}: {:4} wins ({:5.1}%)  [95% CI: {:.1}%-{:.1}%]  avg={:7.1} +/- {:6.1}",
                name,
                self.wins[name],
                wr * 100.0,
                ci_lo * 100.0,
                ci_hi * 100.0,
                self.avg_score(name),
                self.score_stddev(name),
            ));
        }
        lines.push(format!("  {:>12}: {}", "Draws", self.draws));
        if !self.session_durations_ms.is_empty() {
            let total_ms = self.session_durations_ms.iter().sum::<f64>();
            lines.push(format!(
                "  Avg session: {:.0}ms  |  Total: {:.1}s",
                total_ms / self.session_durations_ms.len() as f64,
                total_ms / 1000.0
            ));
        }
        lines.join("\n")
    }
}

/// One finished session: every round result in order.
#[derive(Debug, Clone)]
pub struct SessionRun {
    pub rounds: Vec<RoundResult>,
    pub balances: Vec<i64>,
}

/// Play `rounds` rounds at one table, each seat answered by its strategy.
pub fn run_session(
    variant: Arc<dyn MahjongVariant>,
    conf: &PlayConf,
    strategies: &[&dyn BotStrategy],
    rounds: u32,
    seed: u64,
) -> EngineResult<SessionRun> {
    let seats = strategies.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut last = LastGameData::default();
    let mut balances = vec![0i64; seats];
    let mut results = Vec::new();

    for round_no in 1..=rounds {
        let banker = last.take_banker(seats, &mut rng);
        let settings = RoundSettings {
            round: round_no,
            banker,
            seed: rng.gen(),
            balances: balances.clone(),
            eliminated: vec![false; seats],
            preset: None,
        };
        let mut round = Round::new(conf.clone(), variant.clone(), settings)?;
        let result = play_round(&mut round, strategies)?;
        balances = result.balances.clone();
        last.banker = result.next_banker;
        last.bump("rounds", 1);
        if result.is_draw() {
            last.bump("draws", 1);
        }
        results.push(result);
    }

    Ok(SessionRun {
        rounds: results,
        balances,
    })
}

fn play_round(round: &mut Round, strategies: &[&dyn BotStrategy]) -> EngineResult<RoundResult> {
    let mut now = Instant::now();
    round.start(now);

    let max_iterations = 2000;
    let max_auto = 50;
    let mut auto_steps = 0;
    for _ in 0..max_iterations {
        round.drain_events();
        if round.is_over() {
            break;
        }
        // Answer one prompt at a time; an answer may close the others.
        let Some(prompt) = round.pending_prompts().into_iter().next() else {
            auto_steps += 1;
            if auto_steps > max_auto {
                break;
            }
            now += Duration::from_secs(60);
            round.on_tick(now);
            continue;
        };
        let Some(strategy) = strategies.get(prompt.seat) else {
            return Err(EngineError::InvalidSeat(prompt.seat));
        };
        let request = strategy.choose_action(&prompt);
        if let Err(e) = round.on_player_msg(prompt.seat, request, now) {
            tracing::warn!(seat = prompt.seat, strategy = strategy.name(), error = %e, "bot answer rejected");
            now += Duration::from_secs(60);
            round.on_tick(now);
        }
    }

    round.result().cloned().ok_or_else(|| EngineError::IllegalAction {
        seat: 0,
        message: "round did not finish".into(),
    })
}

/// Run `num_sessions` sessions in parallel, rotating strategies through the
/// seats, and aggregate per-strategy statistics.
pub fn run_arena(
    variant: Arc<dyn MahjongVariant>,
    conf: &PlayConf,
    strategy_names: &[String],
    num_sessions: usize,
    rounds_per_session: u32,
    base_seed: u64,
    alternate_seats: bool,
) -> EngineResult<ArenaResult> {
    for name in strategy_names {
        if strategy_by_name(name).is_none() {
            return Err(EngineError::Config(format!("unknown strategy '{}'", name)));
        }
    }
    let seats = strategy_names.len();

    let sessions: Vec<EngineResult<ArenaResult>> = (0..num_sessions)
        .into_par_iter()
        .map(|idx| {
            let seat_names: Vec<String> = (0..seats)
                .map(|i| {
                    let shift = if alternate_seats { idx } else { 0 };
                    strategy_names[(i + shift) % seats].clone()
                })
                .collect();
            let owned: Vec<Box<dyn BotStrategy>> = seat_names
                .iter()
                .filter_map(|n| strategy_by_name(n))
                .collect();
            let strategies: Vec<&dyn BotStrategy> = owned.iter().map(|s| s.as_ref()).collect();

            let t0 = Instant::now();
            let run = run_session(
                variant.clone(),
                conf,
                &strategies,
                rounds_per_session,
                base_seed + idx as u64,
            )?;
            let mut result = ArenaResult::empty(strategy_names);
            result.num_sessions = 1;
            result.session_durations_ms.push(t0.elapsed().as_secs_f64() * 1000.0);
            for round in &run.rounds {
                result.rounds_played += 1;
                match round.reason {
                    RoundEndReason::Win => {
                        for winner in &round.winners {
                            *result.wins.entry(seat_names[winner.seat].clone()).or_insert(0) += 1;
                        }
                    }
                    _ => result.draws += 1,
                }
            }
            for (seat, balance) in run.balances.iter().enumerate() {
                result
                    .total_scores
                    .entry(seat_names[seat].clone())
                    .or_default()
                    .push(*balance as f64);
            }
            Ok(result)
        })
        .collect();

    let mut total = ArenaResult::empty(strategy_names);
    for session in sessions {
        total = total.merge(session?);
    }
    tracing::info!(
        sessions = total.num_sessions,
        rounds = total.rounds_played,
        draws = total.draws,
        "arena finished"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bot_strategy::GreedyStrategy;
    use crate::games::classic::ClassicVariant;
    use crate::games::red_dragon::RedDragonVariant;

    #[test]
    fn test_session_is_zero_sum() {
        let variant: Arc<dyn MahjongVariant> = Arc::new(ClassicVariant);
        let conf = variant.default_rules();
        let greedy = GreedyStrategy;
        let strategies: Vec<&dyn BotStrategy> = vec![&greedy as &dyn BotStrategy; 4];
        let run = run_session(variant, &conf, &strategies, 3, 99).unwrap();
        assert_eq!(run.rounds.len(), 3);
        assert_eq!(run.balances.iter().sum::<i64>(), 0);
        for (i, round) in run.rounds.iter().enumerate() {
            assert_eq!(round.round, i as u32 + 1);
            assert_eq!(round.deltas.iter().sum::<i64>(), 0);
        }
    }

    #[test]
    fn test_arena_aggregates_sessions() {
        let variant: Arc<dyn MahjongVariant> = Arc::new(RedDragonVariant);
        let conf = variant.default_rules();
        let names: Vec<String> = ["greedy", "random", "greedy", "random"].iter().map(|s| s.to_string()).collect();
        let result = run_arena(variant, &conf, &names, 3, 2, 7, true).unwrap();
        assert_eq!(result.num_sessions, 3);
        assert_eq!(result.rounds_played, 6);
        let wins: usize = result.wins.values().sum();
        assert!(wins + result.draws >= result.rounds_played);
        assert!(result.summary().contains("Arena Results"));
        assert!(run_arena(
            Arc::new(ClassicVariant),
            &PlayConf::default(),
            &["mcts".to_string()],
            1,
            1,
            0,
            false
        )
        .is_err());
    }
}
