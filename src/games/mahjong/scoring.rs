//! Settlement: multipliers to currency under a selectable policy.
//!
//! `ScoreType` decides how raw deltas are clipped against the balances seats
//! brought to the table; `SettleMode` decides whether every scoring event is
//! paid immediately or accumulated and paid once when the round ends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    /// Raw deltas; balances may go negative.
    Natural,
    /// Losses capped by balance, winners scaled down to what losers can cover.
    MinScore,
    /// Losses beyond a seat's balance are covered by the house.
    Positive,
    /// Only winners move; losers pay nothing.
    JustWin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleMode {
    Immediate,
    RoundEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    Hu,
    AnKon,
    BuKon,
    ZhiKon,
    /// A kong payment taken back after the kong was robbed.
    TuiKon,
    ChaJiao,
    /// Accumulated multipliers settled at round end.
    Total,
}

impl ScoreReason {
    pub fn is_kon(self) -> bool {
        matches!(self, ScoreReason::AnKon | ScoreReason::BuKon | ScoreReason::ZhiKon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreNode {
    pub reason: ScoreReason,
    pub scores: Vec<i64>,
}

/// Apply a policy to raw deltas given each seat's available balance.
pub fn settle(score_type: ScoreType, take: &[i64], win: &[i64]) -> Vec<i64> {
    match score_type {
        ScoreType::Natural => win.to_vec(),
        ScoreType::MinScore => min_score(take, win).unwrap_or_else(|e| {
            tracing::warn!(error = %e, ?take, ?win, "min score settlement fell back to raw deltas");
            win.to_vec()
        }),
        ScoreType::Positive => win
            .iter()
            .zip(take)
            .map(|(&w, &t)| {
                if t < 0 {
                    0
                } else if w + t < 0 {
                    -t
                } else {
                    w
                }
            })
            .collect(),
        ScoreType::JustWin => win.iter().map(|&w| w.max(0)).collect(),
    }
}

fn check_args(take: &[i64], win: &[i64]) -> Result<(), String> {
    if take.len() != win.len() {
        return Err(format!("seat count mismatch: {} balances, {} deltas", take.len(), win.len()));
    }
    if take.iter().any(|&t| t < 0) {
        return Err("balances must be non-negative".into());
    }
    if win.iter().sum::<i64>() != 0 {
        return Err("deltas must sum to zero".into());
    }
    Ok(())
}

/// Cap each loser at its balance and each winner at what it could collect,
/// then scale the larger side down so the result stays zero-sum.
pub fn min_score(take: &[i64], win: &[i64]) -> Result<Vec<i64>, String> {
    check_args(take, win)?;
    let count = take.len();
    let mut res = vec![0i64; count];
    let (mut winners, mut losers) = (Vec::new(), Vec::new());
    for i in 0..count {
        if win[i] == 0 || take[i] == 0 {
            continue;
        }
        if win[i] > 0 {
            winners.push(i);
        } else {
            losers.push(i);
        }
    }
    if winners.is_empty() || losers.is_empty() {
        return Ok(res);
    }

    let mut win_all = 0;
    for &i in &winners {
        for &k in &losers {
            let amount = take[i].min(win[i]).min(take[k]).min(-win[k]);
            res[i] += amount;
            res[k] += amount;
        }
        res[i] = res[i].min(win[i]);
        win_all += res[i];
    }
    let mut lose_all = 0;
    for &k in &losers {
        res[k] = res[k].min(take[k]).min(-win[k]);
        lose_all += res[k];
    }
    if win_all == 0 || lose_all == 0 {
        return Ok(vec![0; count]);
    }

    let min_all = win_all.min(lose_all);
    for (i, share) in allocate(&res, &winners, min_all) {
        res[i] = share;
    }
    for (k, share) in allocate(&res, &losers, min_all) {
        res[k] = -share;
    }
    Ok(res)
}

/// Split `target` across `seats` in proportion to their amounts in `res`.
/// Leftover units go to the largest remainders, earlier seats first on ties,
/// so the shares always add up to `target`.
fn allocate(res: &[i64], seats: &[usize], target: i64) -> Vec<(usize, i64)> {
    let total: i64 = seats.iter().map(|&i| res[i]).sum();
    if total == 0 {
        return seats.iter().map(|&i| (i, 0)).collect();
    }
    let mut shares: Vec<(usize, i64, i64)> = seats
        .iter()
        .map(|&i| {
            let scaled = res[i] * target;
            (i, scaled / total, scaled % total)
        })
        .collect();
    let mut left = target - shares.iter().map(|s| s.1).sum::<i64>();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].2.cmp(&shares[a].2).then(a.cmp(&b)));
    for idx in order {
        if left == 0 {
            break;
        }
        shares[idx].1 += 1;
        left -= 1;
    }
    shares.into_iter().map(|(i, share, _)| (i, share)).collect()
}

/// Turns per-event multipliers into applied score deltas for one round.
#[derive(Debug, Clone)]
pub struct Scorelator {
    score_type: ScoreType,
    mode: SettleMode,
    base: i64,
    nodes: Vec<ScoreNode>,
    /// Multipliers waiting for round-end settlement.
    pending: Vec<ScoreNode>,
}

impl Scorelator {
    pub fn new(score_type: ScoreType, mode: SettleMode, base: i64) -> Self {
        Self {
            score_type,
            mode,
            base,
            nodes: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn mode(&self) -> SettleMode {
        self.mode
    }

    /// Applied settlement entries, in order.
    pub fn nodes(&self) -> &[ScoreNode] {
        &self.nodes
    }

    /// Score multipliers for one event. Returns the deltas to apply now
    /// (all zero when settlement is deferred).
    pub fn calc_multi(&mut self, reason: ScoreReason, multiples: &[i64], balances: &[i64]) -> Vec<i64> {
        match self.mode {
            SettleMode::Immediate => {
                let win: Vec<i64> = multiples.iter().map(|m| m * self.base).collect();
                let scores = settle(self.score_type, balances, &win);
                self.nodes.push(ScoreNode {
                    reason,
                    scores: scores.clone(),
                });
                scores
            }
            SettleMode::RoundEnd => {
                self.pending.push(ScoreNode {
                    reason,
                    scores: multiples.to_vec(),
                });
                vec![0; multiples.len()]
            }
        }
    }

    /// Kong payment: every listed payer pays its multiplier to `winner`.
    pub fn calc_kon(
        &mut self,
        reason: ScoreReason,
        winner: usize,
        payers: &[(usize, i64)],
        balances: &[i64],
    ) -> Vec<i64> {
        let mut multiples = vec![0; balances.len()];
        for &(seat, multi) in payers {
            if seat == winner || seat >= multiples.len() {
                continue;
            }
            multiples[seat] -= multi;
            multiples[winner] += multi;
        }
        self.calc_multi(reason, &multiples, balances)
    }

    /// Undo the most recent kong payment. Returns the deltas to apply now.
    pub fn revert_last_kon(&mut self) -> Option<Vec<i64>> {
        match self.mode {
            SettleMode::Immediate => {
                let last = self.nodes.last().filter(|n| n.reason.is_kon())?;
                let undo: Vec<i64> = last.scores.iter().map(|s| -s).collect();
                self.nodes.push(ScoreNode {
                    reason: ScoreReason::TuiKon,
                    scores: undo.clone(),
                });
                Some(undo)
            }
            SettleMode::RoundEnd => {
                if !self.pending.last().is_some_and(|n| n.reason.is_kon()) {
                    return None;
                }
                let node = self.pending.pop()?;
                Some(vec![0; node.scores.len()])
            }
        }
    }

    /// Settle anything deferred. Returns the deltas to apply now.
    pub fn finish(&mut self, balances: &[i64]) -> Vec<i64> {
        if self.pending.is_empty() {
            return vec![0; balances.len()];
        }
        let mut total = vec![0i64; balances.len()];
        for node in self.pending.drain(..) {
            for (t, m) in total.iter_mut().zip(&node.scores) {
                *t += m;
            }
        }
        let win: Vec<i64> = total.iter().map(|m| m * self.base).collect();
        let scores = settle(self.score_type, balances, &win);
        self.nodes.push(ScoreNode {
            reason: ScoreReason::Total,
            scores: scores.clone(),
        });
        scores
    }

    /// Sum of applied deltas per seat.
    pub fn round_total(&self, seats: usize) -> Vec<i64> {
        let mut total = vec![0; seats];
        for node in &self.nodes {
            for (t, s) in total.iter_mut().zip(&node.scores) {
                *t += s;
            }
        }
        total
    }
}
