//! Step table for standard hands (four melds plus a pair).
//!
//! A suit segment is a run of distinct tiles whose neighbours are at most two
//! points apart. Each segment is encoded as its per-tile counts plus a gap
//! marker between neighbours (set when one point is skipped), and the table maps
//! that code to the cheapest `{pairs, singles}` decomposition of the segment.
//! Honors never join a segment.
//!
//! The tables are enumerated exhaustively on first use: every count sequence
//! (1..=4 per tile, at most nine tiles, total bounded by the hand size) crossed
//! with every gap sequence of matching length.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use rayon::prelude::*;

use super::tiles::Tile;

/// Cost record for a segment: two-tile partial groups and loose singles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepRecord {
    pub pairs: i8,
    pub singles: i8,
}

impl StepRecord {
    fn sum(self) -> i32 {
        self.pairs as i32 + self.singles as i32
    }

    fn add(&mut self, other: StepRecord) {
        self.pairs += other.pairs;
        self.singles += other.singles;
    }
}

pub static STEP_TABLE_14: Lazy<StepTable> = Lazy::new(|| StepTable::build(14));
pub static STEP_TABLE_17: Lazy<StepTable> = Lazy::new(|| StepTable::build(17));

/// Table for a hand of `total` tiles (concealed tiles plus wildcards).
pub fn table_for(total: usize) -> &'static StepTable {
    if total > 14 {
        &STEP_TABLE_17
    } else {
        &STEP_TABLE_14
    }
}

pub struct StepTable {
    max_tiles: usize,
    codes: HashMap<u32, StepRecord>,
}

impl StepTable {
    pub fn build(max_tiles: usize) -> Self {
        let started = std::time::Instant::now();
        let mut gaps_by_len: HashMap<usize, Vec<Vec<bool>>> = HashMap::new();
        for gaps in gap_sequences() {
            gaps_by_len.entry(gaps.len()).or_default().push(gaps);
        }

        let codes: HashMap<u32, StepRecord> = count_sequences(max_tiles)
            .into_par_iter()
            .filter(|counts| !counts.is_empty())
            .flat_map_iter(|counts| {
                let gap_list = gaps_by_len.get(&(counts.len() - 1)).cloned().unwrap_or_default();
                gap_list.into_iter().map(move |gaps| {
                    let code = encode(&counts, &gaps);
                    (code, best_combination(&expand(&counts, &gaps)))
                })
            })
            .collect();

        tracing::info!(
            max_tiles,
            entries = codes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built step table"
        );
        Self { max_tiles, codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    fn lookup(&self, counts: &[u8], gaps: &[bool]) -> StepRecord {
        let encodable = counts.len() <= 9 && counts.iter().all(|&c| (1..=4).contains(&c));
        if encodable {
            if let Some(record) = self.codes.get(&encode(counts, gaps)) {
                return *record;
            }
        }
        tracing::warn!(?counts, ?gaps, "segment missing from step table, solving directly");
        best_combination(&expand(counts, gaps))
    }

    /// Sum of segment costs over a tile count map.
    fn segment_cost(&self, counts: &BTreeMap<Tile, u8>) -> StepRecord {
        let mut total = StepRecord::default();
        let mut seg_counts: Vec<u8> = Vec::new();
        let mut seg_gaps: Vec<bool> = Vec::new();
        let mut prev: Option<Tile> = None;

        for (&tile, &count) in counts {
            if count == 0 {
                continue;
            }
            if let Some(p) = prev {
                let step = if tile.is_suit() {
                    (tile.code() - p.code()) / 0x10
                } else {
                    3
                };
                if step > 2 {
                    total.add(self.lookup(&seg_counts, &seg_gaps));
                    seg_counts.clear();
                    seg_gaps.clear();
                } else {
                    seg_gaps.push(step == 2);
                }
            }
            seg_counts.push(count);
            prev = Some(tile);
        }
        if !seg_counts.is_empty() {
            total.add(self.lookup(&seg_counts, &seg_gaps));
        }
        total
    }

    fn check_steps(&self, counts: &BTreeMap<Tile, u8>, has_pair: bool, wildcards: usize, other: usize) -> i32 {
        let mut record = self.segment_cost(counts);
        record.singles += other as i8;
        calc_step(record, has_pair, wildcards as i32)
    }

    /// Steps to a standard winning hand: the cheaper of leaving the pair open
    /// and fixing each candidate pair in turn.
    pub fn standard_steps(&self, counts: &mut BTreeMap<Tile, u8>, wildcards: usize, other: usize) -> i32 {
        let mut best = self.check_steps(counts, false, wildcards, other);
        let pair_candidates: Vec<Tile> = counts.iter().filter(|(_, &c)| c >= 2).map(|(&t, _)| t).collect();
        for tile in pair_candidates {
            if let Some(c) = counts.get_mut(&tile) {
                *c -= 2;
            }
            best = best.min(self.check_steps(counts, true, wildcards, other));
            if let Some(c) = counts.get_mut(&tile) {
                *c += 2;
            }
        }
        best
    }
}

/// Wildcards first close partial groups (one each), then singles (two each).
fn combine_wildcards(record: &mut StepRecord, wildcards: &mut i32) {
    let pairs = record.pairs as i32;
    if *wildcards < pairs {
        record.pairs -= *wildcards as i8;
        *wildcards = 0;
        return;
    }
    *wildcards -= pairs;
    record.pairs = 0;
    let need = record.singles as i32 * 2;
    if *wildcards >= need {
        *wildcards -= need;
        record.singles = 0;
    } else {
        record.singles -= (*wildcards / 2) as i8;
        *wildcards %= 2;
    }
}

fn calc_step(mut record: StepRecord, has_pair: bool, mut wildcards: i32) -> i32 {
    combine_wildcards(&mut record, &mut wildcards);
    let pairs = record.pairs as i32;
    let singles = record.singles as i32;
    let mut step = 0;
    if pairs <= singles {
        step += pairs;
        let mut rest = singles - pairs;
        if has_pair {
            step += ((rest + 2) / 3) * 2;
        } else if rest > 2 {
            rest -= 2;
            step += 1;
            step += ((rest + 2) / 3) * 2;
        } else if rest > 0 {
            step += 1;
        } else {
            step += 2;
        }
    } else {
        let rest = pairs - singles;
        step += singles;
        step += (rest / 3) * 2;
        step += if has_pair { rest % 3 } else { [2, 1, 2][(rest % 3) as usize] };
    }
    (step - wildcards).max(0)
}

fn count_sequences(max_tiles: usize) -> Vec<Vec<u8>> {
    fn run(temp: &mut Vec<u8>, rest: usize, out: &mut Vec<Vec<u8>>) {
        out.push(temp.clone());
        if rest == 0 || temp.len() >= 9 {
            return;
        }
        for i in 1..=rest.min(4) {
            temp.push(i as u8);
            run(temp, rest - i, out);
            temp.pop();
        }
    }
    let mut out = Vec::new();
    run(&mut Vec::new(), max_tiles, &mut out);
    out
}

fn gap_sequences() -> Vec<Vec<bool>> {
    fn run(temp: &mut Vec<bool>, span: usize, out: &mut Vec<Vec<bool>>) {
        out.push(temp.clone());
        if temp.len() > 13 {
            return;
        }
        for gap in [false, true] {
            let width = 1 + gap as usize;
            if span + width > 8 {
                break;
            }
            temp.push(gap);
            run(temp, span + width, out);
            temp.pop();
        }
    }
    let mut out = Vec::new();
    run(&mut Vec::new(), 0, &mut out);
    out
}

fn encode(counts: &[u8], gaps: &[bool]) -> u32 {
    let mut code: u32 = (1 << 2) | (counts[0] as u32 - 1);
    for (i, &gap) in gaps.iter().enumerate() {
        code <<= 1;
        if gap {
            code |= 1;
        }
        code <<= 2;
        code |= counts[i + 1] as u32 - 1;
    }
    code
}

fn expand(counts: &[u8], gaps: &[bool]) -> Vec<u8> {
    let mut out = Vec::with_capacity(counts.len() * 2);
    out.push(counts[0]);
    for (i, &gap) in gaps.iter().enumerate() {
        if gap {
            out.push(0);
        }
        out.push(counts[i + 1]);
    }
    out
}

/// Exhaustive peel of triplets, runs, pairs and two-tile partials, keeping the
/// record with the fewest leftover units.
pub fn best_combination(counts: &[u8]) -> StepRecord {
    let mut search = CombineSearch {
        best: StepRecord {
            pairs: 0,
            singles: (counts.len() * 4) as i8,
        },
    };
    search.pick(counts.to_vec(), StepRecord::default(), 0);
    search.best
}

struct CombineSearch {
    best: StepRecord,
}

impl CombineSearch {
    fn pick(&mut self, counts: Vec<u8>, record: StepRecord, index: usize) {
        let triplet = self.pick_triplet(&counts, record, index);
        let run = self.pick_run(&counts, record, index);
        let pair = self.pick_pair(&counts, record, index);
        let partial = self.pick_partial(&counts, record, index);
        if !(triplet || run || pair || partial) {
            self.finish(&counts, record);
        }
    }

    fn pick_triplet(&mut self, counts: &[u8], record: StepRecord, index: usize) -> bool {
        for i in index..counts.len() {
            if counts[i] >= 3 {
                let mut next = counts.to_vec();
                next[i] -= 3;
                self.pick(next, record, i);
                return true;
            }
        }
        false
    }

    fn pick_run(&mut self, counts: &[u8], record: StepRecord, index: usize) -> bool {
        if counts.len() < 3 {
            return false;
        }
        for i in index..counts.len() - 2 {
            if counts[i] > 0 && counts[i + 1] > 0 && counts[i + 2] > 0 {
                let mut next = counts.to_vec();
                next[i] -= 1;
                next[i + 1] -= 1;
                next[i + 2] -= 1;
                self.pick(next, record, i);
                return true;
            }
        }
        false
    }

    fn pick_pair(&mut self, counts: &[u8], record: StepRecord, index: usize) -> bool {
        for i in index..counts.len() {
            if counts[i] >= 2 {
                let mut next = counts.to_vec();
                next[i] -= 2;
                let mut r = record;
                r.pairs += 1;
                self.pick(next, r, i);
                return true;
            }
        }
        false
    }

    fn pick_partial(&mut self, counts: &[u8], record: StepRecord, index: usize) -> bool {
        if counts.len() < 2 {
            return false;
        }
        for i in index..counts.len() - 1 {
            let n0 = counts[i];
            for offset in 1..=2 {
                if n0 == 0 || i + offset >= counts.len() {
                    break;
                }
                let n = n0.min(counts[i + offset]);
                if n > 0 {
                    let mut next = counts.to_vec();
                    next[i] -= n;
                    next[i + offset] -= n;
                    let mut r = record;
                    r.pairs += n as i8;
                    self.pick(next, r, i);
                    return true;
                }
            }
        }
        false
    }

    fn finish(&mut self, counts: &[u8], mut record: StepRecord) {
        record.singles += counts.iter().map(|&c| c as i8).sum::<i8>();
        if record.sum() < self.best.sum() {
            self.best = record;
        }
    }
}
