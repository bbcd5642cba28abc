//! Round state machine.
//!
//! A round moves through the deal, a draw, the current seat's decision, the
//! claim window of the other seats and finally settlement. Steps that need no
//! input run back to back inside `run`; the machine only rests while it waits
//! on a seat. Every wait carries request ids and is guarded by the timer, so a
//! round always finishes even if nobody answers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use super::checkers::self_kon_kind;
use super::dealer::{Dealer, PresetDeal};
use super::hu::HandShape;
use super::messages::{MjEvent, MjRequest};
use super::operates::{Operate, Operates};
use super::play::Play;
use super::play_data::KonKind;
use super::scoring::{ScoreReason, Scorelator};
use super::sender::{Outbound, Outbox, RequestIds};
use super::tiles::Tile;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::models::{RoundEndReason, RoundResult};
use crate::engine::plugin::MahjongVariant;
use crate::engine::rules::{BankerPolicy, PlayConf};
use crate::engine::timer::Timer;

/// Upper bound on input-free steps between two waits.
const MAX_IMMEDIATE_STEPS: usize = 64;

/// Everything a round needs from the table besides the rules.
#[derive(Debug, Clone)]
pub struct RoundSettings {
    pub round: u32,
    pub banker: usize,
    pub seed: u64,
    /// Balance of each seat when the round starts; its length is the seat count.
    pub balances: Vec<i64>,
    pub eliminated: Vec<bool>,
    pub preset: Option<PresetDeal>,
}

impl RoundSettings {
    pub fn new(seats: usize, banker: usize, seed: u64) -> Self {
        Self {
            round: 1,
            banker,
            seed,
            balances: vec![0; seats],
            eliminated: vec![false; seats],
            preset: None,
        }
    }
}

/// An outstanding decision, as handed to bots.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub seat: usize,
    pub request_id: u32,
    pub operates: Operates,
    pub tile: Option<Tile>,
    pub self_turn: bool,
    pub hand: Vec<Tile>,
    /// Discards that leave the hand ready.
    pub ting_tiles: Vec<Tile>,
    pub wildcards: Vec<Tile>,
    pub shapes: Vec<HandShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    SelfAction,
    AwaitClaims,
    AwaitRobKong,
    Done,
}

#[derive(Debug, Clone)]
struct SelfWait {
    seat: usize,
    operates: Operates,
    /// After a pong-and-ready or chow-and-ready claim the seat may only declare.
    ting_only: bool,
}

#[derive(Debug, Clone)]
struct ClaimWait {
    from: usize,
    tile: Tile,
    offered: BTreeMap<usize, Operates>,
    pending: BTreeSet<usize>,
    passed: BTreeSet<usize>,
    answers: BTreeMap<usize, MjRequest>,
}

impl ClaimWait {
    fn new(from: usize, tile: Tile, offered: BTreeMap<usize, Operates>) -> Self {
        Self {
            from,
            tile,
            pending: offered.keys().copied().collect(),
            offered,
            passed: BTreeSet::new(),
            answers: BTreeMap::new(),
        }
    }

    /// Nobody still thinking could outrank what has been claimed so far.
    fn is_decided(&self) -> bool {
        let best = self.answers.values().map(|r| r.operate().priority()).max();
        match best {
            None => self.pending.is_empty(),
            Some(best) => self.pending.iter().all(|seat| {
                self.offered.get(seat).map(Operates::max_priority).unwrap_or(0) < best
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Win {
        winners: Vec<usize>,
        from: Option<usize>,
        multiples: Vec<i64>,
    },
    Exhausted,
}

#[derive(Debug, Clone)]
enum RoundState {
    Idle,
    Deal,
    Draw,
    SelfAction(SelfWait),
    AwaitClaims(ClaimWait),
    AwaitRobKong(ClaimWait),
    Settle(Outcome),
    Done,
}

impl RoundState {
    fn is_resting(&self) -> bool {
        matches!(
            self,
            RoundState::Idle
                | RoundState::SelfAction(_)
                | RoundState::AwaitClaims(_)
                | RoundState::AwaitRobKong(_)
                | RoundState::Done
        )
    }
}

type Transition = Result<RoundState, (RoundState, EngineError)>;

fn illegal(seat: usize, message: impl Into<String>) -> EngineError {
    EngineError::IllegalAction {
        seat,
        message: message.into(),
    }
}

pub struct Round {
    play: Play,
    scorelator: Scorelator,
    round: u32,
    state: RoundState,
    timer: Timer,
    ids: RequestIds,
    outbox: Outbox,
    balances: Vec<i64>,
    offline: Vec<bool>,
    settled: bool,
    result: Option<RoundResult>,
}

impl Round {
    pub fn new(conf: PlayConf, variant: Arc<dyn MahjongVariant>, settings: RoundSettings) -> EngineResult<Self> {
        let seats = settings.balances.len();
        let hand_count = variant.hand_count(&conf);
        let dealer = match &settings.preset {
            Some(preset) => Dealer::from_preset(&conf.tile_set, preset, seats, hand_count, settings.seed)?,
            None => Dealer::shuffled(&conf.tile_set, settings.seed),
        };
        if dealer.total() < seats * (hand_count + 1) {
            return Err(EngineError::Config(format!(
                "wall of {} tiles cannot seat {} players",
                dealer.total(),
                seats
            )));
        }
        let scorelator = Scorelator::new(conf.score_type, conf.settle_mode, conf.score_base);
        let mut play = Play::new(conf, variant, seats, settings.banker, dealer)?;
        for (seat, &out) in settings.eliminated.iter().enumerate() {
            play.set_eliminated(seat, out);
        }
        if play.is_eliminated(settings.banker) {
            return Err(EngineError::Config("banker seat is eliminated".into()));
        }
        Ok(Self {
            play,
            scorelator,
            round: settings.round,
            state: RoundState::Idle,
            timer: Timer::default(),
            ids: RequestIds::new(seats),
            outbox: Outbox::default(),
            balances: settings.balances,
            offline: vec![false; seats],
            settled: false,
            result: None,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn play(&self) -> &Play {
        &self.play
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn balances(&self) -> &[i64] {
        &self.balances
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, RoundState::Done)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            RoundState::Idle => Phase::Idle,
            RoundState::SelfAction(_) => Phase::SelfAction,
            RoundState::AwaitClaims(_) => Phase::AwaitClaims,
            RoundState::AwaitRobKong(_) => Phase::AwaitRobKong,
            RoundState::Done => Phase::Done,
            _ => Phase::Running,
        }
    }

    pub fn drain_events(&mut self) -> Vec<Outbound> {
        self.outbox.drain()
    }

    /// Decisions currently awaited, one per seat.
    pub fn pending_prompts(&self) -> Vec<Prompt> {
        match &self.state {
            RoundState::SelfAction(wait) => self.prompt_for(wait.seat, &wait.operates, true).into_iter().collect(),
            RoundState::AwaitClaims(wait) | RoundState::AwaitRobKong(wait) => wait
                .pending
                .iter()
                .filter_map(|&seat| self.prompt_for(seat, wait.offered.get(&seat)?, false))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The prompt event to resend to a reconnecting seat.
    pub fn prompt_event(&self, seat: usize) -> Option<MjEvent> {
        self.pending_prompts()
            .into_iter()
            .find(|p| p.seat == seat)
            .map(|p| MjEvent::Operates {
                seat,
                request_id: p.request_id,
                operates: p.operates,
                tile: p.tile,
            })
    }

    fn prompt_for(&self, seat: usize, operates: &Operates, self_turn: bool) -> Option<Prompt> {
        let request_id = self.ids.current(seat)?;
        let data = self.play.seat_data(seat);
        Some(Prompt {
            seat,
            request_id,
            operates: operates.clone(),
            tile: self.play.cur_tile(),
            self_turn,
            hand: data.hand.clone(),
            ting_tiles: data.call_map.keys().copied().collect(),
            wildcards: self.play.wildcards().to_vec(),
            shapes: self.play.shapes().to_vec(),
        })
    }

    fn awaited_seats(&self) -> Vec<usize> {
        (0..self.play.seat_count()).filter(|&s| self.ids.current(s).is_some()).collect()
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    pub fn start(&mut self, now: Instant) {
        if matches!(self.state, RoundState::Idle) {
            self.state = RoundState::Deal;
            self.run(now);
        }
    }

    fn run(&mut self, now: Instant) {
        for _ in 0..MAX_IMMEDIATE_STEPS {
            if self.state.is_resting() {
                return;
            }
            let state = std::mem::replace(&mut self.state, RoundState::Done);
            self.state = match state {
                RoundState::Deal => self.deal(),
                RoundState::Draw => self.draw(now),
                RoundState::Settle(outcome) => self.settle(outcome),
                other => other,
            };
        }
        if !self.state.is_resting() {
            tracing::error!(round = self.round, "round did not reach a waiting state");
        }
    }

    /// Apply a seat's answer to its outstanding prompt.
    pub fn on_player_msg(&mut self, seat: usize, request: MjRequest, now: Instant) -> EngineResult<()> {
        if seat >= self.play.seat_count() {
            return Err(EngineError::InvalidSeat(seat));
        }
        if matches!(self.state, RoundState::Idle | RoundState::Done) {
            return Err(EngineError::RoundNotStarted);
        }
        self.ids.check(seat, request.request_id())?;
        let state = std::mem::replace(&mut self.state, RoundState::Done);
        let transition = match state {
            RoundState::SelfAction(wait) => self.on_self_action(wait, seat, request, now),
            RoundState::AwaitClaims(wait) => self.on_claim(wait, seat, request, now, false),
            RoundState::AwaitRobKong(wait) => self.on_claim(wait, seat, request, now, true),
            other => Err((other, EngineError::NotYourTurn { seat })),
        };
        match transition {
            Ok(next) => {
                self.state = next;
                self.run(now);
                Ok(())
            }
            Err((state, err)) => {
                self.state = state;
                tracing::debug!(round = self.round, seat, error = %err, "request rejected");
                Err(err)
            }
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        if !self.state.is_resting() {
            self.run(now);
        }
        if self.timer.fire(now) {
            self.on_timeout(now);
        }
    }

    /// Offline seats are played for after the short trust timeout.
    pub fn set_offline(&mut self, seat: usize, offline: bool, now: Instant) {
        let Some(flag) = self.offline.get_mut(seat) else { return };
        *flag = offline;
        if !offline || self.ids.current(seat).is_none() {
            return;
        }
        let awaited = self.awaited_seats();
        if awaited.iter().all(|&s| self.offline[s]) {
            let trust = Duration::from_secs(self.play.conf().trust_timeout_secs);
            if self.timer.remaining(now).map_or(true, |left| left > trust) {
                self.timer.schedule(now, trust);
            }
        }
    }

    /// End the round without settlement. Payments already applied stand.
    pub fn dissolve(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        self.finish_wait();
        let banker = self.play.banker();
        let result = RoundResult {
            round: self.round,
            banker,
            reason: RoundEndReason::Dissolved,
            winners: Vec::new(),
            from: None,
            deltas: self.scorelator.round_total(self.play.seat_count()),
            balances: self.balances.clone(),
            next_banker: Some(banker),
            details: HashMap::new(),
        };
        tracing::info!(round = self.round, "round dissolved");
        self.outbox.broadcast(MjEvent::RoundResult(result.clone()));
        self.result = Some(result);
        self.state = RoundState::Done;
    }

    fn on_timeout(&mut self, now: Instant) {
        let requests: Vec<(usize, MjRequest)> = match &self.state {
            RoundState::SelfAction(wait) => match self.ids.current(wait.seat) {
                Some(id) => vec![(wait.seat, self.auto_self_request(wait, id))],
                None => Vec::new(),
            },
            RoundState::AwaitClaims(wait) | RoundState::AwaitRobKong(wait) => wait
                .pending
                .iter()
                .filter_map(|&seat| {
                    let request_id = self.ids.current(seat)?;
                    let opt = wait.offered.get(&seat)?;
                    Some(if opt.must_hu && opt.has(Operate::HU) {
                        (seat, MjRequest::Hu { request_id })
                    } else {
                        (seat, MjRequest::Pass { request_id })
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        for (seat, request) in requests {
            // An earlier auto-answer may have closed the window.
            if !self.awaits(seat) {
                tracing::debug!(round = self.round, seat, "window closed before timeout answer");
                continue;
            }
            let request_id = request.request_id();
            tracing::info!(round = self.round, seat, operate = ?request.operate(), "decision timed out");
            if let Err(err) = self.on_player_msg(seat, request, now) {
                if !matches!(self.state, RoundState::SelfAction(_)) {
                    tracing::warn!(round = self.round, seat, error = %err, "timeout answer rejected");
                    continue;
                }
                tracing::warn!(round = self.round, seat, error = %err, "timeout action rejected, discarding");
                let fallback = MjRequest::Discard { request_id, tile: None };
                if let Err(err) = self.on_player_msg(seat, fallback, now) {
                    tracing::error!(round = self.round, seat, error = %err, "timeout fallback rejected");
                }
            }
        }
    }

    fn awaits(&self, seat: usize) -> bool {
        match &self.state {
            RoundState::SelfAction(wait) => wait.seat == seat,
            RoundState::AwaitClaims(wait) | RoundState::AwaitRobKong(wait) => wait.pending.contains(&seat),
            _ => false,
        }
    }

    fn auto_self_request(&self, wait: &SelfWait, request_id: u32) -> MjRequest {
        if wait.operates.must_hu && wait.operates.has(Operate::HU) {
            return MjRequest::Hu { request_id };
        }
        if wait.ting_only {
            if let Some(&tile) = self.play.seat_data(wait.seat).call_map.keys().next() {
                return MjRequest::Ting { request_id, tile };
            }
        }
        MjRequest::Discard { request_id, tile: None }
    }

    // -----------------------------------------------------------------------
    // Input-free steps
    // -----------------------------------------------------------------------

    fn deal(&mut self) -> RoundState {
        self.play.deal();
        let seats = self.play.seat_count();
        self.outbox.broadcast(MjEvent::RoundBegin {
            round: self.round,
            banker: self.play.banker(),
            wildcards: self.play.wildcards().to_vec(),
            balances: self.balances.clone(),
        });
        for seat in 0..seats {
            let tiles = self.play.seat_data(seat).hand.clone();
            let count = tiles.len();
            self.outbox.split(
                seat,
                seats,
                MjEvent::Deal { seat, tiles, count },
                MjEvent::Deal {
                    seat,
                    tiles: Vec::new(),
                    count,
                },
            );
        }
        self.emit_flowers(0);
        tracing::debug!(
            round = self.round,
            banker = self.play.banker(),
            rest = self.play.rest_count(),
            "hands dealt"
        );
        RoundState::Draw
    }

    fn emit_flowers(&mut self, since: usize) {
        let flowers: Vec<(usize, Tile)> = self.play.history()[since..]
            .iter()
            .filter(|h| h.operate == Operate::FLOWER)
            .map(|h| (h.seat, h.tile))
            .collect();
        for (seat, tile) in flowers {
            self.outbox.broadcast(MjEvent::Flower { seat, tile });
        }
    }

    fn draw(&mut self, now: Instant) -> RoundState {
        let seat = self.play.cur_seat();
        let since = self.play.history().len();
        let drawn = self.play.draw();
        self.emit_flowers(since);
        let Some(tile) = drawn else {
            return RoundState::Settle(Outcome::Exhausted);
        };
        let rest = self.play.rest_count();
        self.outbox.split(
            seat,
            self.play.seat_count(),
            MjEvent::Draw {
                seat,
                tile: Some(tile),
                rest,
            },
            MjEvent::Draw { seat, tile: None, rest },
        );
        self.enter_self_action(now, false)
    }

    fn enter_self_action(&mut self, now: Instant, ting_only: bool) -> RoundState {
        let seat = self.play.cur_seat();
        let ting_only = ting_only && !self.play.seat_data(seat).call_map.is_empty();
        let operates = if ting_only {
            let mut opt = Operates::default();
            opt.add(Operate::TING);
            opt
        } else {
            self.play.fetch_self_operates()
        };
        self.send_prompt(seat, &operates);
        self.arm(now, &[seat], self.play.conf().self_timeout_secs);
        RoundState::SelfAction(SelfWait {
            seat,
            operates,
            ting_only,
        })
    }

    fn enter_claims(&mut self, now: Instant) -> RoundState {
        let from = self.play.cur_seat();
        let Some(tile) = self.play.cur_tile() else {
            self.play.switch_seat(None);
            return RoundState::Draw;
        };
        let mut offered = BTreeMap::new();
        for seat in 0..self.play.seat_count() {
            if seat == from {
                continue;
            }
            let opt = self.play.fetch_wait_operates(seat);
            if opt.has_claim() {
                offered.insert(seat, opt);
            } else {
                self.send_tips(seat, &opt);
            }
        }
        if offered.is_empty() {
            self.play.switch_seat(None);
            return RoundState::Draw;
        }
        self.open_window(now, ClaimWait::new(from, tile, offered), false)
    }

    fn enter_rob_kong(&mut self, now: Instant) -> RoundState {
        let from = self.play.cur_seat();
        let Some(tile) = self.play.cur_tile() else {
            return RoundState::Draw;
        };
        let mut offered = BTreeMap::new();
        for seat in 0..self.play.seat_count() {
            if seat == from {
                continue;
            }
            let opt = self.play.fetch_rob_kong_operates(seat);
            if opt.has(Operate::HU) {
                offered.insert(seat, opt);
            }
        }
        if offered.is_empty() {
            return RoundState::Draw;
        }
        tracing::debug!(round = self.round, seat = from, %tile, "kong may be robbed");
        self.open_window(now, ClaimWait::new(from, tile, offered), true)
    }

    fn open_window(&mut self, now: Instant, wait: ClaimWait, rob: bool) -> RoundState {
        for (&seat, opt) in &wait.offered {
            self.send_prompt(seat, opt);
        }
        let seats: Vec<usize> = wait.offered.keys().copied().collect();
        self.arm(now, &seats, self.play.conf().claim_timeout_secs);
        if rob {
            RoundState::AwaitRobKong(wait)
        } else {
            RoundState::AwaitClaims(wait)
        }
    }

    fn send_prompt(&mut self, seat: usize, operates: &Operates) {
        let request_id = self.ids.issue(seat);
        self.send_tips(seat, operates);
        self.outbox.send_to(
            seat,
            MjEvent::Operates {
                seat,
                request_id,
                operates: operates.clone(),
                tile: self.play.cur_tile(),
            },
        );
    }

    fn send_tips(&mut self, seat: usize, operates: &Operates) {
        for &tip in &operates.tips {
            self.outbox.send_to(seat, MjEvent::Tip { seat, tip });
        }
    }

    fn arm(&mut self, now: Instant, seats: &[usize], secs: u64) {
        let secs = if seats.iter().all(|&s| self.offline[s]) {
            self.play.conf().trust_timeout_secs
        } else {
            secs
        };
        self.timer.schedule(now, Duration::from_secs(secs));
    }

    fn finish_wait(&mut self) {
        self.timer.cancel();
        self.ids.clear_all();
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    fn on_self_action(&mut self, wait: SelfWait, seat: usize, request: MjRequest, now: Instant) -> Transition {
        if seat != wait.seat {
            return Err((RoundState::SelfAction(wait), EngineError::NotYourTurn { seat }));
        }
        let op = request.operate();
        let offered = wait.operates.has(op) || (op == Operate::TING && wait.operates.has(Operate::TIAN_TING));
        if !offered {
            let err = illegal(seat, format!("{} is not offered", op.name()));
            return Err((RoundState::SelfAction(wait), err));
        }
        match request {
            MjRequest::Hu { .. } => {
                let multiples = match self.play.kon_draw_feeder() {
                    Some(feeder) if self.play.conf().feeder_pays_kon_bloom => self.play.dian_kon_hua(feeder),
                    _ => self.play.zimo(),
                };
                self.finish_wait();
                self.announce_win(&[seat], seat);
                Ok(RoundState::Settle(Outcome::Win {
                    winners: vec![seat],
                    from: None,
                    multiples,
                }))
            }
            MjRequest::Discard { tile, .. } => match self.play.discard(tile) {
                Ok(tile) => {
                    self.finish_wait();
                    self.outbox.broadcast(MjEvent::Discard { seat, tile });
                    Ok(self.enter_claims(now))
                }
                Err(err) => Err((RoundState::SelfAction(wait), err)),
            },
            MjRequest::Ting { tile, .. } => {
                let tian_ting = wait.operates.has(Operate::TIAN_TING);
                match self.play.ting(tile, tian_ting) {
                    Ok(()) => {
                        self.finish_wait();
                        self.outbox.broadcast(MjEvent::Ting { seat, tile, tian_ting });
                        Ok(self.enter_claims(now))
                    }
                    Err(err) => Err((RoundState::SelfAction(wait), err)),
                }
            }
            MjRequest::Kon { tile, .. } => {
                let tile = tile
                    .or_else(|| wait.operates.kon_tiles.first().copied())
                    .filter(|t| wait.operates.kon_tiles.contains(t));
                let Some((tile, kind)) = tile.and_then(|t| self_kon_kind(&self.play, t).map(|k| (t, k))) else {
                    return Err((RoundState::SelfAction(wait), illegal(seat, "no kong on that tile")));
                };
                match self.play.try_kon(tile, kind) {
                    Ok(recorded) => {
                        self.finish_wait();
                        let from = self.play.history().last().map(|h| h.from).unwrap_or(seat);
                        self.outbox.broadcast(MjEvent::Kon {
                            seat,
                            from,
                            tile,
                            kind: recorded,
                        });
                        self.score_kon(seat, recorded, from);
                        if kind == KonKind::Bu {
                            Ok(self.enter_rob_kong(now))
                        } else {
                            Ok(RoundState::Draw)
                        }
                    }
                    Err(err) => Err((RoundState::SelfAction(wait), err)),
                }
            }
            other => {
                let err = illegal(seat, format!("{} is not a turn action", other.operate().name()));
                Err((RoundState::SelfAction(wait), err))
            }
        }
    }

    fn on_claim(&mut self, mut wait: ClaimWait, seat: usize, request: MjRequest, now: Instant, rob: bool) -> Transition {
        let restore = |wait| {
            if rob {
                RoundState::AwaitRobKong(wait)
            } else {
                RoundState::AwaitClaims(wait)
            }
        };
        let Some(opt) = wait.offered.get(&seat).filter(|_| wait.pending.contains(&seat)) else {
            return Err((restore(wait), EngineError::NotYourTurn { seat }));
        };
        let valid = match &request {
            MjRequest::Pass { .. } => !opt.must_hu,
            MjRequest::Hu { .. } => opt.has(Operate::HU),
            MjRequest::Pon { .. } => opt.has(Operate::PON),
            MjRequest::Kon { .. } => opt.has(Operate::KON),
            MjRequest::PonTing { .. } => opt.has(Operate::PON_TING),
            MjRequest::Chow { left, .. } => opt.has(Operate::CHOW) && opt.chow_lefts.contains(left),
            MjRequest::ChowTing { left, .. } => opt.has(Operate::CHOW_TING) && opt.chow_ting_lefts.contains(left),
            _ => false,
        };
        if !valid {
            let err = illegal(seat, format!("{} is not a valid answer", request.operate().name()));
            return Err((restore(wait), err));
        }
        wait.pending.remove(&seat);
        self.ids.clear(seat);
        if matches!(request, MjRequest::Pass { .. }) {
            wait.passed.insert(seat);
        } else {
            wait.answers.insert(seat, request);
        }
        if !wait.is_decided() {
            return Ok(restore(wait));
        }
        self.finish_wait();
        Ok(self.resolve_claims(wait, now, rob))
    }

    fn resolve_claims(&mut self, wait: ClaimWait, now: Instant, rob: bool) -> RoundState {
        self.record_declines(&wait);
        let seats = self.play.seat_count();
        let mut winners: Vec<usize> = wait
            .answers
            .iter()
            .filter(|(_, r)| matches!(r, MjRequest::Hu { .. }))
            .map(|(&seat, _)| seat)
            .collect();
        if !winners.is_empty() {
            winners.sort_by_key(|&s| (s + seats - wait.from) % seats);
            let multiples = if rob {
                let multiples = self.play.rob_kong(&winners);
                if self.play.conf().kon_scores {
                    if let Some(undo) = self.scorelator.revert_last_kon() {
                        self.apply_deltas(ScoreReason::TuiKon, undo);
                    }
                }
                multiples
            } else {
                self.play.pao_hu(&winners)
            };
            self.announce_win(&winners, wait.from);
            return RoundState::Settle(Outcome::Win {
                winners,
                from: Some(wait.from),
                multiples,
            });
        }
        if rob {
            // The kong stands; its owner draws the replacement.
            return RoundState::Draw;
        }

        let best = wait
            .answers
            .iter()
            .max_by_key(|(_, r)| r.operate().priority())
            .map(|(&seat, r)| (seat, r.clone()));
        let Some((seat, request)) = best else {
            self.play.switch_seat(None);
            return RoundState::Draw;
        };
        let from = wait.from;
        let tile = wait.tile;
        let applied = match request {
            MjRequest::Kon { .. } => self.play.zhi_kon(seat).map(|()| {
                self.outbox.broadcast(MjEvent::Kon {
                    seat,
                    from,
                    tile,
                    kind: KonKind::Zhi,
                });
                self.score_kon(seat, KonKind::Zhi, from);
                RoundState::Draw
            }),
            MjRequest::Pon { .. } | MjRequest::PonTing { .. } => {
                let ting_only = matches!(request, MjRequest::PonTing { .. });
                self.play.pon(seat).map(|()| {
                    self.outbox.broadcast(MjEvent::Pon { seat, from, tile });
                    self.enter_self_action(now, ting_only)
                })
            }
            MjRequest::Chow { left, .. } | MjRequest::ChowTing { left, .. } => {
                let ting_only = matches!(request, MjRequest::ChowTing { .. });
                self.play.chow(seat, left).map(|()| {
                    self.outbox.broadcast(MjEvent::Chow { seat, from, tile, left });
                    self.enter_self_action(now, ting_only)
                })
            }
            _ => Err(illegal(seat, "unexpected claim")),
        };
        applied.unwrap_or_else(|err| {
            tracing::warn!(round = self.round, seat, error = %err, "claim could not be applied");
            self.play.switch_seat(None);
            RoundState::Draw
        })
    }

    /// Remember declined wins and pongs so the same tile is not offered again.
    fn record_declines(&mut self, wait: &ClaimWait) {
        for &seat in &wait.passed {
            if let Some(opt) = wait.offered.get(&seat) {
                self.play.record_pass(seat, opt, wait.tile);
            }
        }
        for (&seat, request) in &wait.answers {
            let Some(opt) = wait.offered.get(&seat) else { continue };
            if opt.has(Operate::HU) && !matches!(request, MjRequest::Hu { .. }) {
                let mut declined = Operates::default();
                declined.add(Operate::HU);
                declined.hu_multiple = opt.hu_multiple;
                self.play.record_pass(seat, &declined, wait.tile);
            }
        }
    }

    fn announce_win(&mut self, winners: &[usize], from: usize) {
        for &seat in winners {
            if let Some(result) = self.play.hu_result(seat).cloned() {
                tracing::info!(round = self.round, seat, from, multiple = result.multiple, "win declared");
                self.outbox.broadcast(MjEvent::Hu { seat, from, result });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scoring
    // -----------------------------------------------------------------------

    fn others(&self, seat: usize, multiple: i64) -> Vec<(usize, i64)> {
        (0..self.play.seat_count())
            .filter(|&s| s != seat && !self.play.is_eliminated(s))
            .map(|s| (s, multiple))
            .collect()
    }

    fn score_kon(&mut self, seat: usize, kind: KonKind, from: usize) {
        let conf = self.play.conf();
        if !conf.kon_scores {
            return;
        }
        let (reason, payers) = match kind {
            KonKind::Zhi => (ScoreReason::ZhiKon, vec![(from, conf.zhi_kon_multiple)]),
            KonKind::An => (ScoreReason::AnKon, self.others(seat, conf.an_kon_multiple)),
            KonKind::Bu => (ScoreReason::BuKon, self.others(seat, conf.bu_kon_multiple)),
        };
        let deltas = self.scorelator.calc_kon(reason, seat, &payers, &self.balances);
        self.apply_deltas(reason, deltas);
    }

    fn apply_deltas(&mut self, reason: ScoreReason, deltas: Vec<i64>) {
        if deltas.iter().all(|&d| d == 0) {
            return;
        }
        for (balance, delta) in self.balances.iter_mut().zip(&deltas) {
            *balance += delta;
        }
        self.outbox.broadcast(MjEvent::ScoreChange {
            reason,
            deltas,
            balances: self.balances.clone(),
        });
    }

    /// Wall exhausted: every active seat that is not ready pays each ready seat
    /// the best multiplier that seat was waiting on.
    fn cha_jiao(&mut self) {
        let seats = self.play.seat_count();
        let ready: Vec<Option<i64>> = (0..seats)
            .map(|s| {
                if self.play.is_eliminated(s) {
                    None
                } else {
                    self.play.ready_multiple(s).map(|m| self.play.conf().real_multiple(m))
                }
            })
            .collect();
        let mut multiples = vec![0; seats];
        for loser in (0..seats).filter(|&s| ready[s].is_none() && !self.play.is_eliminated(s)) {
            for (winner, multi) in ready.iter().enumerate() {
                if let Some(multi) = multi {
                    multiples[loser] -= multi;
                    multiples[winner] += multi;
                }
            }
        }
        if multiples.iter().any(|&m| m != 0) {
            let deltas = self.scorelator.calc_multi(ScoreReason::ChaJiao, &multiples, &self.balances);
            self.apply_deltas(ScoreReason::ChaJiao, deltas);
        }
    }

    fn next_banker(&self, winners: &[usize], from: Option<usize>) -> usize {
        let banker = self.play.banker();
        match self.play.conf().banker_policy {
            BankerPolicy::Winner => match winners {
                [] => banker,
                [only] => *only,
                _ => from.unwrap_or(banker),
            },
            BankerPolicy::Rotate => {
                if winners.contains(&banker) {
                    banker
                } else {
                    self.play.next_active_seat(banker)
                }
            }
        }
    }

    fn settle(&mut self, outcome: Outcome) -> RoundState {
        if self.settled {
            return RoundState::Done;
        }
        self.settled = true;
        self.finish_wait();
        let (reason, winners, from) = match outcome {
            Outcome::Win {
                winners,
                from,
                multiples,
            } => {
                let deltas = self.scorelator.calc_multi(ScoreReason::Hu, &multiples, &self.balances);
                self.apply_deltas(ScoreReason::Hu, deltas);
                (RoundEndReason::Win, winners, from)
            }
            Outcome::Exhausted => {
                if self.play.conf().cha_jiao {
                    self.cha_jiao();
                }
                (RoundEndReason::Exhausted, Vec::new(), None)
            }
        };
        let total = self.scorelator.finish(&self.balances);
        self.apply_deltas(ScoreReason::Total, total);

        let mut details = HashMap::new();
        details.insert("wall_rest".to_string(), json!(self.play.rest_count()));
        if self.play.conf().eliminate_broke {
            let broke: Vec<usize> = (0..self.balances.len()).filter(|&s| self.balances[s] <= 0).collect();
            details.insert("eliminated".to_string(), json!(broke));
        }
        let result = RoundResult {
            round: self.round,
            banker: self.play.banker(),
            reason,
            winners: winners.iter().filter_map(|&s| self.play.hu_result(s).cloned()).collect(),
            from,
            deltas: self.scorelator.round_total(self.play.seat_count()),
            balances: self.balances.clone(),
            next_banker: Some(self.next_banker(&winners, from)),
            details,
        };
        tracing::info!(
            round = self.round,
            reason = ?result.reason,
            winners = ?winners,
            deltas = ?result.deltas,
            "round settled"
        );
        self.outbox.broadcast(MjEvent::RoundResult(result.clone()));
        self.result = Some(result);
        RoundState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::classic::ClassicVariant;

    fn classic_round(seed: u64) -> Round {
        let variant: Arc<dyn MahjongVariant> = Arc::new(ClassicVariant);
        let conf = variant.default_rules();
        Round::new(conf, variant, RoundSettings::new(4, 0, seed)).unwrap()
    }

    #[test]
    fn test_start_waits_on_banker() {
        let mut round = classic_round(7);
        let now = Instant::now();
        round.start(now);
        let prompts = round.pending_prompts();
        assert_eq!(round.phase(), Phase::SelfAction);
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].seat, 0);
        assert!(prompts[0].self_turn);
        assert_eq!(round.play().seat_data(0).hand.len() % 3, 2);
        assert!(round.deadline().is_some());
    }

    #[test]
    fn test_stale_and_foreign_requests_rejected() {
        let mut round = classic_round(11);
        let now = Instant::now();
        round.start(now);
        let prompt = round.pending_prompts().remove(0);
        let err = round
            .on_player_msg(1, MjRequest::Discard { request_id: prompt.request_id, tile: None }, now)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotYourTurn { seat: 1 }));
        let err = round
            .on_player_msg(0, MjRequest::Discard { request_id: prompt.request_id + 100, tile: None }, now)
            .unwrap_err();
        assert!(matches!(err, EngineError::StaleRequest { .. }));
        let err = round
            .on_player_msg(0, MjRequest::Pon { request_id: prompt.request_id }, now)
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalAction { .. }));
        assert_eq!(round.phase(), Phase::SelfAction);
    }

    #[test]
    fn test_timeouts_finish_round_and_conserve_tiles() {
        for seed in [1u64, 2, 3] {
            let mut round = classic_round(seed);
            let mut now = Instant::now();
            round.start(now);
            let total = round.play().wall_total();
            for _ in 0..2000 {
                if round.is_over() {
                    break;
                }
                now += Duration::from_secs(60);
                round.on_tick(now);
                assert_eq!(round.play().tiles_in_play(), total);
            }
            assert!(round.is_over(), "seed {} did not finish", seed);
            let result = round.result().unwrap();
            assert_eq!(result.deltas.iter().sum::<i64>(), 0);
            assert_eq!(result.balances, round.balances());
            assert!(result.next_banker.is_some());
        }
    }

    #[test]
    fn test_dissolve_is_final() {
        let mut round = classic_round(5);
        let now = Instant::now();
        round.start(now);
        round.dissolve();
        assert!(round.is_over());
        assert_eq!(round.result().map(|r| r.reason), Some(RoundEndReason::Dissolved));
        assert!(round.pending_prompts().is_empty());
        round.dissolve();
        let results = round
            .drain_events()
            .into_iter()
            .filter(|o| matches!(o.event, MjEvent::RoundResult(_)))
            .count();
        assert_eq!(results, 1);
    }
}
