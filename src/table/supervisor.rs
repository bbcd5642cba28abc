//! Table supervisor: seats, the running round, replay history and dissolve votes.
//!
//! All entry points take `now` explicitly so the same code runs under the
//! tokio tick driver and under deterministic tests.
//!
//! Lock order: `core` before `history`. No lock is held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::bots::{spawn_bot, BotQueue};
use super::transport::{to_event, Transport};
use crate::engine::bot_strategy::{strategy_by_name, GreedyStrategy};
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::models::{
    Action, Player, RoundEndReason, RoundResult, SessionResult, ACTION_DISSOLVE, ACTION_ENTER_GAME, ACTION_GAME,
    ACTION_READY,
};
use crate::engine::plugin::MahjongVariant;
use crate::engine::rules::PlayConf;
use crate::games::mahjong::dealer::PresetDeal;
use crate::games::mahjong::messages::{MjEvent, MjRequest};
use crate::games::mahjong::play::LastGameData;
use crate::games::mahjong::sender::Target;
use crate::games::mahjong::state::{Round, RoundSettings};

/// Session hooks for the host.
pub trait SessionObserver: Send + Sync {
    fn on_round_over(&self, _table_id: &str, _result: &RoundResult) {}
    fn on_session_over(&self, _table_id: &str, _result: &SessionResult) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Table-level settings that are not part of the rule profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub round_count: u32,
    pub dissolve_secs: u64,
    pub next_round_delay_secs: u64,
    pub bot_queue_capacity: usize,
    pub seed: Option<u64>,
    /// Scripted deal for the first round.
    pub preset: Option<PresetDeal>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            round_count: 8,
            dissolve_secs: 300,
            next_round_delay_secs: 5,
            bot_queue_capacity: 32,
            seed: None,
            preset: None,
        }
    }
}

/// Everything a table needs from its host, built once at creation.
#[derive(Clone)]
pub struct TableContext {
    pub variant: Arc<dyn MahjongVariant>,
    pub conf: PlayConf,
    pub config: TableConfig,
    pub transport: Arc<dyn Transport>,
    pub observer: Arc<dyn SessionObserver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStage {
    /// Waiting for seats to enter (or press ready).
    Waiting,
    Playing,
    /// Between rounds, until the next round is due.
    Between,
    Finished,
}

#[derive(Debug, Clone)]
struct SeatInfo {
    player: Player,
    online: bool,
    entered: bool,
    ready: bool,
    eliminated: bool,
}

#[derive(Debug, Clone)]
struct DissolveVote {
    deadline: Instant,
    votes: Vec<Option<bool>>,
}

struct TableCore {
    seats: Vec<SeatInfo>,
    stage: TableStage,
    round: Option<Round>,
    next_round_at: Option<Instant>,
    rounds_played: u32,
    balances: Vec<i64>,
    last: LastGameData,
    dissolve: Option<DissolveVote>,
    rng: StdRng,
    bots: HashMap<usize, BotQueue>,
    session: Option<SessionResult>,
}

pub struct Table {
    id: String,
    ctx: TableContext,
    core: Mutex<TableCore>,
    /// Per-seat events of the current round, replayed on re-entry.
    history: Mutex<Vec<Vec<MjEvent>>>,
}

impl Table {
    pub fn new(id: &str, ctx: TableContext, players: Vec<Player>) -> EngineResult<Self> {
        if players.len() < 2 {
            return Err(EngineError::Config(format!("table needs at least 2 players, got {}", players.len())));
        }
        ctx.conf.validate()?;
        let seats: Vec<SeatInfo> = players
            .into_iter()
            .enumerate()
            .map(|(i, mut player)| {
                player.seat_index = i;
                let bot = player.is_bot;
                SeatInfo {
                    player,
                    online: bot,
                    entered: bot,
                    ready: bot,
                    eliminated: false,
                }
            })
            .collect();
        let balances = seats.iter().map(|s| s.player.score).collect();
        let rng = StdRng::seed_from_u64(ctx.config.seed.unwrap_or_else(rand::random));
        let count = seats.len();
        tracing::info!(table_id = id, seats = count, variant = ctx.variant.game_id(), "table created");
        Ok(Self {
            id: id.to_string(),
            ctx,
            core: Mutex::new(TableCore {
                seats,
                stage: TableStage::Waiting,
                round: None,
                next_round_at: None,
                rounds_played: 0,
                balances,
                last: LastGameData::default(),
                dissolve: None,
                rng,
                bots: HashMap::new(),
                session: None,
            }),
            history: Mutex::new(vec![Vec::new(); count]),
        })
    }

    fn lock_core(&self) -> MutexGuard<'_, TableCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<Vec<MjEvent>>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> TableStage {
        self.lock_core().stage
    }

    pub fn rounds_played(&self) -> u32 {
        self.lock_core().rounds_played
    }

    pub fn balances(&self) -> Vec<i64> {
        self.lock_core().balances.clone()
    }

    pub fn session_result(&self) -> Option<SessionResult> {
        self.lock_core().session.clone()
    }

    pub fn seat_of(&self, player_id: &str) -> EngineResult<usize> {
        Self::seat_index(&self.lock_core(), player_id)
    }

    /// Run `f` against the active round, if any.
    pub fn with_round<R>(&self, f: impl FnOnce(&Round) -> R) -> Option<R> {
        self.lock_core().round.as_ref().map(f)
    }

    fn seat_index(core: &TableCore, player_id: &str) -> EngineResult<usize> {
        core.seats
            .iter()
            .position(|s| s.player.player_id == player_id)
            .ok_or_else(|| EngineError::PlayerNotOnTable(player_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Decode and route one inbound action.
    pub fn handle_action(&self, action: &Action, now: Instant) -> EngineResult<()> {
        match action.action_type.as_str() {
            ACTION_ENTER_GAME => self.enter_game(&action.player_id, now),
            ACTION_READY => self.ready(&action.player_id, now),
            ACTION_DISSOLVE => {
                let agree = action
                    .payload
                    .get("agree")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(true);
                self.dissolve(&action.player_id, agree, now)
            }
            ACTION_GAME => {
                let request: MjRequest = serde_json::from_value(action.payload.clone())
                    .map_err(|e| EngineError::BadPayload(e.to_string()))?;
                self.on_player_msg(&action.player_id, request, now)
            }
            other => Err(EngineError::BadPayload(format!("unknown action type '{}'", other))),
        }
    }

    /// First entry announces the seat; re-entry replays the round so far.
    pub fn enter_game(&self, player_id: &str, now: Instant) -> EngineResult<()> {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let seat = Self::seat_index(core, player_id)?;
        let first = !core.seats[seat].entered;
        let was_offline = !core.seats[seat].online;
        core.seats[seat].entered = true;
        core.seats[seat].online = true;

        if first {
            tracing::info!(table_id = %self.id, seat, player_id, "player entered");
            let event = MjEvent::SeatJoined {
                seat,
                player_id: player_id.to_string(),
            };
            self.deliver(core, Target::All, event, false);
            self.try_begin(core, now);
            return Ok(());
        }

        tracing::info!(table_id = %self.id, seat, player_id, "player re-entered");
        self.replay(core, seat, now);
        if was_offline {
            if let Some(round) = core.round.as_mut() {
                round.set_offline(seat, false, now);
            }
            self.deliver(core, Target::All, MjEvent::NetState { seat, online: true }, false);
        }
        Ok(())
    }

    pub fn ready(&self, player_id: &str, now: Instant) -> EngineResult<()> {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let seat = Self::seat_index(core, player_id)?;
        if core.seats[seat].ready {
            return Ok(());
        }
        core.seats[seat].ready = true;
        self.deliver(core, Target::All, MjEvent::Ready { seat }, false);
        self.try_begin(core, now);
        Ok(())
    }

    /// Connection change reported by the transport.
    pub fn net_state(&self, player_id: &str, online: bool, now: Instant) -> EngineResult<()> {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let seat = Self::seat_index(core, player_id)?;
        if core.seats[seat].online == online {
            return Ok(());
        }
        core.seats[seat].online = online;
        if let Some(round) = core.round.as_mut() {
            round.set_offline(seat, !online, now);
        }
        tracing::info!(table_id = %self.id, seat, online, "net state changed");
        self.deliver(core, Target::All, MjEvent::NetState { seat, online }, false);
        Ok(())
    }

    pub fn on_player_msg(&self, player_id: &str, request: MjRequest, now: Instant) -> EngineResult<()> {
        let seat = self.seat_of(player_id)?;
        self.on_seat_msg(seat, request, now)
    }

    pub fn on_seat_msg(&self, seat: usize, request: MjRequest, now: Instant) -> EngineResult<()> {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        if core.stage != TableStage::Playing {
            return Err(EngineError::RoundNotStarted);
        }
        let round = core.round.as_mut().ok_or(EngineError::RoundNotStarted)?;
        round.on_player_msg(seat, request, now)?;
        self.flush(core, now);
        Ok(())
    }

    /// Start or answer a dissolve vote. One disagreement cancels it; all
    /// seats agreeing, or the window running out, ends the session.
    pub fn dissolve(&self, player_id: &str, agree: bool, now: Instant) -> EngineResult<()> {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let seat = Self::seat_index(core, player_id)?;
        if core.stage == TableStage::Finished {
            return Err(EngineError::RoundNotStarted);
        }
        if let Some(vote) = core.dissolve.as_mut() {
            vote.votes[seat] = Some(agree);
        } else {
            if !agree {
                // Nothing to cancel; still tell the table who refused.
                tracing::debug!(table_id = %self.id, seat, "dissolve refused with no open vote");
                self.deliver(core, Target::All, MjEvent::Dissolve { seat, agree, remaining_secs: 0 }, false);
                self.deliver(core, Target::All, MjEvent::DissolveResult { dissolved: false }, false);
                return Ok(());
            }
            let mut votes: Vec<Option<bool>> = core
                .seats
                .iter()
                .map(|s| if s.player.is_bot { Some(true) } else { None })
                .collect();
            votes[seat] = Some(true);
            core.dissolve = Some(DissolveVote {
                deadline: now + Duration::from_secs(self.ctx.config.dissolve_secs),
                votes,
            });
            tracing::info!(table_id = %self.id, seat, "dissolve vote opened");
        }

        let remaining_secs = core
            .dissolve
            .as_ref()
            .map(|v| v.deadline.saturating_duration_since(now).as_secs())
            .unwrap_or(0);
        self.deliver(core, Target::All, MjEvent::Dissolve { seat, agree, remaining_secs }, false);

        if !agree {
            core.dissolve = None;
            tracing::info!(table_id = %self.id, seat, "dissolve vote rejected");
            self.deliver(core, Target::All, MjEvent::DissolveResult { dissolved: false }, false);
            return Ok(());
        }
        let unanimous = core
            .dissolve
            .as_ref()
            .is_some_and(|v| v.votes.iter().all(|v| *v == Some(true)));
        if unanimous {
            self.apply_dissolve(core, now);
        }
        Ok(())
    }

    /// Drive timers: dissolve expiry, round waits and the next round.
    pub fn tick(&self, now: Instant) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        if core.dissolve.as_ref().is_some_and(|v| now >= v.deadline) {
            tracing::info!(table_id = %self.id, "dissolve vote expired");
            self.apply_dissolve(core, now);
            return;
        }
        match core.stage {
            TableStage::Playing => {
                if let Some(round) = core.round.as_mut() {
                    round.on_tick(now);
                }
                self.flush(core, now);
            }
            TableStage::Between if core.next_round_at.is_some_and(|at| now >= at) => {
                core.next_round_at = None;
                core.stage = TableStage::Waiting;
                self.try_begin(core, now);
            }
            _ => {}
        }
    }

    /// Spawn an actor for every bot seat and start play if nobody else is
    /// expected. Needs a tokio runtime.
    pub fn attach_bots(self: &Arc<Self>, now: Instant) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let capacity = self.ctx.config.bot_queue_capacity;
        for seat in 0..core.seats.len() {
            let info = &core.seats[seat];
            if !info.player.is_bot || core.bots.contains_key(&seat) {
                continue;
            }
            let name = info.player.bot_id.clone().unwrap_or_else(|| "greedy".to_string());
            let strategy = strategy_by_name(&name).unwrap_or_else(|| {
                tracing::warn!(table_id = %self.id, seat, bot_id = %name, "unknown bot strategy, using greedy");
                Box::new(GreedyStrategy)
            });
            let queue = spawn_bot(Arc::clone(self), seat, strategy, capacity);
            core.bots.insert(seat, queue);
        }
        match core.stage {
            TableStage::Waiting => self.try_begin(core, now),
            TableStage::Playing => self.flush(core, now),
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn try_begin(&self, core: &mut TableCore, now: Instant) {
        if core.stage != TableStage::Waiting {
            return;
        }
        let entered = core.seats.iter().all(|s| s.entered);
        let ready = !self.ctx.conf.require_ready || core.seats.iter().all(|s| s.ready);
        if !entered || !ready {
            return;
        }
        if let Err(e) = self.start_round(core, now) {
            tracing::error!(table_id = %self.id, error = %e, "could not start round");
        }
    }

    fn start_round(&self, core: &mut TableCore, now: Instant) -> EngineResult<()> {
        let count = core.seats.len();
        let mut banker = core.last.take_banker(count, &mut core.rng);
        if core.seats[banker].eliminated {
            if let Some(next) = (1..count).map(|i| (banker + i) % count).find(|&s| !core.seats[s].eliminated) {
                banker = next;
            }
        }
        let settings = RoundSettings {
            round: core.rounds_played + 1,
            banker,
            seed: core.rng.gen(),
            balances: core.balances.clone(),
            eliminated: core.seats.iter().map(|s| s.eliminated).collect(),
            preset: if core.rounds_played == 0 {
                self.ctx.config.preset.clone()
            } else {
                None
            },
        };
        let mut round = Round::new(self.ctx.conf.clone(), self.ctx.variant.clone(), settings)?;
        for (seat, info) in core.seats.iter().enumerate() {
            if !info.online {
                round.set_offline(seat, true, now);
            }
        }
        self.lock_history().iter_mut().for_each(Vec::clear);
        for queue in core.bots.values_mut() {
            queue.reset();
        }
        round.start(now);
        tracing::info!(table_id = %self.id, round = round.round(), banker, "round started");
        core.round = Some(round);
        core.stage = TableStage::Playing;
        self.flush(core, now);
        Ok(())
    }

    /// Push the round's queued events out and hand prompts to bots.
    fn flush(&self, core: &mut TableCore, now: Instant) {
        let Some(round) = core.round.as_mut() else { return };
        let outbound = round.drain_events();
        let prompts = round.pending_prompts();
        let over = round.is_over();
        for item in outbound {
            self.deliver(core, item.target, item.event, true);
        }
        for prompt in &prompts {
            if let Some(queue) = core.bots.get_mut(&prompt.seat) {
                queue.offer(prompt);
            }
        }
        if over && core.stage == TableStage::Playing {
            self.on_round_over(core, now);
        }
    }

    fn deliver(&self, core: &TableCore, target: Target, event: MjEvent, record: bool) {
        let seats: Vec<usize> = match target {
            Target::Seat(seat) => vec![seat],
            Target::All => (0..core.seats.len()).collect(),
        };
        // Prompts are resent fresh on re-entry rather than replayed.
        let transient = matches!(event, MjEvent::Operates { .. } | MjEvent::Tip { .. });
        if record && !transient {
            let mut history = self.lock_history();
            for &seat in &seats {
                if let Some(log) = history.get_mut(seat) {
                    log.push(event.clone());
                }
            }
        }
        for seat in seats {
            let Some(info) = core.seats.get(seat) else { continue };
            if info.player.is_bot {
                continue;
            }
            let pid = &info.player.player_id;
            self.ctx.transport.send(pid, to_event(Some(pid), &event));
        }
    }

    fn replay(&self, core: &TableCore, seat: usize, now: Instant) {
        let pid = core.seats[seat].player.player_id.clone();
        let send = |event: &MjEvent| self.ctx.transport.send(&pid, to_event(Some(&pid), event));
        let events = self.lock_history().get(seat).cloned().unwrap_or_default();
        send(&MjEvent::HistoryBegin);
        for event in &events {
            send(event);
        }
        send(&MjEvent::HistoryEnd);
        if let Some(prompt) = core.round.as_ref().and_then(|r| r.prompt_event(seat)) {
            send(&prompt);
        }
        if let Some(vote) = &core.dissolve {
            let remaining_secs = vote.deadline.saturating_duration_since(now).as_secs();
            for (voter, agree) in vote.votes.iter().enumerate() {
                if let Some(agree) = *agree {
                    send(&MjEvent::Dissolve {
                        seat: voter,
                        agree,
                        remaining_secs,
                    });
                }
            }
        }
    }

    fn apply_dissolve(&self, core: &mut TableCore, now: Instant) {
        core.dissolve = None;
        tracing::info!(table_id = %self.id, "table dissolved");
        self.deliver(core, Target::All, MjEvent::DissolveResult { dissolved: true }, false);
        match core.stage {
            TableStage::Playing => {
                if let Some(round) = core.round.as_mut() {
                    round.dissolve();
                }
                self.flush(core, now);
            }
            TableStage::Finished => {}
            _ => self.finish_session(core, "dissolved"),
        }
    }

    fn on_round_over(&self, core: &mut TableCore, now: Instant) {
        let Some(result) = core.round.as_ref().and_then(|r| r.result().cloned()) else {
            tracing::error!(table_id = %self.id, "round over without a result");
            return;
        };
        core.rounds_played += 1;
        core.balances = result.balances.clone();
        core.last.banker = result.next_banker;
        core.last.bump("rounds", 1);
        if result.is_draw() {
            core.last.bump("draws", 1);
        }
        let broke: Vec<usize> = result
            .details
            .get("eliminated")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        for seat in broke {
            if let Some(info) = core.seats.get_mut(seat) {
                info.eliminated = true;
            }
        }
        self.ctx.observer.on_round_over(&self.id, &result);

        let active = core.seats.iter().filter(|s| !s.eliminated).count();
        if result.reason == RoundEndReason::Dissolved {
            self.finish_session(core, "dissolved");
        } else if active < 2 {
            self.finish_session(core, "eliminated");
        } else if core.rounds_played >= self.ctx.config.round_count {
            self.finish_session(core, "normal");
        } else {
            core.stage = TableStage::Between;
            core.next_round_at = Some(now + Duration::from_secs(self.ctx.config.next_round_delay_secs));
            for info in core.seats.iter_mut().filter(|s| !s.player.is_bot) {
                info.ready = false;
            }
        }
    }

    fn finish_session(&self, core: &mut TableCore, reason: &str) {
        if core.stage == TableStage::Finished {
            return;
        }
        core.stage = TableStage::Finished;
        core.next_round_at = None;
        core.dissolve = None;
        let final_scores = core
            .seats
            .iter()
            .zip(&core.balances)
            .map(|(s, &b)| (s.player.player_id.clone(), b))
            .collect();
        let result = SessionResult {
            rounds_played: core.rounds_played,
            final_scores,
            reason: reason.to_string(),
        };
        tracing::info!(table_id = %self.id, rounds = core.rounds_played, reason, "session over");
        self.deliver(core, Target::All, MjEvent::SessionOver(result.clone()), true);
        self.ctx.observer.on_session_over(&self.id, &result);
        core.session = Some(result);
        // Dropping the queues ends the bot tasks.
        core.bots.clear();
    }
}
