//! Table-level flows: entering, replay on reconnect, dissolve votes and whole
//! sessions driven by the clock.
//!
//! Run with:
//!     cargo test --test table_sessions

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;

use mahjong_game_engine::engine::errors::EngineError;
use mahjong_game_engine::engine::models::{
    Action, Player, RoundEndReason, RoundResult, SessionResult, ACTION_DISSOLVE, ACTION_ENTER_GAME, ACTION_GAME,
};
use mahjong_game_engine::engine::plugin::MahjongVariant;
use mahjong_game_engine::engine::rules::{load_rules, PlayConf};
use mahjong_game_engine::games::VariantRegistry;
use mahjong_game_engine::table::{
    CollectingTransport, SessionObserver, Table, TableConfig, TableContext, TableRegistry, TableStage,
};

const PLAYERS: [&str; 4] = ["p0", "p1", "p2", "p3"];

#[derive(Default)]
struct RecordingObserver {
    rounds: Mutex<Vec<RoundResult>>,
    sessions: Mutex<Vec<SessionResult>>,
}

impl SessionObserver for RecordingObserver {
    fn on_round_over(&self, _table_id: &str, result: &RoundResult) {
        self.rounds.lock().unwrap().push(result.clone());
    }

    fn on_session_over(&self, _table_id: &str, result: &SessionResult) {
        self.sessions.lock().unwrap().push(result.clone());
    }
}

struct Fixture {
    table: Table,
    transport: Arc<CollectingTransport>,
    observer: Arc<RecordingObserver>,
}

fn fixture_with(variant_id: &str, conf: Option<PlayConf>, config: TableConfig) -> Fixture {
    let variant = VariantRegistry::with_builtin().get(variant_id).unwrap();
    let conf = conf.unwrap_or_else(|| variant.default_rules());
    let transport = Arc::new(CollectingTransport::new());
    let observer = Arc::new(RecordingObserver::default());
    let ctx = TableContext {
        variant,
        conf,
        config,
        transport: transport.clone(),
        observer: observer.clone(),
    };
    let players = PLAYERS.iter().map(|p| Player::human(p, 0)).collect();
    Fixture {
        table: Table::new("t1", ctx, players).unwrap(),
        transport,
        observer,
    }
}

fn fixture(round_count: u32) -> Fixture {
    let config = TableConfig {
        round_count,
        seed: Some(3),
        ..TableConfig::default()
    };
    fixture_with("classic", None, config)
}

fn enter_all(table: &Table, now: Instant) {
    for p in PLAYERS {
        table.enter_game(p, now).unwrap();
    }
}

/// Advance the clock a minute at a time until the session ends.
fn run_out(table: &Table, mut now: Instant) -> Instant {
    for _ in 0..5000 {
        if table.stage() == TableStage::Finished {
            break;
        }
        now += Duration::from_secs(60);
        table.tick(now);
    }
    now
}

#[test]
fn round_starts_once_every_seat_has_entered() {
    let f = fixture(1);
    let now = Instant::now();
    for p in &PLAYERS[..3] {
        f.table.enter_game(p, now).unwrap();
    }
    assert_eq!(f.table.stage(), TableStage::Waiting);
    assert!(f.table.with_round(|_| ()).is_none());

    f.table.enter_game("p3", now).unwrap();
    assert_eq!(f.table.stage(), TableStage::Playing);
    for p in PLAYERS {
        let types = f.transport.event_types_for(p);
        assert!(types.contains(&"seat_joined".to_string()));
        assert!(types.contains(&"round_begin".to_string()));
        assert!(types.contains(&"deal".to_string()));
    }
    assert!(matches!(f.table.enter_game("stranger", now), Err(EngineError::PlayerNotOnTable(_))));
}

#[test]
fn session_plays_every_round_and_stays_zero_sum() {
    let f = fixture(3);
    let now = Instant::now();
    enter_all(&f.table, now);
    run_out(&f.table, now);

    assert_eq!(f.table.stage(), TableStage::Finished);
    assert_eq!(f.table.rounds_played(), 3);
    let rounds = f.observer.rounds.lock().unwrap().clone();
    assert_eq!(rounds.len(), 3);
    for (i, round) in rounds.iter().enumerate() {
        assert_eq!(round.round, i as u32 + 1);
        assert_eq!(round.deltas.iter().sum::<i64>(), 0);
    }
    assert_eq!(rounds[1].banker, rounds[0].next_banker.unwrap());

    let session = f.table.session_result().unwrap();
    assert_eq!(session.rounds_played, 3);
    assert_eq!(session.reason, "normal");
    assert_eq!(session.final_scores.values().sum::<i64>(), 0);
    assert_eq!(f.observer.sessions.lock().unwrap().len(), 1);
    for p in PLAYERS {
        assert_eq!(
            f.transport.event_types_for(p).last().map(String::as_str),
            Some("session_over")
        );
    }
}

#[test]
fn reentry_replays_the_round_between_markers() {
    let f = fixture(1);
    let now = Instant::now();
    enter_all(&f.table, now);
    f.table.net_state("p1", false, now).unwrap();
    f.transport.take();

    f.table.enter_game("p1", now).unwrap();
    let sent = f.transport.take();
    let mine: Vec<&str> = sent
        .iter()
        .filter(|(p, _)| p == "p1")
        .map(|(_, e)| e.event_type.as_str())
        .collect();
    let begin = mine.iter().position(|t| *t == "history_begin").unwrap();
    let end = mine.iter().position(|t| *t == "history_end").unwrap();
    assert!(begin < end);
    assert_eq!(mine[begin + 1], "round_begin");
    assert!(mine[begin..end].contains(&"deal"));
    // Prompts are not part of the replay.
    assert!(!mine[begin..end].contains(&"operates"));

    let others_saw_online = sent.iter().any(|(p, e)| {
        p == "p0" && e.event_type == "net_state" && e.payload["online"] == json!(true)
    });
    assert!(others_saw_online);
}

#[test]
fn one_refusal_cancels_a_dissolve_vote() {
    let f = fixture(2);
    let now = Instant::now();
    enter_all(&f.table, now);

    // A refusal with no vote open is only announced.
    f.table.dissolve("p1", false, now).unwrap();
    let announced: Vec<String> = f
        .transport
        .take()
        .into_iter()
        .filter(|(p, _)| p == "p3")
        .map(|(_, e)| e.event_type)
        .collect();
    assert!(announced.contains(&"dissolve".to_string()));
    assert!(announced.contains(&"dissolve_result".to_string()));
    assert_eq!(f.table.stage(), TableStage::Playing);

    let prompts_before = f.table.with_round(|r| r.pending_prompts()).unwrap();
    let balances_before = f.table.with_round(|r| r.balances().to_vec()).unwrap();
    f.table.dissolve("p0", true, now).unwrap();
    assert!(f.transport.event_types_for("p3").contains(&"dissolve".to_string()));
    f.table.dissolve("p2", false, now).unwrap();
    assert_eq!(f.table.stage(), TableStage::Playing);
    assert_eq!(f.table.with_round(|r| r.pending_prompts()).unwrap(), prompts_before);
    assert_eq!(f.table.with_round(|r| r.balances().to_vec()).unwrap(), balances_before);
    assert_eq!(f.table.balances(), vec![0; 4]);
    assert_eq!(f.table.rounds_played(), 0);
    let result = f
        .transport
        .take()
        .into_iter()
        .find(|(p, e)| p == "p1" && e.event_type == "dissolve_result")
        .map(|(_, e)| e.payload["dissolved"].clone());
    assert_eq!(result, Some(json!(false)));

    for p in PLAYERS {
        f.table.dissolve(p, true, now).unwrap();
    }
    assert_eq!(f.table.stage(), TableStage::Finished);
    let session = f.table.session_result().unwrap();
    assert_eq!(session.reason, "dissolved");
    assert_eq!(session.rounds_played, 1);
    let rounds = f.observer.rounds.lock().unwrap();
    assert_eq!(rounds.last().map(|r| r.reason), Some(RoundEndReason::Dissolved));
}

#[test]
fn unanswered_dissolve_vote_expires_into_dissolution() {
    let f = fixture(4);
    let now = Instant::now();
    enter_all(&f.table, now);
    f.table.dissolve("p3", true, now).unwrap();
    f.table.tick(now + Duration::from_secs(301));
    assert_eq!(f.table.stage(), TableStage::Finished);
    assert_eq!(f.table.session_result().map(|s| s.reason), Some("dissolved".to_string()));
}

#[test]
fn casual_tables_wait_for_ready() {
    let mut conf = VariantRegistry::with_builtin().get("classic").unwrap().default_rules();
    conf.require_ready = true;
    let f = fixture_with("classic", Some(conf), TableConfig::default());
    let now = Instant::now();
    enter_all(&f.table, now);
    assert_eq!(f.table.stage(), TableStage::Waiting);
    for p in &PLAYERS[..3] {
        f.table.ready(p, now).unwrap();
    }
    assert_eq!(f.table.stage(), TableStage::Waiting);
    f.table.ready("p3", now).unwrap();
    assert_eq!(f.table.stage(), TableStage::Playing);
}

#[test]
fn actions_are_decoded_and_routed() {
    let f = fixture(1);
    let now = Instant::now();

    let early = Action::new(ACTION_GAME, "p0", json!({"type": "pass", "request_id": 1}));
    assert_eq!(f.table.handle_action(&early, now), Err(EngineError::RoundNotStarted));

    for p in PLAYERS {
        f.table
            .handle_action(&Action::new(ACTION_ENTER_GAME, p, json!({})), now)
            .unwrap();
    }
    assert_eq!(f.table.stage(), TableStage::Playing);

    let garbled = Action::new(ACTION_GAME, "p0", json!({"type": "shout"}));
    assert!(matches!(f.table.handle_action(&garbled, now), Err(EngineError::BadPayload(_))));
    let unknown = Action::new("teleport", "p0", json!({}));
    assert!(matches!(f.table.handle_action(&unknown, now), Err(EngineError::BadPayload(_))));

    // Answer the live prompt through the JSON surface.
    let (seat, request_id) = f
        .table
        .with_round(|r| {
            let p = r.pending_prompts().remove(0);
            (p.seat, p.request_id)
        })
        .unwrap();
    let discard = Action::new(
        ACTION_GAME,
        PLAYERS[seat],
        json!({"type": "discard", "request_id": request_id}),
    );
    f.table.handle_action(&discard, now).unwrap();
    assert_eq!(
        f.table.handle_action(&discard, now),
        Err(EngineError::NotYourTurn { seat })
    );

    let refuse = Action::new(ACTION_DISSOLVE, "p1", json!({"agree": false}));
    f.table.handle_action(&refuse, now).unwrap();
    assert_eq!(f.table.stage(), TableStage::Playing);
}

#[test]
fn rule_profiles_load_from_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[profiles.quick_dragon]
variant = "red_dragon"
wildcards = "1d"
can_chow = false
self_timeout_secs = 3
claim_timeout_secs = 2
score_base = 2
"#
    )
    .unwrap();
    let catalog = load_rules(file.path()).unwrap();
    let conf = catalog.get("quick_dragon").unwrap().clone();
    assert_eq!(conf.variant, "red_dragon");
    assert!(!conf.can_chow);
    assert_eq!(conf.hand_count, 13);
    assert_eq!(conf.score_base, 2);

    let config = TableConfig {
        round_count: 2,
        seed: Some(9),
        ..TableConfig::default()
    };
    let f = fixture_with("red_dragon", Some(conf), config);
    let now = Instant::now();
    enter_all(&f.table, now);
    run_out(&f.table, now);
    assert_eq!(f.table.rounds_played(), 2);
    assert_eq!(f.table.balances().iter().sum::<i64>(), 0);
    for round in f.observer.rounds.lock().unwrap().iter() {
        assert!(round.deltas.iter().all(|d| d % 2 == 0));
    }
}

#[test]
fn broken_rule_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[profiles.bad]\nhand_count = 14").unwrap();
    assert!(load_rules(file.path()).is_err());
}

#[tokio::test]
async fn bot_table_finishes_a_session_on_its_own() {
    let variant = VariantRegistry::with_builtin().get("classic").unwrap();
    let mut conf = variant.default_rules();
    conf.self_timeout_secs = 1;
    conf.claim_timeout_secs = 1;
    let (tx, mut rx) = mpsc::channel(1);

    struct Notify(mpsc::Sender<SessionResult>);
    impl SessionObserver for Notify {
        fn on_session_over(&self, _table_id: &str, result: &SessionResult) {
            let _ = self.0.try_send(result.clone());
        }
    }

    let ctx = TableContext {
        variant,
        conf,
        config: TableConfig {
            round_count: 2,
            next_round_delay_secs: 0,
            seed: Some(5),
            ..TableConfig::default()
        },
        transport: Arc::new(CollectingTransport::new()),
        observer: Arc::new(Notify(tx)),
    };
    let players = vec![
        Player::bot("b0", "greedy", 0),
        Player::bot("b1", "random", 0),
        Player::bot("b2", "greedy", 0),
        Player::bot("b3", "no-such-bot", 0),
    ];
    let registry = Arc::new(TableRegistry::new());
    let table = Arc::new(Table::new("bots", ctx, players).unwrap());
    registry.insert(table.clone());
    table.attach_bots(Instant::now());
    let ticker = registry.clone().spawn_ticker(Duration::from_millis(10));

    let result = tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("session did not finish")
        .unwrap();
    ticker.abort();
    assert_eq!(result.rounds_played, 2);
    assert_eq!(result.final_scores.len(), 4);
    assert_eq!(result.final_scores.values().sum::<i64>(), 0);
}
