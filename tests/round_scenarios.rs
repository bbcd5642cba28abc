//! Scripted rounds: fixed deals driven request by request through `Round`.
//!
//! Run with:
//!     cargo test --test round_scenarios

use std::sync::Arc;
use std::time::{Duration, Instant};

use mahjong_game_engine::engine::errors::EngineError;
use mahjong_game_engine::engine::models::RoundEndReason;
use mahjong_game_engine::engine::plugin::MahjongVariant;
use mahjong_game_engine::engine::rules::PlayConf;
use mahjong_game_engine::games::classic::fans;
use mahjong_game_engine::games::classic::ClassicVariant;
use mahjong_game_engine::games::mahjong::dealer::PresetDeal;
use mahjong_game_engine::games::mahjong::messages::{MjEvent, MjRequest};
use mahjong_game_engine::games::mahjong::operates::Operate;
use mahjong_game_engine::games::mahjong::play_data::Meld;
use mahjong_game_engine::games::mahjong::scoring::ScoreReason;
use mahjong_game_engine::games::mahjong::tiles::{parse_tile, Tile};
use mahjong_game_engine::games::mahjong::{Phase, Prompt, Round, RoundSettings};

// Seat 0 deals. Seat 2 holds a pair of 1w, seat 3 waits on 1w alone.
const BANKER_WITH_1W: &str = "258m258p258s3w4w2d1w";
const QUIET_SEAT_1: &str = "147m147p147s2w4w2d3d";
const PAIR_OF_1W: &str = "1w1w369m58p69s3w4w1d1d";
const WAITS_ON_1W: &str = "123p456p789p111s1w";

fn t(text: &str) -> Tile {
    parse_tile(text).unwrap()
}

fn classic_conf() -> PlayConf {
    ClassicVariant.default_rules()
}

fn preset_round(conf: PlayConf, hands: &[&str], wall_front: &str) -> Round {
    let variant: Arc<dyn MahjongVariant> = Arc::new(ClassicVariant);
    let mut settings = RoundSettings::new(4, 0, 17);
    settings.preset = Some(PresetDeal {
        hands: hands.iter().map(|h| h.to_string()).collect(),
        wall_front: wall_front.to_string(),
    });
    let mut round = Round::new(conf, variant, settings).unwrap();
    round.start(Instant::now());
    round
}

fn prompt(round: &Round, seat: usize) -> Prompt {
    round
        .pending_prompts()
        .into_iter()
        .find(|p| p.seat == seat)
        .unwrap_or_else(|| panic!("no prompt for seat {}", seat))
}

fn discard(round: &mut Round, seat: usize, tile: &str) {
    let p = prompt(round, seat);
    assert!(p.self_turn);
    round
        .on_player_msg(
            seat,
            MjRequest::Discard {
                request_id: p.request_id,
                tile: Some(t(tile)),
            },
            Instant::now(),
        )
        .unwrap();
}

fn pass_claims(round: &mut Round) {
    for p in round.pending_prompts() {
        if !p.self_turn {
            round
                .on_player_msg(p.seat, MjRequest::Pass { request_id: p.request_id }, Instant::now())
                .unwrap();
        }
    }
}

fn assert_conserved(round: &Round) {
    assert_eq!(round.play().tiles_in_play(), round.play().wall_total());
}

#[test]
fn banker_self_drawn_win_on_first_draw() {
    let mut round = preset_round(classic_conf(), &["123m456m789m123p5p"], "5p");
    let p = prompt(&round, 0);
    assert!(p.operates.has(Operate::HU));
    assert!(!p.operates.must_hu);

    round
        .on_player_msg(0, MjRequest::Hu { request_id: p.request_id }, Instant::now())
        .unwrap();
    assert!(round.is_over());
    let result = round.result().unwrap();
    assert_eq!(result.reason, RoundEndReason::Win);
    assert_eq!(result.from, None);
    assert!(result.winners[0].fans.contains(&fans::SELF_DRAWN));
    assert!(result.winners[0].fans.contains(&fans::HEAVENLY_HAND));

    let paid = result.deltas[1];
    assert!(paid < 0);
    assert_eq!(result.deltas[2], paid);
    assert_eq!(result.deltas[3], paid);
    assert_eq!(result.deltas[0], -3 * paid);
    assert_eq!(result.next_banker, Some(0));
}

#[test]
fn win_outranks_pong_on_the_same_discard() {
    let mut round = preset_round(
        classic_conf(),
        &[BANKER_WITH_1W, QUIET_SEAT_1, PAIR_OF_1W, WAITS_ON_1W],
        "9m",
    );
    discard(&mut round, 0, "1w");
    assert_eq!(round.phase(), Phase::AwaitClaims);
    let seats: Vec<usize> = round.pending_prompts().iter().map(|p| p.seat).collect();
    assert_eq!(seats, vec![2, 3]);

    let pon = prompt(&round, 2);
    assert!(pon.operates.has(Operate::PON));
    let hu = prompt(&round, 3);
    assert!(hu.operates.has(Operate::HU));

    // The pong alone cannot close the window while a win is still possible.
    round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitClaims);

    round
        .on_player_msg(3, MjRequest::Hu { request_id: hu.request_id }, Instant::now())
        .unwrap();
    let result = round.result().unwrap();
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].seat, 3);
    assert_eq!(result.from, Some(0));
    assert!(result.deltas[3] > 0);
    assert_eq!(result.deltas[0], -result.deltas[3]);
    assert_eq!(result.deltas[1], 0);
    assert_eq!(result.deltas[2], 0);
    assert!(round.play().seat_data(2).melds.is_empty());
    assert_conserved(&round);
}

#[test]
fn win_outranks_pong_and_chow_from_three_seats() {
    let mut round = preset_round(
        classic_conf(),
        &[
            "369m258p1379s4w1d5s",
            "258m147p2468s1w2w3d",
            "147m258p369p55s2w3w",
            "123m456m789m111p5s",
        ],
        "9m",
    );
    discard(&mut round, 0, "5s");
    let seats: Vec<usize> = round.pending_prompts().iter().map(|p| p.seat).collect();
    assert_eq!(seats, vec![1, 2, 3]);

    let chow = prompt(&round, 1);
    assert!(chow.operates.has(Operate::CHOW));
    assert!(chow.operates.chow_lefts.contains(&t("4s")));
    let pon = prompt(&round, 2);
    assert!(pon.operates.has(Operate::PON));
    let hu = prompt(&round, 3);
    assert!(hu.operates.has(Operate::HU));

    round
        .on_player_msg(
            1,
            MjRequest::Chow {
                request_id: chow.request_id,
                left: t("4s"),
            },
            Instant::now(),
        )
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitClaims);
    round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitClaims);
    round
        .on_player_msg(3, MjRequest::Hu { request_id: hu.request_id }, Instant::now())
        .unwrap();

    let result = round.result().unwrap();
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].seat, 3);
    assert_eq!(result.from, Some(0));
    assert_eq!(result.deltas[1], 0);
    assert_eq!(result.deltas[2], 0);
    assert!(round.play().seat_data(1).melds.is_empty());
    assert!(round.play().seat_data(2).melds.is_empty());
    assert_conserved(&round);
}

#[test]
fn pong_applies_when_the_winner_passes() {
    let mut round = preset_round(
        classic_conf(),
        &[BANKER_WITH_1W, QUIET_SEAT_1, PAIR_OF_1W, WAITS_ON_1W],
        "9m",
    );
    discard(&mut round, 0, "1w");
    let hu = prompt(&round, 3);
    let pon = prompt(&round, 2);
    round
        .on_player_msg(3, MjRequest::Pass { request_id: hu.request_id }, Instant::now())
        .unwrap();
    round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap();

    assert_eq!(round.phase(), Phase::SelfAction);
    let next = round.pending_prompts();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].seat, 2);
    assert!(next[0].operates.has(Operate::DISCARD));
    assert_eq!(
        round.play().seat_data(2).melds,
        vec![Meld::Pon { tile: t("1w"), from: 0 }]
    );
    assert!(round.play().seat_data(0).discards.is_empty());
    assert_conserved(&round);

    let events = round.drain_events();
    assert!(events
        .iter()
        .any(|o| matches!(o.event, MjEvent::Pon { seat: 2, from: 0, .. })));
}

#[test]
fn two_seats_win_on_one_discard() {
    let mut round = preset_round(
        classic_conf(),
        &[BANKER_WITH_1W, QUIET_SEAT_1, "123m456m789m111p1w", "123s456s789s999p1w"],
        "9m",
    );
    discard(&mut round, 0, "1w");
    let third = prompt(&round, 3);
    let second = prompt(&round, 2);
    assert!(third.operates.has(Operate::HU));
    assert!(second.operates.has(Operate::HU));

    round
        .on_player_msg(3, MjRequest::Hu { request_id: third.request_id }, Instant::now())
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitClaims);
    round
        .on_player_msg(2, MjRequest::Hu { request_id: second.request_id }, Instant::now())
        .unwrap();

    let result = round.result().unwrap();
    let winners: Vec<usize> = result.winners.iter().map(|w| w.seat).collect();
    assert_eq!(winners, vec![2, 3]);
    assert!(result.deltas[2] > 0 && result.deltas[3] > 0);
    assert_eq!(result.deltas[0], -(result.deltas[2] + result.deltas[3]));
    assert_eq!(result.deltas[1], 0);
    // Several winners: the discarder deals next.
    assert_eq!(result.next_banker, Some(0));
}

#[test]
fn robbed_kong_is_reverted_and_refunded() {
    let mut round = preset_round(
        classic_conf(),
        &[
            "258m258p258s3w4w2d4m",
            "369m147p147s2w4w2d3d",
            "44m111p789p23s1d1d3d",
            "234p567p567s99s23m",
        ],
        "9m1w1w1w4m",
    );

    // Seat 3 could win on the 4m but lets seat 2 pong it.
    discard(&mut round, 0, "4m");
    let hu = prompt(&round, 3);
    assert!(hu.operates.has(Operate::HU));
    let pon = prompt(&round, 2);
    round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap();
    round
        .on_player_msg(3, MjRequest::Pass { request_id: hu.request_id }, Instant::now())
        .unwrap();

    discard(&mut round, 2, "3d");
    pass_claims(&mut round);
    discard(&mut round, 3, "1w");
    pass_claims(&mut round);
    discard(&mut round, 0, "1w");
    pass_claims(&mut round);
    discard(&mut round, 1, "1w");
    pass_claims(&mut round);

    let kon = prompt(&round, 2);
    assert!(kon.operates.kon_tiles.contains(&t("4m")));
    round
        .on_player_msg(
            2,
            MjRequest::Kon {
                request_id: kon.request_id,
                tile: Some(t("4m")),
            },
            Instant::now(),
        )
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitRobKong);
    assert_eq!(round.balances(), &[-1, -1, 3, -1]);

    let rob = prompt(&round, 3);
    assert!(rob.operates.has(Operate::HU));
    round
        .on_player_msg(3, MjRequest::Hu { request_id: rob.request_id }, Instant::now())
        .unwrap();

    let result = round.result().unwrap();
    assert_eq!(result.winners[0].seat, 3);
    assert!(result.winners[0].fans.contains(&fans::ROBBING_KONG));
    assert_eq!(result.from, Some(2));
    assert_eq!(result.deltas[0], 0);
    assert_eq!(result.deltas[1], 0);
    assert_eq!(result.deltas[2], -result.deltas[3]);
    assert_eq!(
        round.play().seat_data(2).melds,
        vec![Meld::Pon { tile: t("4m"), from: 0 }]
    );
    assert_conserved(&round);

    let refunded = round.drain_events().into_iter().any(|o| {
        matches!(
            o.event,
            MjEvent::ScoreChange {
                reason: ScoreReason::TuiKon,
                ..
            }
        )
    });
    assert!(refunded);
}

#[test]
fn forced_win_robs_a_kong_below_the_fan_floor() {
    let mut conf = classic_conf();
    conf.must_hu = true;
    conf.min_multiple = 100;
    let mut round = preset_round(
        conf,
        &[
            "258m258p258s3w4w2d4m",
            "369m147p147s2w4w2d3d",
            "44m111p789p23s1d1d3d",
            "234p567p567s99s2m4w",
        ],
        "9m3m1w1w4m",
    );

    discard(&mut round, 0, "4m");
    let seats: Vec<usize> = round.pending_prompts().iter().map(|p| p.seat).collect();
    assert_eq!(seats, vec![2]);
    let pon = prompt(&round, 2);
    round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap();

    discard(&mut round, 2, "3d");
    pass_claims(&mut round);
    // Seat 3 draws 3m and now waits on 1m and 4m.
    discard(&mut round, 3, "4w");
    pass_claims(&mut round);
    discard(&mut round, 0, "1w");
    pass_claims(&mut round);
    discard(&mut round, 1, "1w");
    pass_claims(&mut round);

    let kon = prompt(&round, 2);
    assert!(kon.operates.kon_tiles.contains(&t("4m")));
    round
        .on_player_msg(
            2,
            MjRequest::Kon {
                request_id: kon.request_id,
                tile: Some(t("4m")),
            },
            Instant::now(),
        )
        .unwrap();
    assert_eq!(round.phase(), Phase::AwaitRobKong);

    let rob = prompt(&round, 3);
    assert!(rob.operates.has(Operate::HU));
    assert!(rob.operates.must_hu);
    let err = round
        .on_player_msg(3, MjRequest::Pass { request_id: rob.request_id }, Instant::now())
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalAction { seat: 3, .. }));

    round
        .on_player_msg(3, MjRequest::Hu { request_id: rob.request_id }, Instant::now())
        .unwrap();
    let result = round.result().unwrap();
    assert_eq!(result.winners[0].seat, 3);
    assert!(result.winners[0].fans.contains(&fans::ROBBING_KONG));
    assert_eq!(result.from, Some(2));
    assert_conserved(&round);
}

#[test]
fn flowers_are_set_aside_and_replaced() {
    let mut conf = classic_conf();
    conf.tile_set.bonus = true;
    let mut round = preset_round(
        conf,
        &["1f123m456m789m12p5s", QUIET_SEAT_1, PAIR_OF_1W, WAITS_ON_1W],
        "9p3p",
    );

    let seat = round.play().seat_data(0);
    assert_eq!(seat.flowers, vec![t("1f")]);
    assert_eq!(seat.hand.len(), 14);
    assert!(seat.hand.contains(&t("9p")));
    assert!(seat.hand.contains(&t("3p")));
    assert!(seat.hand.iter().all(|tile| !tile.is_bonus()));
    assert_conserved(&round);

    let flowers: Vec<(usize, Tile)> = round
        .drain_events()
        .into_iter()
        .filter_map(|o| match o.event {
            MjEvent::Flower { seat, tile } => Some((seat, tile)),
            _ => None,
        })
        .collect();
    assert!(flowers.contains(&(0, t("1f"))));
}

#[test]
fn forced_win_blocks_discard_and_times_out_into_a_win() {
    let mut conf = classic_conf();
    conf.must_hu = true;
    let mut round = preset_round(conf, &["123m456m789m123p5p"], "5p");
    let p = prompt(&round, 0);
    assert!(p.operates.must_hu);
    assert!(!p.operates.has(Operate::DISCARD));

    let err = round
        .on_player_msg(
            0,
            MjRequest::Discard {
                request_id: p.request_id,
                tile: None,
            },
            Instant::now(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalAction { seat: 0, .. }));

    round.on_tick(Instant::now() + Duration::from_secs(3600));
    assert!(round.is_over());
    assert_eq!(round.result().unwrap().winners[0].seat, 0);
}

#[test]
fn claim_timeout_stops_once_a_forced_win_closes_the_window() {
    let mut conf = classic_conf();
    conf.must_hu = true;
    let mut round = preset_round(
        conf,
        &[BANKER_WITH_1W, QUIET_SEAT_1, WAITS_ON_1W, PAIR_OF_1W],
        "9m",
    );
    discard(&mut round, 0, "1w");
    assert!(prompt(&round, 2).operates.must_hu);
    assert!(prompt(&round, 3).operates.has(Operate::PON));

    // Seat 2's forced win settles the window before seat 3's turn comes up.
    round.on_tick(Instant::now() + Duration::from_secs(3600));
    assert!(round.is_over());
    let result = round.result().unwrap();
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].seat, 2);
    assert_eq!(result.from, Some(0));
    assert!(round.play().seat_data(3).melds.is_empty());
    assert_conserved(&round);
}

#[test]
fn answered_prompt_cannot_be_answered_again() {
    let mut round = preset_round(
        classic_conf(),
        &[BANKER_WITH_1W, QUIET_SEAT_1, PAIR_OF_1W, WAITS_ON_1W],
        "9m",
    );
    discard(&mut round, 0, "1w");
    let pon = prompt(&round, 2);
    round
        .on_player_msg(2, MjRequest::Pass { request_id: pon.request_id }, Instant::now())
        .unwrap();
    let err = round
        .on_player_msg(2, MjRequest::Pon { request_id: pon.request_id }, Instant::now())
        .unwrap_err();
    assert!(matches!(err, EngineError::NotYourTurn { seat: 2 }));
    assert_eq!(round.phase(), Phase::AwaitClaims);
}
