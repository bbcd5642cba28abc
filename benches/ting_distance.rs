//! Criterion benchmarks for the hand-evaluation hot paths.
//!
//! Run with:
//!     cargo bench --bench ting_distance

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use mahjong_game_engine::engine::plugin::MahjongVariant;
use mahjong_game_engine::games::classic::ClassicVariant;
use mahjong_game_engine::games::mahjong::hu::{ting_distance, HandEvaluator, HandShape, SeatHand};
use mahjong_game_engine::games::mahjong::tiles::{parse_tiles, Tile};

const SHAPES: [HandShape; 2] = [HandShape::SevenPairs, HandShape::ThirteenOrphans];

/// (label, hand, wildcards)
const HANDS: [(&str, &str, &str); 5] = [
    ("ready", "123m456m789p11s23s", ""),
    ("scattered", "19m19p19s1234w12d5m", ""),
    ("pairs", "1122m3344p5566s7w", ""),
    ("one_wild", "123m456m78p11s23s1d", "1d"),
    ("many_wild", "13m47p29s1w1d1d1d2d35m", "1d"),
];

fn tiles(text: &str) -> Vec<Tile> {
    parse_tiles(text).unwrap_or_else(|e| panic!("bad fixture {}: {}", text, e))
}

fn bench_ting_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("ting_distance");
    for (label, hand, wild) in HANDS {
        let hand = tiles(hand);
        let wild = tiles(wild);
        group.bench_with_input(BenchmarkId::new("ting_distance", label), &hand, |b, h| {
            b.iter(|| ting_distance(h, &wild, &SHAPES));
        });
    }
    group.finish();
}

fn bench_check_call(c: &mut Criterion) {
    let variant = ClassicVariant;
    let conf = variant.default_rules();
    let playable = conf.tile_set.playable();
    let mut group = c.benchmark_group("check_call");
    for (label, hand, wild) in HANDS {
        // Full hands: add a loose honor so there is a discard to evaluate.
        let mut hand = tiles(hand);
        hand.extend(tiles("3w"));
        let wild = tiles(wild);
        let evaluator = HandEvaluator {
            variant: &variant,
            conf: &conf,
            wildcards: &wild,
            playable: &playable,
            shapes: &SHAPES,
        };
        group.bench_with_input(BenchmarkId::new("check_call", label), &hand, |b, h| {
            b.iter(|| {
                evaluator.check_call(SeatHand {
                    seat: 0,
                    tiles: h,
                    melds: &[],
                    flowers: 0,
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ting_distance, bench_check_call);
criterion_main!(benches);
