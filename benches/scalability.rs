//! Scalability benchmarks for the cellbrawl server
//!
//! Arena tick and update culling at increasing player counts, plus the fight
//! loop at increasing room counts.
//!
//! Run with: cargo bench --bench scalability

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cellbrawl_server::arena::game::{ArenaSettings, Game};
use cellbrawl_server::arena::spatial::{SpatialGrid, FOOD_GRID_CELL_SIZE};
use cellbrawl_server::arena::world::World;
use cellbrawl_server::fight::manager::FightManager;
use cellbrawl_server::net::aoi::{self, ViewBox, DEFAULT_VIEW_MARGIN};
use cellbrawl_server::net::arena_session::view_box;
use cellbrawl_server::net::protocol::{ArenaSnapshot, Viewport};
use cellbrawl_server::util::vec2::Vec2;
use rand::Rng;
use uuid::Uuid;

const VIEWPORT: Viewport = Viewport { width: 1920.0, height: 1080.0 };

/// Arena with `count` players steering toward random points, fully stocked with food
fn create_game_with_players(count: usize) -> (Game, Vec<Uuid>) {
    let mut game = Game::new(World::new(5000.0, 5000.0), ArenaSettings::default());
    let mut rng = rand::thread_rng();
    let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();

    for (i, &id) in ids.iter().enumerate() {
        game.add_player(id, format!("Player{}", i), None);
        let target = Vec2::new(rng.gen_range(0.0..5000.0), rng.gen_range(0.0..5000.0));
        let _ = game.move_player(id, target);
    }
    (game, ids)
}

/// Full arena tick (movement, merges, collisions, food) at various player counts
fn bench_arena_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_tick");
    group.sample_size(30);

    for count in [10, 50, 100, 250, 500] {
        let (mut game, _) = create_game_with_players(count);
        let mut now_ms = 0u64;

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("complete", count), &count, |b, _| {
            b.iter(|| {
                now_ms += 16;
                black_box(game.tick(now_ms));
            })
        });
    }
    group.finish();
}

/// Per-viewer culling of one shared snapshot, as the arena loop does each tick
fn bench_update_culling(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_culling");
    group.sample_size(30);

    for count in [10, 50, 100, 250] {
        let (game, ids) = create_game_with_players(count);
        let views: Vec<ViewBox> = ids
            .iter()
            .filter_map(|&id| view_box(&game, id, VIEWPORT, DEFAULT_VIEW_MARGIN))
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("all_viewers", count), &count, |b, _| {
            b.iter(|| {
                let full = ArenaSnapshot::from_game(&game);
                for view in &views {
                    black_box(aoi::cull(&full, view));
                }
            })
        });
    }
    group.finish();
}

/// Food grid rebuild plus one query per cell
fn bench_food_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("food_grid");
    group.sample_size(50);

    for food in [500, 1000, 3000, 6000] {
        let mut rng = rand::thread_rng();
        let positions: Vec<Vec2> = (0..food)
            .map(|_| Vec2::new(rng.gen_range(0.0..5000.0), rng.gen_range(0.0..5000.0)))
            .collect();
        let probes: Vec<Vec2> = (0..200)
            .map(|_| Vec2::new(rng.gen_range(0.0..5000.0), rng.gen_range(0.0..5000.0)))
            .collect();

        group.throughput(Throughput::Elements(food as u64));
        group.bench_with_input(BenchmarkId::new("build_and_query", food), &food, |b, _| {
            let mut grid = SpatialGrid::new(FOOD_GRID_CELL_SIZE);
            b.iter(|| {
                grid.clear();
                for (i, &p) in positions.iter().enumerate() {
                    grid.insert(i, p);
                }
                let hits: usize = probes.iter().map(|&p| grid.query(p, 40.0).count()).sum();
                black_box(hits)
            })
        });
    }
    group.finish();
}

/// Fight loop tick with `rooms` live matches
fn bench_fight_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("fight_tick");
    group.sample_size(50);

    for rooms in [10, 100, 500] {
        let mut manager = FightManager::default();
        for i in 0..rooms * 2 {
            manager.join_queue(Uuid::new_v4(), format!("F{}", i), None, 0);
        }
        let mut now_ms = 0u64;

        group.throughput(Throughput::Elements(rooms as u64));
        group.bench_with_input(BenchmarkId::new("rooms", rooms), &rooms, |b, _| {
            b.iter(|| {
                now_ms += 16;
                black_box(manager.tick(now_ms, 16));
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_arena_tick,
    bench_update_culling,
    bench_food_grid,
    bench_fight_tick,
);

criterion_main!(benches);
