use std::collections::{BTreeMap, HashSet};
use std::hint::black_box;
use std::time::Instant;

use vantage_common::{ConnectionId, ConnectionSnapshot, EntityId, EntitySnapshot, Position};
use vantage_interest::{
    CellCoord, InterestConfig, InterestHost, InterestManager, SpatialGrid,
};

struct BenchWorld {
    connections: Vec<ConnectionSnapshot>,
    entities: BTreeMap<EntityId, EntitySnapshot>,
}

impl BenchWorld {
    fn new(connection_count: usize, entity_count: usize, spacing: f32) -> Self {
        let connections = lattice(connection_count, spacing * 4.0)
            .enumerate()
            .map(|(i, pos)| ConnectionSnapshot::joined(ConnectionId(i as u64), pos))
            .collect();
        let entities = lattice(entity_count, spacing)
            .map(|pos| {
                let id = EntityId::new();
                (
                    id,
                    EntitySnapshot {
                        id,
                        position: Some(pos),
                        owner: None,
                    },
                )
            })
            .collect();
        Self {
            connections,
            entities,
        }
    }
}

impl InterestHost for BenchWorld {
    fn live_connections(&self) -> impl Iterator<Item = ConnectionSnapshot> + '_ {
        self.connections.iter().copied()
    }

    fn entities_needing_observers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(&id).copied()
    }
}

fn lattice(count: usize, spacing: f32) -> impl Iterator<Item = Position> {
    let side = (count as f32).sqrt().ceil() as usize;
    (0..count).map(move |i| {
        let x = (i % side) as f32 * spacing;
        let y = (i / side) as f32 * spacing;
        Position::new(x, y, 0.0)
    })
}

fn bench_grid_refresh(connection_count: usize, iterations: usize) {
    let world = BenchWorld::new(connection_count, 0, 4.0);
    let mut manager = InterestManager::new(InterestConfig::default()).unwrap();

    let start = Instant::now();
    for _ in 0..iterations {
        black_box(manager.refresh_grid(black_box(&world)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  grid refresh ({connection_count} connections, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_neighbour_query(value_count: usize, iterations: usize) {
    let mut grid = SpatialGrid::new();
    let side = (value_count as f32).sqrt().ceil() as i32;
    for i in 0..value_count as i32 {
        grid.insert(CellCoord::new(i % side / 4, i / side / 4), i);
    }

    let mut into = HashSet::with_capacity(256);
    let center = CellCoord::new(side / 8, side / 8);
    let start = Instant::now();
    for _ in 0..iterations {
        into.clear();
        grid.query_with_neighbors(black_box(center), &mut into);
        black_box(into.len());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  neighbour query ({value_count} values, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_full_pass(connection_count: usize, entity_count: usize, budget: usize) {
    let world = BenchWorld::new(connection_count, entity_count, 4.0);
    let mut manager = InterestManager::new(InterestConfig {
        entities_per_quantum: budget,
        ..InterestConfig::default()
    })
    .unwrap();

    let mut observed = 0usize;
    let mut sink = |_: EntityId, set: &HashSet<ConnectionId>| observed += set.len();

    let start = Instant::now();
    let mut ticks = 0;
    let mut worst = std::time::Duration::ZERO;
    loop {
        ticks += 1;
        let stats = manager.tick(black_box(&world), &mut sink);
        worst = worst.max(stats.tick_time);
        if stats.pass_finished_this_tick {
            break;
        }
    }
    let elapsed = start.elapsed();
    println!(
        "  full pass ({connection_count} connections, {entity_count} entities, budget {budget}): {ticks} ticks, worst tick {worst:?}, total {elapsed:?}, {observed} pairs"
    );
}

fn main() {
    println!("=== Interest Management Benchmarks ===\n");

    println!("Grid refresh:");
    bench_grid_refresh(100, 1000);
    bench_grid_refresh(1000, 100);
    bench_grid_refresh(10000, 10);

    println!("\nNeighbour query:");
    bench_neighbour_query(1000, 10000);
    bench_neighbour_query(10000, 10000);

    println!("\nBudgeted rebuild pass:");
    bench_full_pass(100, 1000, 300);
    bench_full_pass(100, 10000, 300);
    bench_full_pass(1000, 10000, 1000);

    println!("\n=== Done ===");
}
