//! Forecast and full-turn benchmarks for armada_core.
//!
//! Run with: `cargo bench -p armada_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use armada_core::board::fixtures::{board_with, fleet, line_route, shipyard, uniform_ore_grid};
use armada_core::board::{Board, Shipyard};
use armada_core::grid::{Direction, Point};
use armada_core::intent::Session;
use armada_core::turn::decide;

fn contested_midgame() -> (Vec<Shipyard>, Vec<armada_core::board::Fleet>) {
    let grid = uniform_ore_grid(21, 40.0);
    let shipyards = vec![
        shipyard("a", 0, Point::new(5, 5), 45, 80),
        shipyard("b", 0, Point::new(5, 12), 25, 40),
        shipyard("e1", 1, Point::new(16, 16), 35, 90),
        shipyard("e2", 1, Point::new(16, 8), 20, 30),
    ];
    let mut fleets = Vec::new();
    for i in 0u16..12 {
        let owner = usize::from(i % 2);
        let start = Point::new((i * 2) % 21, (i * 3 + 1) % 21);
        let dir = if i % 2 == 0 {
            Direction::East
        } else {
            Direction::South
        };
        fleets.push(fleet(
            &format!("f{i}"),
            owner,
            start,
            8 + u32::from(i),
            15.0,
            line_route(&grid, start, dir, 6),
        ));
    }
    (shipyards, fleets)
}

/// Board assembly, which runs the committed-route forecast once.
pub fn forecast_benchmark(c: &mut Criterion) {
    let (shipyards, fleets) = contested_midgame();
    c.bench_function("board_build_with_forecast", |b| {
        b.iter(|| {
            let board = board_with(
                21,
                Some(uniform_ore_grid(21, 40.0)),
                shipyards.clone(),
                fleets.clone(),
            );
            black_box(board.forecast.horizon(0))
        })
    });
}

/// One full decision turn over a contested midgame board.
pub fn decide_benchmark(c: &mut Criterion) {
    let (shipyards, fleets) = contested_midgame();
    let board: Board = board_with(21, Some(uniform_ore_grid(21, 40.0)), shipyards, fleets);
    c.bench_function("decide_turn", |b| {
        b.iter(|| {
            let mut session = Session::default();
            black_box(decide(&board, 0, &mut session, 60.0))
        })
    });
}

criterion_group!(benches, forecast_benchmark, decide_benchmark);
criterion_main!(benches);
