//! A simple deterministic strategy for smoke tests and as a safety net.
//!
//! Each yard follows a fixed ladder: found a new yard when the bank is deep
//! and the yard is mature, otherwise send a 21-ship box sweep, otherwise
//! spawn, otherwise nudge out a 2-ship scout. Where the classic version of
//! this strategy rolled dice, the step number and yard order stand in, so
//! runs are reproducible.

use std::collections::HashMap;

use armada_core::board::{Board, PlayerId, ShipyardAction};
use armada_core::grid::Direction;
use armada_core::plan::Plan;
use armada_core::route::Route;

const DIRS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

/// A stand-in for a die roll in `3..=9`, derived from turn and yard order.
fn gap(step: u32, salt: u32) -> u16 {
    (3 + (step.wrapping_mul(31).wrapping_add(salt * 7) % 7)) as u16
}

fn dir(index: u32) -> Direction {
    DIRS[(index % 4) as usize]
}

/// Decide one turn with the fixed ladder.
#[must_use]
pub fn decide_fallback(board: &Board, me: PlayerId) -> HashMap<String, ShipyardAction> {
    let spawn_cost = board.config.spawn_cost;
    let convert_cost = board.config.convert_cost;
    let mut bank = board.player(me).map_or(0.0, |p| p.ore);

    let mut actions = HashMap::new();
    for (idx, sy) in board.shipyards_of(me).enumerate() {
        let salt = idx as u32;
        let start = board.step.wrapping_add(salt);
        let max_spawn = sy.max_spawn();

        let action = if bank > 1000.0 && max_spawn > 5 {
            if sy.ships >= convert_cost + 10 {
                // Two legs out, then convert.
                let mut plan = Plan::new();
                plan.push(dir(start), gap(board.step, salt) + 1);
                plan.push(dir(start + 1), gap(board.step, salt + 1) + 1);
                let plan = plan.with_convert();
                Some(ShipyardAction::Launch {
                    ships: (convert_cost + 10).max(sy.ships / 2),
                    route: Route::new(&board.grid, sy.pos, plan, 0),
                })
            } else if bank >= spawn_cost {
                Some(spawn_max(bank, spawn_cost, max_spawn))
            } else {
                None
            }
        } else if sy.ships >= 21 {
            // Three sides of a box; the last leg stays digit-free so the
            // plan fits the 7-character cap of a 21-ship fleet, and the
            // fleet cruises the final side home.
            let g1 = gap(board.step, salt);
            let g2 = gap(board.step, salt + 1);
            let mut plan = Plan::new();
            plan.push(dir(start), g1 + 1);
            plan.push(dir(start + 1), g2 + 1);
            plan.push(dir(start + 2), g1 + 1);
            plan.push(dir(start + 3), 1);
            Some(ShipyardAction::Launch {
                ships: 21,
                route: Route::new(&board.grid, sy.pos, plan, 0),
            })
        } else if bank > spawn_cost * f64::from(max_spawn) {
            Some(spawn_max(bank, spawn_cost, max_spawn))
        } else if sy.ships >= 2 {
            let mut plan = Plan::new();
            plan.push(dir(start), 1);
            Some(ShipyardAction::Launch {
                ships: 2,
                route: Route::new(&board.grid, sy.pos, plan, 0),
            })
        } else {
            None
        };

        if let Some(action) = action {
            if let ShipyardAction::Spawn(n) = action {
                bank -= spawn_cost * f64::from(n);
            }
            actions.insert(sy.id.clone(), action);
        }
    }
    actions
}

fn spawn_max(bank: f64, spawn_cost: f64, max_spawn: u32) -> ShipyardAction {
    let affordable = (bank / spawn_cost).floor() as u32;
    ShipyardAction::Spawn(max_spawn.min(affordable))
}
