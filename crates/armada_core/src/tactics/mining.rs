//! Mining: the default employment for every yard no other pass claimed.
//!
//! Each free yard enumerates harvest loops out to a distance bound, prices
//! them by expected ore per turn in flight and risk, and launches the best
//! one it can field. When the bank could be spent faster by spawning, the
//! pass sizes fleets down to the route minimum and penalizes loops that
//! would leave the yard idle.

use tracing::{debug, info};

use crate::board::{Shipyard, ShipyardAction, YardRef};
use crate::route::MiningRoute;
use crate::search::find_mining_routes;
use crate::turn::Turn;

/// A priced candidate loop.
struct Candidate {
    route: MiningRoute,
    score: f64,
    ships: u32,
    risk: u32,
}

/// Send every free yard's spare ships on the most profitable harvest loop.
pub fn mine(turn: &mut Turn<'_>) {
    let board = turn.board;
    let me = turn.me;

    let my_ships = board.ship_count(me);
    let bank = board.player(me).map_or(0.0, |p| p.ore);
    if my_ships < 21 && bank > board.config.spawn_cost {
        return;
    }

    let op_ships = board
        .opponents_of(me)
        .iter()
        .map(|p| board.ship_count(p.id))
        .max()
        .unwrap_or(0);
    let safety = my_ships < 2 * op_ships;

    let yard_count = board.yards_of(me).count();
    let max_distance: u16 = match yard_count {
        n if n < 10 => 15,
        n if n < 20 => 12,
        _ => 8,
    };
    let max_distance = max_distance.min((board.steps_left() / 2) as u16);

    let capacity = board.production_capacity(me);
    let deplete_turns = if capacity > 0 {
        bank / (board.config.spawn_cost * f64::from(capacity))
    } else {
        500.0
    };
    // With this much banked, every idle yard turn is a lost spawn.
    let deplete_fast = deplete_turns < 5.0;
    let use_second_points = yard_count < 10 && turn.remaining_time > 30.0;

    let yards: Vec<&Shipyard> = board.shipyards_of(me).collect();
    for &sy in &yards {
        let sy_max_distance = match turn.action(&sy.id) {
            None => max_distance,
            Some(ShipyardAction::AllowMine { max_distance, .. }) => *max_distance,
            Some(_) => continue,
        };
        let free_ships = turn.available_ships(sy);
        if free_ships <= 2 {
            continue;
        }

        let routes = find_mining_routes(board, sy, safety, sy_max_distance, use_second_points, |n| {
            turn.time_to_ships(sy, i64::from(n))
        });

        let mut candidates: Vec<Candidate> = Vec::new();
        for route in routes {
            let wait = i64::from(route.time_to_ready);
            let risk = route
                .route
                .points()
                .iter()
                .enumerate()
                .map(|(t, &p)| turn.risk_at(p, t as i64 + 1 + wait))
                .max()
                .unwrap_or(0);

            let min_fleet = route.route.plan().min_fleet_size();
            let mut ships = if deplete_fast { min_fleet } else { free_ships };
            // Long sweeps must not drain the yard or the fleet pool.
            if min_fleet > 21
                && (f64::from(ships) > 0.2 * f64::from(my_ships)
                    || f64::from(ships) > 0.5 * turn.power(YardRef::Built(sy), 10) as f64)
            {
                continue;
            }
            if !turn.is_risk_worth(risk, ships, sy) {
                ships = free_ships.min(risk + 1);
                if board.step < 100 || !turn.is_risk_worth(risk, ships, sy) {
                    continue;
                }
            }

            let score = score_route(turn, sy, &route, ships, deplete_turns, my_ships);
            if score < 0.0 {
                continue;
            }
            candidates.push(Candidate {
                route,
                score,
                ships,
                risk,
            });
        }
        if candidates.is_empty() {
            continue;
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.ships.cmp(&a.ships))
                .then(b.risk.cmp(&a.risk))
        });

        let idx = choose_route(turn, sy, free_ships, &candidates);
        let chosen = candidates.swap_remove(idx);
        if chosen.route.can_execute() {
            info!(
                yard = %sy.id,
                plan = %chosen.route.route.plan(),
                score = chosen.score,
                risk = chosen.risk,
                ships = chosen.ships,
                "mining launch"
            );
            turn.set_action(
                &sy.id,
                ShipyardAction::Launch {
                    ships: chosen.ships,
                    route: chosen.route.route,
                },
            );
        } else {
            debug!(
                yard = %sy.id,
                plan = %chosen.route.route.plan(),
                wait = chosen.route.time_to_ready,
                "garrison too small, waiting for the best loop"
            );
        }
    }
}

/// Expected ore per effective turn, with two hard zeros: trivial two-cell
/// hops while the bank begs for spawns, and scraps when the fleet is small.
fn score_route(
    turn: &Turn<'_>,
    sy: &Shipyard,
    route: &MiningRoute,
    ships: u32,
    deplete_turns: f64,
    my_ships: u32,
) -> f64 {
    let length = route.effective_len();
    if deplete_turns > 1.0 && length == 2 {
        return 0.0;
    }
    let expected = route.route.expected_ore(turn.board, ships);
    if my_ships < 50 && expected < 10.0 {
        return 0.0;
    }
    let idle_penalty = if deplete_turns < 5.0 {
        let idle = turn
            .projection(&sy.id)
            .map_or(0, |p| p.idle_before(i64::from(length)));
        f64::from(idle) / 4.0
    } else {
        0.0
    };
    expected / f64::from(length) - idle_penalty
}

/// Index of the route to act on. The top route wins when it can launch
/// now; otherwise prefer the best route small enough to slip out without
/// eating into the garrison the top route is waiting for.
fn choose_route(turn: &Turn<'_>, sy: &Shipyard, free_ships: u32, candidates: &[Candidate]) -> usize {
    let best = &candidates[0];
    if best.route.can_execute() {
        return 0;
    }
    let reserved_power =
        turn.power(YardRef::Built(sy), i64::from(best.route.time_to_ready)) - i64::from(best.ships);
    let cap = i64::from(free_ships).min(reserved_power);
    candidates
        .iter()
        .position(|c| i64::from(c.ships) <= cap)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, shipyard, uniform_ore_grid};
    use crate::grid::Point;

    #[test]
    fn test_small_fleet_spawns_instead_of_mining() {
        let board = board_with(
            21,
            Some(uniform_ore_grid(21, 50.0)),
            vec![
                shipyard("a", 0, Point::new(5, 5), 5, 10),
                shipyard("e", 1, Point::new(18, 18), 20, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        mine(&mut turn);
        // Below the minimum force and rich enough to spawn: leave the yard
        // for the spawn pass.
        assert!(turn.action("a").is_none());
    }

    #[test]
    fn test_mining_launch_loops_home() {
        let board = board_with(
            21,
            Some(uniform_ore_grid(21, 50.0)),
            vec![
                shipyard("a", 0, Point::new(5, 5), 30, 10),
                shipyard("e", 1, Point::new(18, 18), 20, 10),
            ],
            Vec::new(),
        );
        // Short on wall clock, so the cheaper single-via enumeration runs.
        let mut turn = Turn::new(&board, 0, 10.0);
        mine(&mut turn);
        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                // No spawn pressure: the whole garrison goes.
                assert_eq!(*ships, 30);
                assert_eq!(route.start(), Point::new(5, 5));
                assert_eq!(route.end(), Point::new(5, 5));
                let sy = board.shipyard("a").unwrap();
                assert!(route.expected_ore(&board, turn.available_ships(sy)) > 0.0);
            }
            other => panic!("expected a mining launch, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_distance_marker_blocks_mining() {
        let board = board_with(
            21,
            Some(uniform_ore_grid(21, 50.0)),
            vec![
                shipyard("a", 0, Point::new(5, 5), 30, 10),
                shipyard("e", 1, Point::new(18, 18), 20, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 10.0);
        let marker = ShipyardAction::AllowMine {
            max_distance: 0,
            target: Point::new(5, 5),
            max_time: 30,
        };
        turn.set_action("a", marker.clone());
        mine(&mut turn);
        // No loops exist within distance zero; the marker stays in place.
        assert_eq!(turn.action("a"), Some(&marker));
    }

    #[test]
    fn test_claimed_yards_are_skipped() {
        let board = board_with(
            21,
            Some(uniform_ore_grid(21, 50.0)),
            vec![
                shipyard("a", 0, Point::new(5, 5), 30, 10),
                shipyard("e", 1, Point::new(18, 18), 20, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 10.0);
        turn.set_action("a", ShipyardAction::Spawn(3));
        mine(&mut turn);
        assert_eq!(turn.action("a"), Some(&ShipyardAction::Spawn(3)));
    }
}
