//! Keeping shipyards: guards, defensive spawns and reinforcement runs.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::board::{Board, PlayerId, ShipyardAction};
use crate::grid::Point;
use crate::intent::Session;
use crate::search::{find_shortcut_routes, RouteQuery};
use crate::turn::Turn;

/// Worst cumulative ship balance at `pos` over the projection window:
/// scheduled allied arrivals add, hostile arrivals subtract, the garrison
/// itself is not counted. Negative when reinforcements alone cannot absorb
/// the incoming strikes.
fn ship_deficit(board: &Board, me: PlayerId, pos: Point) -> i64 {
    let mut reinforcements: HashMap<u32, i64> = HashMap::new();
    for f in board.incoming_allied_fleets(me, pos) {
        *reinforcements.entry(f.eta()).or_insert(0) += i64::from(f.ships);
    }
    for f in board.incoming_hostile_fleets(me, pos) {
        *reinforcements.entry(f.eta()).or_insert(0) -= i64::from(f.ships);
    }

    let mut balance = 0i64;
    let mut deficit = i64::MAX;
    for t in 0..=u32::from(board.grid.size()) {
        balance += reinforcements.get(&t).copied().unwrap_or(0);
        deficit = deficit.min(balance);
    }
    deficit
}

fn hostile_eta(board: &Board, me: PlayerId, pos: Point) -> Option<u32> {
    board
        .incoming_hostile_fleets(me, pos)
        .map(crate::board::Fleet::eta)
        .min()
}

/// Hold every yard under attack: guard what can be held, spawn at what
/// cannot, and route reinforcements from neighbors that arrive in time.
pub fn defend_shipyards(turn: &mut Turn<'_>, session: &mut Session) {
    let board = turn.board;
    let me = turn.me;

    // (position, id, ships needed)
    let mut need_help: Vec<(Point, String, i64)> = Vec::new();

    let yards: Vec<_> = board.shipyards_of(me).collect();
    for sy in &yards {
        if turn.has_action(&sy.id) {
            continue;
        }
        let Some(eta) = hostile_eta(board, me, sy.pos) else {
            continue;
        };

        let deficit = ship_deficit(board, me, sy.pos);
        if deficit >= 0 {
            let guard = sy.ships.min((deficit as f64 * 1.1) as u32);
            turn.set_guard(&sy.id, guard);
            info!(yard = %sy.id, "under attack but incoming cover holds");
            continue;
        }

        let spawned = turn.spawn_or_hold(sy);
        info!(yard = %sy.id, spawned, "spawning against an incoming strike");

        let immediate: i64 = board
            .incoming_hostile_fleets(me, sy.pos)
            .filter(|f| f.eta() == 1)
            .map(|f| i64::from(f.ships))
            .sum();
        let no_relief = board.incoming_allied_fleets(me, sy.pos).next().is_none();
        if eta == 1 && no_relief && immediate > i64::from(sy.ships) + i64::from(spawned) {
            info!(yard = %sy.id, "yard is falling, freezing the garrison");
            turn.set_action(&sy.id, ShipyardAction::EmergencyHold);
            continue;
        }

        if !matches!(turn.action(&sy.id), Some(ShipyardAction::Spawn(_))) {
            turn.set_action(
                &sy.id,
                ShipyardAction::AllowMine {
                    max_distance: (eta / 2) as u16,
                    target: sy.pos,
                    max_time: 30,
                },
            );
        }
        need_help.push((sy.pos, sy.id.clone(), -deficit));
    }

    for pending in board.pending_of(me) {
        if hostile_eta(board, me, pending.pos).is_none() {
            continue;
        }
        let deficit = ship_deficit(board, me, pending.pos);
        if deficit < 0 {
            need_help.push((pending.pos, pending.id.clone(), -deficit));
        }
    }

    let all_yard_count = board.yards_of(me).count();
    for (help_pos, help_id, _needed) in need_help {
        let Some(eta) = hostile_eta(board, me, help_pos) else {
            continue;
        };

        let mut helpers: Vec<_> = board.shipyards_of(me).collect();
        helpers.sort_by_key(|sy| board.grid.distance(sy.pos, help_pos));

        for sy in helpers {
            if sy.id == help_id || turn.has_action(&sy.id) || turn.available_ships(sy) == 0 {
                continue;
            }
            let distance = board.grid.distance(sy.pos, help_pos);
            if distance + 1 < eta {
                let spawned = turn.spawn_or_hold(sy);
                info!(yard = %sy.id, spawned, "holding reinforcements until they matter");
                if !matches!(turn.action(&sy.id), Some(ShipyardAction::Spawn(_))) {
                    turn.set_action(
                        &sy.id,
                        ShipyardAction::AllowMine {
                            max_distance: (eta / 2) as u16,
                            target: help_pos,
                            max_time: eta,
                        },
                    );
                }
            } else if distance + 1 == eta
                || (all_yard_count < 5 && session.self_built.contains(&help_pos))
            {
                if all_yard_count < 5 {
                    info!("few yards left, saving this one at all costs");
                }
                let routes = find_shortcut_routes(
                    board,
                    me,
                    sy.pos,
                    help_pos,
                    sy.ships,
                    &RouteQuery {
                        allow_join: true,
                        ..RouteQuery::default()
                    },
                );
                if routes.is_empty() {
                    warn!(from = ?sy.pos, to = ?help_pos, "no reinforcement route");
                    turn.spawn_or_hold(sy);
                    continue;
                }

                let ships = turn.available_ships(sy);
                // Arriving exactly with the strike, harvest on the way;
                // otherwise take the cleanest path home.
                let best = if distance + 1 == eta {
                    routes.into_iter().max_by(|a, b| {
                        a.expected_ore(board, ships).total_cmp(&b.expected_ore(board, ships))
                    })
                } else {
                    routes.into_iter().min_by(|a, b| {
                        a.expected_ore(board, ships).total_cmp(&b.expected_ore(board, ships))
                    })
                };
                if let Some(route) = best {
                    info!(from = ?sy.pos, to = ?help_pos, ships, "sending reinforcements");
                    turn.set_action(&sy.id, ShipyardAction::Launch { ships, route });
                }
            } else {
                info!(from = ?sy.pos, to = ?help_pos, "too far to reinforce in time");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, fleet, line_route, shipyard};
    use crate::grid::Direction;

    #[test]
    fn test_covered_yard_keeps_garrison_free() {
        let grid = crate::board::fixtures::empty_grid(21);
        let hostile = fleet(
            "h",
            1,
            Point::new(8, 5),
            10,
            0.0,
            line_route(&grid, Point::new(8, 5), Direction::West, 3),
        );
        let relief = fleet(
            "r",
            0,
            Point::new(3, 5),
            15,
            0.0,
            line_route(&grid, Point::new(3, 5), Direction::East, 2),
        );
        let board = board_with(
            21,
            None,
            vec![shipyard("a", 0, Point::new(5, 5), 30, 10)],
            vec![hostile, relief],
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut session = Session::default();
        defend_shipyards(&mut turn, &mut session);
        // Relief arrives before the strike: no action and no guard.
        assert!(turn.action("a").is_none());
        let a = board.shipyard("a").unwrap();
        assert_eq!(turn.available_ships(a), 30);
    }

    #[test]
    fn test_outmatched_yard_spawns_and_gets_reinforced() {
        let grid = crate::board::fixtures::empty_grid(21);
        let hostile = fleet(
            "h",
            1,
            Point::new(9, 5),
            40,
            0.0,
            line_route(&grid, Point::new(9, 5), Direction::West, 4),
        );
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(5, 5), 5, 0),
                shipyard("b", 0, Point::new(5, 8), 30, 10),
            ],
            vec![hostile],
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut session = Session::default();
        defend_shipyards(&mut turn, &mut session);

        // The attacked yard spawns what it can.
        assert_eq!(turn.action("a"), Some(&ShipyardAction::Spawn(1)));
        // The neighbor is exactly one turn ahead of the strike and launches.
        match turn.action("b") {
            Some(ShipyardAction::Launch { ships, route }) => {
                assert_eq!(*ships, 30);
                assert_eq!(route.end(), Point::new(5, 5));
                assert_eq!(route.len(), 3);
            }
            other => panic!("expected a reinforcement launch, got {other:?}"),
        }
    }

    #[test]
    fn test_doomed_yard_freezes() {
        let grid = crate::board::fixtures::empty_grid(21);
        let hostile = fleet(
            "h",
            1,
            Point::new(6, 5),
            40,
            0.0,
            line_route(&grid, Point::new(6, 5), Direction::West, 1),
        );
        let mut board = board_with(
            21,
            None,
            vec![shipyard("a", 0, Point::new(5, 5), 2, 0)],
            vec![hostile],
        );
        // No ore, so no defensive spawn is possible.
        board.players[0].ore = 0.0;
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut session = Session::default();
        defend_shipyards(&mut turn, &mut session);
        assert_eq!(turn.action("a"), Some(&ShipyardAction::EmergencyHold));
    }
}
