//! Fleet interdiction: hitting enemy fleets in flight, either head-on along
//! their committed route or by dropping a fleet next to a converging pair.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::board::{Board, Fleet, PlayerId, ShipyardAction, YardRef};
use crate::grid::Point;
use crate::plan::plans_through;
use crate::route::Route;
use crate::search::{
    closest_yards, find_shortcut_routes, is_intercept_direct_attack_route, RouteQuery,
};
use crate::turn::Turn;

/// Intercept valuable enemy fleets on their way home.
///
/// For each target, every yard tries to meet the fleet exactly on a route
/// cell (or one cell beside it for a splash kill), continuing to a friendly
/// yard afterwards. A yard that would be strong enough after a short wait
/// spawns instead; a splash-only option is applied at the end if the yard
/// is still free.
pub fn direct_attack(turn: &mut Turn<'_>) {
    const MAX_TIME_TO_WAIT: i64 = 5;
    let board = turn.board;
    let me = turn.me;
    let max_distance = board.steps_left().min(10);

    let mut targets: Vec<&Fleet> = Vec::new();
    for opp in board.opponents_of(me) {
        for yard in board.yards_of(opp.id) {
            for f in board.incoming_allied_fleets(opp.id, yard.pos()) {
                if f.expected_value(board) > 0.5 {
                    targets.push(f);
                }
            }
        }
    }
    if targets.is_empty() {
        return;
    }
    targets.sort_by(|a, b| b.expected_value(board).total_cmp(&a.expected_value(board)));

    let launchers = turn.open_yards(1);
    if launchers.is_empty() {
        return;
    }

    let mut point_to_home: HashMap<Point, Point> = HashMap::new();
    for p in board.grid.points() {
        if let Some(home) = closest_yards(board, me, p, false).friendly {
            point_to_home.insert(p, home.pos());
        }
    }
    let op_yard_points: HashSet<Point> = board
        .all_yards()
        .filter(|y| y.owner() != me)
        .map(|y| y.pos())
        .collect();

    let mut splash_attacks: Vec<(String, ShipyardAction, Point)> = Vec::new();
    for t in &targets {
        let min_ships = t.ships + 1;
        let mut attacked = false;
        let mut splash: Option<(String, ShipyardAction, Point)> = None;
        let mut wait_at: Option<(&crate::board::Shipyard, Point)> = None;
        let mut wait_time = MAX_TIME_TO_WAIT;

        let mut yards = launchers.clone();
        yards.sort_by_key(|sy| board.grid.distance(sy.pos, t.pos));
        'yards: for sy in yards {
            if turn.has_action(&sy.id)
                || turn.power(YardRef::Built(sy), MAX_TIME_TO_WAIT) < i64::from(min_ships)
            {
                continue;
            }
            let mut ships_to_launch = turn.available_ships(sy);

            for (idx, &route_point) in t.route.points().iter().enumerate() {
                let target_time = idx as u32 + 1;
                let mut target_point = route_point;
                if op_yard_points.contains(&target_point) {
                    continue;
                }
                if target_time > max_distance {
                    continue;
                }

                let time_diff = i64::from(target_time)
                    - i64::from(board.grid.distance(sy.pos, target_point));
                let is_splash = time_diff == 1;
                if time_diff != 0 && time_diff != 1 {
                    // Too early to intercept here, but a short wait at the
                    // yard lines the timing up.
                    if time_diff > 0
                        && time_diff < MAX_TIME_TO_WAIT
                        && time_diff < wait_time
                        && turn.power(YardRef::Built(sy), time_diff) >= i64::from(min_ships)
                    {
                        wait_at = Some((sy, target_point));
                        wait_time = time_diff;
                    }
                    continue;
                }

                if is_splash {
                    // One turn short: aim at a neighboring cell instead and
                    // let splash damage do the work.
                    for p in board.grid.adjacent(target_point) {
                        if board.grid.distance(sy.pos, p) == target_time {
                            target_point = p;
                            break;
                        }
                    }
                }

                if turn.available_ships(sy) < min_ships {
                    continue;
                }
                let Some(&home) = point_to_home.get(&target_point) else {
                    continue;
                };

                let mut scored: Vec<(f64, Route)> =
                    plans_through(&board.grid, sy.pos, &[target_point, home])
                        .into_iter()
                        .map(|plan| {
                            let route = Route::new(&board.grid, sy.pos, plan, 0);
                            (route.expected_ore(board, ships_to_launch), route)
                        })
                        .collect();
                scored.sort_by(|a, b| a.0.total_cmp(&b.0));

                for (_, route) in scored {
                    let all_points = route.points();
                    let checked = if all_points.len() > 2 {
                        &all_points[..all_points.len() - 2]
                    } else {
                        all_points
                    };
                    if ships_to_launch < route.plan().min_fleet_size() {
                        continue;
                    }
                    if checked.iter().any(|p| op_yard_points.contains(p)) {
                        continue;
                    }

                    let mut board_risk = 0u32;
                    for (ti, &p) in checked.iter().enumerate() {
                        let tt = ti as i64 + 1;
                        let mut risk = turn.risk_at(p, tt);
                        if tt >= i64::from(target_time) {
                            risk += t.ships;
                        }
                        board_risk = board_risk.max(risk);
                    }

                    ships_to_launch = (board_risk + 1).min(turn.available_ships(sy));
                    if !turn.is_risk_worth(board_risk, ships_to_launch, sy) {
                        continue;
                    }
                    if is_intercept_direct_attack_route(&route, board, me, &t.id) {
                        continue;
                    }

                    if is_splash {
                        splash = Some((
                            sy.id.clone(),
                            ShipyardAction::Launch {
                                ships: ships_to_launch,
                                route: route.clone(),
                            },
                            target_point,
                        ));
                    } else {
                        info!(from = ?sy.pos, at = ?target_point, time = target_time,
                            ships = ships_to_launch, "direct attack on a fleet");
                        turn.set_action(
                            &sy.id,
                            ShipyardAction::Launch {
                                ships: ships_to_launch,
                                route,
                            },
                        );
                        attacked = true;
                        break;
                    }
                }
                if attacked {
                    break 'yards;
                }
            }
        }

        if !attacked {
            if let Some((sy, point)) = wait_at {
                let spawned = turn.spawn_or_hold(sy);
                info!(yard = %sy.id, at = ?point, spawned, wait = wait_time,
                    "spawning to line up a direct attack");
            } else if let Some(attack) = splash {
                splash_attacks.push(attack);
            }
        }
    }

    for (id, action, point) in splash_attacks {
        if !turn.has_action(&id) {
            info!(yard = %id, at = ?point, "splash attack beside a fleet");
            turn.set_action(&id, action);
        }
    }
}

/// A cell where at least two enemy fleets will stand adjacent at `time`.
struct AdjacentTarget<'a> {
    point: Point,
    time: u32,
    fleets: Vec<&'a Fleet>,
}

/// Walk every committed route forward and collect the cells flanked by two
/// or more enemy fleets with no friendly fleet beside them. A fleet landing
/// on such a cell splashes them all.
fn find_adjacent_targets<'a>(
    board: &'a Board,
    me: PlayerId,
    max_distance: u32,
) -> Vec<AdjacentTarget<'a>> {
    if board.fleets.len() < 2 {
        return Vec::new();
    }
    let mut yard_points: HashSet<Point> = board.shipyards.iter().map(|sy| sy.pos).collect();

    let mut targets = Vec::new();
    let mut time = 0u32;
    while board.fleets.iter().any(|f| time <= f.eta()) && time <= max_distance {
        time += 1;

        for f in &board.fleets {
            if f.route.plan().converts() && time == f.eta() + 1 {
                yard_points.insert(f.route.end());
            }
        }

        let mut point_to_fleet: HashMap<Point, &Fleet> = HashMap::new();
        for f in &board.fleets {
            let Some(&p) = f.route.points().get(time as usize - 1) else {
                continue;
            };
            if !yard_points.contains(&p) {
                point_to_fleet.insert(p, f);
            }
        }

        for p in board.grid.points() {
            if point_to_fleet.contains_key(&p) || yard_points.contains(&p) {
                continue;
            }
            let flanking: Vec<&Fleet> = board
                .grid
                .adjacent(p)
                .into_iter()
                .filter_map(|x| point_to_fleet.get(&x).copied())
                .collect();
            if flanking.len() < 2 {
                continue;
            }
            if flanking.iter().any(|f| f.owner == me) {
                continue;
            }
            targets.push(AdjacentTarget {
                point: p,
                time,
                fleets: flanking,
            });
        }
    }
    targets
}

/// Drop a fleet onto a cell flanked by several enemy fleets so the splash
/// hits all of them at once.
pub fn adjacent_attack(turn: &mut Turn<'_>) {
    let board = turn.board;
    let max_distance = board.steps_left().min(10);

    let mut targets = find_adjacent_targets(board, turn.me, max_distance);
    if targets.is_empty() {
        return;
    }
    let launchers = turn.open_yards(1);
    if launchers.is_empty() {
        return;
    }
    targets.sort_by_key(|t| (Reverse(t.fleets.len()), t.time));

    let mut attacked_ids: HashSet<&str> = HashSet::new();
    for t in &targets {
        if t.fleets.iter().any(|f| attacked_ids.contains(f.id.as_str())) {
            continue;
        }

        for &sy in &launchers {
            if turn.has_action(&sy.id) {
                continue;
            }
            let distance = board.grid.distance(sy.pos, t.point);
            if distance > t.time {
                continue;
            }
            let weakest = t.fleets.iter().map(|f| f.ships).min().unwrap_or(0);
            let ships = turn.available_ships(sy).min(weakest);

            let routes = find_shortcut_routes(
                board,
                turn.me,
                sy.pos,
                t.point,
                ships,
                &RouteQuery {
                    route_distance: Some(t.time),
                    ..RouteQuery::default()
                },
            );
            let Some(route) = routes.into_iter().max_by(|a, b| {
                a.expected_ore(board, ships).total_cmp(&b.expected_ore(board, ships))
            }) else {
                continue;
            };

            info!(from = ?sy.pos, at = ?t.point, time = t.time, ships,
                fleets = t.fleets.len(), "adjacent attack");
            turn.set_action(&sy.id, ShipyardAction::Launch { ships, route });
            for f in &t.fleets {
                attacked_ids.insert(f.id.as_str());
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, fleet, line_route, shipyard};
    use crate::grid::Direction;

    #[test]
    fn test_direct_attack_meets_fleet_on_route() {
        let grid = crate::board::fixtures::empty_grid(21);
        // An enemy hauler with fat cargo heads home along y=5.
        let hauler = fleet(
            "h",
            1,
            Point::new(9, 5),
            10,
            200.0,
            line_route(&grid, Point::new(9, 5), Direction::East, 6),
        );
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(12, 2), 30, 100),
                shipyard("et", 1, Point::new(15, 5), 0, 100),
            ],
            vec![hauler],
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        direct_attack(&mut turn);

        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                // Sized to the board risk, not the full garrison.
                assert!(*ships >= 11);
                // Meets the hauler at (12, 5) on turn 3, then returns home.
                assert_eq!(route.points()[2], Point::new(12, 5));
                assert_eq!(route.end(), Point::new(12, 2));
            }
            other => panic!("expected an interception, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_attack_ignores_cheap_fleets() {
        let grid = crate::board::fixtures::empty_grid(21);
        let empty_hauler = fleet(
            "h",
            1,
            Point::new(9, 5),
            10,
            0.0,
            line_route(&grid, Point::new(9, 5), Direction::East, 6),
        );
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(12, 2), 30, 100),
                shipyard("et", 1, Point::new(15, 5), 0, 100),
            ],
            vec![empty_hauler],
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        direct_attack(&mut turn);
        assert!(turn.action("a").is_none());
    }

    #[test]
    fn test_adjacent_attack_splashes_converging_pair() {
        let grid = crate::board::fixtures::empty_grid(21);
        // Two enemy fleets run east in parallel, one row apart on each side
        // of y=5.
        let top = fleet(
            "f1",
            1,
            Point::new(0, 4),
            20,
            0.0,
            line_route(&grid, Point::new(0, 4), Direction::East, 8),
        );
        let bottom = fleet(
            "f2",
            1,
            Point::new(0, 6),
            25,
            0.0,
            line_route(&grid, Point::new(0, 6), Direction::East, 8),
        );
        let board = board_with(
            21,
            None,
            vec![shipyard("a", 0, Point::new(6, 5), 30, 100)],
            vec![top, bottom],
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        adjacent_attack(&mut turn);

        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                // Sized to the weaker fleet.
                assert_eq!(*ships, 20);
                // First reachable flanked cell: (3, 5) at t=3.
                assert_eq!(route.end(), Point::new(3, 5));
                assert_eq!(route.len(), 3);
            }
            other => panic!("expected a splash launch, got {other:?}"),
        }
    }
}
