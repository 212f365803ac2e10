//! Shipyard offense: outright captures, synchronized multi-yard strikes
//! and whittling raids that bleed a garrison without committing to a kill.

use std::cmp::Reverse;
use std::collections::HashMap;

use tracing::info;

use crate::board::{Shipyard, ShipyardAction, YardRef};
use crate::grid::Point;
use crate::intent::{CoordinatedStrike, Intent, LaunchOrder, Session};
use crate::risk::attack_target_power;
use crate::search::{find_shortcut_routes, RouteQuery};
use crate::turn::Turn;

/// How long launched raiders stay on cooldown before the next whittle raid.
const WHITTLE_COOLDOWN: u32 = 20;

/// An enemy yard considered for attack, with the summed distance from our
/// launch-capable yards used for target ordering.
struct StrikeTarget<'a> {
    yard: YardRef<'a>,
    dist_sum: u32,
}

impl StrikeTarget<'_> {
    fn pos(&self) -> Point {
        self.yard.pos()
    }

    /// Spawn capacity used for target priority; a yard still under
    /// construction starts at the bottom of the ladder.
    fn max_spawn(&self) -> u32 {
        match self.yard {
            YardRef::Built(sy) => sy.max_spawn(),
            YardRef::Pending(_) => 1,
        }
    }

    fn can_attack_from(&self, turn: &Turn<'_>, point: Point) -> bool {
        self.yard.reachable_from(&turn.board.grid, point)
    }
}

/// Enemy yards with no strike already inbound, ranked against `launchers`.
fn strike_targets<'a>(turn: &Turn<'a>, launchers: &[&Shipyard]) -> Vec<StrikeTarget<'a>> {
    let board = turn.board;
    let mut targets = Vec::new();
    for yard in board.all_yards() {
        if yard.owner() == turn.me {
            continue;
        }
        if board
            .incoming_hostile_fleets(yard.owner(), yard.pos())
            .next()
            .is_some()
        {
            continue;
        }
        let dist_sum = launchers
            .iter()
            .map(|sy| board.grid.distance(yard.pos(), sy.pos))
            .sum();
        targets.push(StrikeTarget { yard, dist_sum });
    }
    targets
}

fn max_opponent_ships(turn: &Turn<'_>) -> u32 {
    turn.board
        .opponents_of(turn.me)
        .iter()
        .map(|p| turn.board.ship_count(p.id))
        .max()
        .unwrap_or(0)
}

/// Single-yard shipyard captures: hit any enemy yard we can overpower from
/// one launch, or hold and spawn when a short buildup would get us there.
pub fn capture_shipyards(turn: &mut Turn<'_>) {
    const MAX_TIME_TO_WAIT: u32 = 10;
    let board = turn.board;
    let launchers = turn.open_yards(3);
    if launchers.is_empty() {
        return;
    }

    let mut targets = strike_targets(turn, &launchers);
    if targets.is_empty() {
        return;
    }
    targets.sort_by_key(|t| (Reverse(t.max_spawn()), t.dist_sum));

    let my_ships = board.ship_count(turn.me);
    let op_ships = max_opponent_ships(turn);
    let mut max_attack_distance = 10;
    if my_ships > 100 {
        if f64::from(my_ships) > f64::from(op_ships) * 1.5 {
            max_attack_distance = 15;
        }
        if f64::from(my_ships) > f64::from(op_ships) * 2.0 {
            max_attack_distance = 20;
        }
    }

    for t in &targets {
        let mut yards = launchers.clone();
        yards.sort_by_key(|sy| board.grid.distance(t.pos(), sy.pos));

        for sy in yards {
            if turn.has_action(&sy.id) {
                continue;
            }
            if !t.can_attack_from(turn, sy.pos) {
                continue;
            }
            let distance = board.grid.distance(sy.pos, t.pos());
            if distance > max_attack_distance {
                continue;
            }

            let power = attack_target_power(board, t.yard, distance);
            let available = turn.available_ships(sy);
            if i64::from(available) <= power {
                let my_power = turn.power(YardRef::Built(sy), i64::from(MAX_TIME_TO_WAIT));
                let op_power = attack_target_power(board, t.yard, distance + MAX_TIME_TO_WAIT);
                if my_power >= op_power {
                    turn.spawn_or_hold(sy);
                    info!(from = ?sy.pos, to = ?t.pos(), my_power, op_power,
                        "saving up to capture a shipyard");
                }
                continue;
            }

            let want = ((power as f64 * 1.2) as i64).max(21) as u32;
            let ships = available.min(want);
            let routes =
                find_shortcut_routes(board, turn.me, sy.pos, t.pos(), ships, &RouteQuery::default());
            if let Some(route) = routes.into_iter().max_by(|a, b| {
                a.expected_ore(board, ships).total_cmp(&b.expected_ore(board, ships))
            }) {
                info!(from = ?sy.pos, to = ?t.pos(), ships, power, "capturing a shipyard");
                turn.set_action(&sy.id, ShipyardAction::Launch { ships, route });
                break;
            }
            info!(from = ?sy.pos, to = ?t.pos(), "no capture route");
        }
    }
}

/// Multi-yard captures: synchronize launches from several yards so they
/// land on one enemy yard together. Runs any strike already in progress
/// first; a finished preparation phase forces the best available strike
/// even if it falls short on paper.
pub fn coordinate_shipyard_capture(turn: &mut Turn<'_>, session: &mut Session) {
    const SEND_FRACTION: f64 = 1.0;

    let mut was_prepping = false;
    let mut prepped_target: Option<Point> = None;
    match std::mem::take(&mut session.intent) {
        Intent::PrepareStrike(prep) => {
            prepped_target = prep.target;
            match prep.act(turn) {
                Intent::Idle => was_prepping = true,
                next => {
                    session.intent = next;
                    return;
                }
            }
        }
        Intent::CoordinatedStrike(strike) => {
            session.intent = strike.act(turn);
            return;
        }
        other @ Intent::Expansion(_) => {
            session.intent = other;
            return;
        }
        Intent::Idle => {}
    }

    let board = turn.board;
    let launchers = turn.open_yards(3);
    if launchers.is_empty() {
        return;
    }
    let mut targets = strike_targets(turn, &launchers);
    if targets.is_empty() {
        return;
    }
    targets.sort_by_key(|t| (Reverse(t.max_spawn()), t.dist_sum));

    let my_ships = board.ship_count(turn.me);
    let op_ships = max_opponent_ships(turn);
    let mut max_attack_distance = 10;
    let mut mult_factor = 1.0;
    if my_ships > 100 {
        if f64::from(my_ships) > f64::from(op_ships) * 1.5 {
            max_attack_distance = 15;
            mult_factor = 1.5;
        }
        if f64::from(my_ships) > f64::from(op_ships) * 2.0 {
            max_attack_distance = 20;
            mult_factor = 2.0;
        }
    }
    if was_prepping {
        max_attack_distance = max_attack_distance.max(20);
    }

    let mut best_launches: Option<HashMap<String, LaunchOrder>> = None;
    let mut best_diff: Option<i64> = None;
    let mut best_target: Option<Point> = None;
    let mut launched = false;

    'targets: for t in &targets {
        let mut yards: Vec<&Shipyard> = launchers
            .iter()
            .copied()
            .filter(|sy| board.grid.distance(sy.pos, t.pos()) <= max_attack_distance)
            .collect();
        yards.sort_by_key(|sy| board.grid.distance(t.pos(), sy.pos));

        for i in 2..=yards.len() {
            let max_sy_dist = board.grid.distance(yards[i - 1].pos, t.pos());

            let mut launches: HashMap<String, LaunchOrder> = HashMap::new();
            let mut total_power = 0i64;
            let mut used = 0usize;
            for &sy in &yards {
                if used >= i {
                    break;
                }
                let wait = i64::from(max_sy_dist) - i64::from(board.grid.distance(t.pos(), sy.pos));
                if wait < 0 {
                    continue;
                }
                if !board.can_launch_to_at_time(sy, t.pos(), wait as u32)
                    || !t.can_attack_from(turn, sy.pos)
                {
                    continue;
                }
                let power = (turn.power(YardRef::Built(sy), wait) as f64 * SEND_FRACTION).floor()
                    as i64;
                let routes = find_shortcut_routes(
                    board,
                    turn.me,
                    sy.pos,
                    t.pos(),
                    power.max(0) as u32,
                    &RouteQuery {
                        allow_join: true,
                        ..RouteQuery::default()
                    },
                );
                if routes.is_empty() {
                    continue;
                }
                total_power += power;
                launches.insert(sy.id.clone(), LaunchOrder { power, wait });
                used += 1;
            }
            if used != i {
                break;
            }

            let power_est = attack_target_power(board, t.yard, max_sy_dist);
            let ahead = f64::from(my_ships) > mult_factor * f64::from(op_ships);
            if total_power >= power_est
                || (ahead && total_power as f64 * mult_factor >= power_est as f64)
            {
                info!(target = ?t.pos(), total_power, power_est, "starting coordinated strike");
                let strike = CoordinatedStrike {
                    launches,
                    target: t.pos(),
                };
                session.intent = strike.act(turn);
                launched = true;
                break 'targets;
            }

            let diff = total_power - power_est;
            let better = diff > best_diff.unwrap_or(i64::MIN)
                && prepped_target.map_or(true, |p| p == t.pos());
            if best_diff.is_none() || better {
                best_diff = Some(diff);
                best_launches = Some(launches);
                best_target = Some(t.pos());
            }
        }
    }

    if !launched && was_prepping {
        if let (Some(launches), Some(target)) = (best_launches, best_target) {
            info!(?target, "preparation over, forcing the best available strike");
            let strike = CoordinatedStrike { launches, target };
            session.intent = strike.act(turn);
        }
    }
}

fn should_whittle_attack(turn: &Turn<'_>, session: &Session, min_overage: u32) -> bool {
    let board = turn.board;
    if let Some(last) = session.last_whittle {
        if board.step.saturating_sub(last) < WHITTLE_COOLDOWN {
            return false;
        }
    }

    let op_yard_positions: Vec<Point> = board
        .all_yards()
        .filter(|y| y.owner() != turn.me)
        .map(|y| y.pos())
        .collect();
    let attacking: u32 = board
        .fleets_of(turn.me)
        .filter(|f| op_yard_positions.contains(&f.route.end()))
        .map(|f| f.ships)
        .sum();
    let available = board.ship_count(turn.me).saturating_sub(attacking);
    available > 100 && available.saturating_sub(min_overage) > max_opponent_ships(turn)
}

/// Throw mid-size raids at enemy yards to drain their garrisons while we
/// hold a comfortable ship lead. One raid per target per pass, with a
/// cooldown between raiding turns.
pub fn whittle_attack(turn: &mut Turn<'_>, session: &mut Session) {
    const MAX_ATTACK_DISTANCE: u32 = 10;
    const MAX_TIME_TO_WAIT: i64 = 3;
    const WHITTLE_POWER: u32 = 50;

    if matches!(session.intent, Intent::CoordinatedStrike(_)) {
        return;
    }
    if !should_whittle_attack(turn, session, WHITTLE_POWER) {
        return;
    }

    let board = turn.board;
    let launchers = turn.open_yards(3);
    if launchers.is_empty() {
        return;
    }
    let mut targets = strike_targets(turn, &launchers);
    if targets.is_empty() {
        return;
    }
    targets.sort_by_key(|t| t.dist_sum);

    let mut attacked = false;
    for t in &targets {
        let mut yards = launchers.clone();
        yards.sort_by_key(|sy| {
            board.grid.distance(t.pos(), sy.pos) + turn.time_to_ships(sy, i64::from(WHITTLE_POWER))
        });

        for sy in yards {
            if turn.has_action(&sy.id) {
                continue;
            }
            if !t.can_attack_from(turn, sy.pos) {
                continue;
            }
            let distance = board.grid.distance(sy.pos, t.pos());
            if distance > MAX_ATTACK_DISTANCE {
                continue;
            }

            let available = turn.available_ships(sy);
            if available < WHITTLE_POWER {
                if turn.power(YardRef::Built(sy), MAX_TIME_TO_WAIT) >= i64::from(WHITTLE_POWER) {
                    turn.spawn_or_hold(sy);
                    info!(from = ?sy.pos, to = ?t.pos(), "saving up for a whittle raid");
                }
                continue;
            }

            let ships = available.min(WHITTLE_POWER.max(board.ship_count(turn.me) / 10));
            let routes = find_shortcut_routes(
                board,
                turn.me,
                sy.pos,
                t.pos(),
                ships,
                &RouteQuery {
                    max_route_distance: Some((distance + 4).min(MAX_ATTACK_DISTANCE)),
                    ..RouteQuery::default()
                },
            );
            // Take the leanest raid: the garrison is the point, not the ore.
            if let Some(route) = routes.into_iter().min_by(|a, b| {
                a.expected_ore(board, ships)
                    .total_cmp(&b.expected_ore(board, ships))
                    .then_with(|| a.len().cmp(&b.len()))
            }) {
                info!(from = ?sy.pos, to = ?t.pos(), ships, "whittle raid");
                turn.set_action(&sy.id, ShipyardAction::Launch { ships, route });
                attacked = true;
                break;
            }
            info!(from = ?sy.pos, to = ?t.pos(), "no whittle route");
        }

        if attacked {
            session.last_whittle = Some(board.step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, shipyard};

    #[test]
    fn test_capture_launches_against_weak_yard() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(0, 0), 100, 100),
                shipyard("t", 1, Point::new(5, 0), 5, 0),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        capture_shipyards(&mut turn);
        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                // 1.2x the defense estimate, floored at 21.
                assert_eq!(*ships, 21);
                assert_eq!(route.end(), Point::new(5, 0));
            }
            other => panic!("expected a capture launch, got {other:?}"),
        }
    }

    #[test]
    fn test_capture_ignores_distant_yards() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(0, 0), 50, 100),
                shipyard("t", 1, Point::new(10, 10), 5, 0),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        capture_shipyards(&mut turn);
        assert!(turn.action("a").is_none());
    }

    #[test]
    fn test_coordinated_strike_synchronizes_two_yards() {
        // Yard "a" is 5 cells from the target, "b" is 7: "b" must launch
        // immediately and "a" gets a two-turn wait so both arrive together.
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(0, 0), 60, 100),
                shipyard("b", 0, Point::new(0, 2), 40, 100),
                shipyard("t", 1, Point::new(5, 0), 5, 0),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut session = Session::default();
        coordinate_shipyard_capture(&mut turn, &mut session);

        match turn.action("b") {
            Some(ShipyardAction::Launch { ships, route }) => {
                assert_eq!(*ships, 40);
                assert_eq!(route.end(), Point::new(5, 0));
                assert_eq!(route.len(), 7);
            }
            other => panic!("expected the far yard to launch, got {other:?}"),
        }
        assert!(matches!(turn.action("a"), Some(ShipyardAction::Spawn(_))));
        match &session.intent {
            Intent::CoordinatedStrike(strike) => {
                assert!(!strike.involves("b"));
                // 7 - 5 = 2 turns of waiting; this turn's spawn consumed
                // the first, so one remains before the launch.
                let order = strike.launches.get("a").expect("near yard still committed");
                assert_eq!(order.wait, 1);
            }
            other => panic!("expected a strike in progress, got {other:?}"),
        }
    }

    #[test]
    fn test_whittle_raid_and_cooldown() {
        let mut board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(0, 0), 160, 100),
                shipyard("t", 1, Point::new(5, 0), 5, 0),
            ],
            Vec::new(),
        );
        board.step = 60;
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut session = Session::default();
        whittle_attack(&mut turn, &mut session);
        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, .. }) => assert_eq!(*ships, 50),
            other => panic!("expected a whittle raid, got {other:?}"),
        }
        assert_eq!(session.last_whittle, Some(60));

        // Same situation a few turns later: still cooling down.
        board.step = 70;
        let mut turn = Turn::new(&board, 0, 60.0);
        whittle_attack(&mut turn, &mut session);
        assert!(turn.action("a").is_none());
    }
}
