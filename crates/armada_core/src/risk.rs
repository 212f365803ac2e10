//! Threat estimation against enemy shipyard garrisons.
//!
//! A [`RiskTable`] answers "how many ships could the enemy bring to this
//! cell by turn `dt`": for every cell and every horizon turn it takes the
//! strongest projected garrison among enemy yards close enough to strike in
//! time. The pessimistic variant uses the full projection; the optimistic
//! one discounts each yard's current garrison, i.e. assumes ships already
//! docked stay home. Both come in a direct form and an adjacency-aware form
//! that also counts splash from a neighboring cell.
//!
//! Tables are built once per turn against a single opponent and queried all
//! over the mining, attack and expansion passes.

use crate::board::{Board, PlayerId, YardRef};
use crate::grid::Point;

/// How far ahead the risk tables project.
pub const RISK_HORIZON: u32 = 40;

/// Per-cell, per-turn enemy strike strength. Values are clamped at zero.
#[derive(Debug, Clone)]
pub struct RiskTable {
    size: u16,
    direct: Vec<Vec<u32>>,
    adjacent: Vec<Vec<u32>>,
    direct_optimistic: Vec<Vec<u32>>,
    adjacent_optimistic: Vec<Vec<u32>>,
}

impl RiskTable {
    /// Project every yard of `me`'s first opponent and tabulate reachable
    /// strength per cell and turn, up to [`RISK_HORIZON`].
    #[must_use]
    pub fn build(board: &Board, me: PlayerId) -> Self {
        let size = board.grid.size();
        let cells = (size as usize) * (size as usize);
        let horizon = RISK_HORIZON as usize + 1;

        let empty = vec![vec![0u32; horizon]; cells];
        let mut table = Self {
            size,
            direct: empty.clone(),
            adjacent: empty.clone(),
            direct_optimistic: empty.clone(),
            adjacent_optimistic: empty,
        };

        let Some(opponent) = board.opponents_of(me).first().map(|p| p.id) else {
            return table;
        };

        let yards: Vec<(Point, i64, crate::board::YardProjection)> = board
            .yards_of(opponent)
            .map(|yard| {
                (
                    yard.pos(),
                    i64::from(yard.ships(&board.config)),
                    board.project_yard(yard),
                )
            })
            .collect();

        for p in board.grid.points() {
            let cell = table.cell(p);
            for dt in 0..horizon {
                let mut direct = 0i64;
                let mut optimistic = 0i64;
                for (pos, garrison, proj) in &yards {
                    let lead = dt as i64 - i64::from(board.grid.distance(*pos, p));
                    let power = proj.power_at(lead);
                    direct = direct.max(power);
                    optimistic = optimistic.max(power - garrison);
                }
                table.direct[cell][dt] = direct.max(0) as u32;
                table.direct_optimistic[cell][dt] = optimistic.max(0) as u32;
            }
        }

        for p in board.grid.points() {
            let cell = table.cell(p);
            for dt in 0..horizon {
                let mut worst = 0;
                let mut worst_optimistic = 0;
                for adj in board.grid.adjacent(p) {
                    let adj_cell = table.cell(adj);
                    worst = worst.max(table.direct[adj_cell][dt]);
                    worst_optimistic = worst_optimistic.max(table.direct_optimistic[adj_cell][dt]);
                }
                table.adjacent[cell][dt] = worst;
                table.adjacent_optimistic[cell][dt] = worst_optimistic;
            }
        }

        table
    }

    fn cell(&self, p: Point) -> usize {
        (p.y as usize) * (self.size as usize) + (p.x as usize)
    }

    fn clamp_time(time: i64) -> Option<usize> {
        if time < 0 {
            return None;
        }
        Some(time.min(i64::from(RISK_HORIZON)) as usize)
    }

    /// Strike strength reachable at `p` by `time`, counting splash from
    /// adjacent cells. This is the default measure for route safety.
    #[must_use]
    pub fn risk_at(&self, p: Point, time: i64) -> u32 {
        Self::clamp_time(time).map_or(0, |t| self.adjacent[self.cell(p)][t])
    }

    /// Strike strength on the cell itself, without the splash margin.
    #[must_use]
    pub fn direct_risk_at(&self, p: Point, time: i64) -> u32 {
        Self::clamp_time(time).map_or(0, |t| self.direct[self.cell(p)][t])
    }

    /// Adjacency-aware risk assuming currently docked enemy ships stay home.
    #[must_use]
    pub fn optimistic_risk_at(&self, p: Point, time: i64) -> u32 {
        Self::clamp_time(time).map_or(0, |t| self.adjacent_optimistic[self.cell(p)][t])
    }

    /// Direct risk assuming currently docked enemy ships stay home.
    #[must_use]
    pub fn optimistic_direct_risk_at(&self, p: Point, time: i64) -> u32 {
        Self::clamp_time(time).map_or(0, |t| self.direct_optimistic[self.cell(p)][t])
    }
}

/// Whether committing `ships` against an exposure of `risk` is acceptable.
///
/// Outmatched launches are rejected outright early in the game or when the
/// fleet would be a large share of the player's strength; once established,
/// a launch fielding more than 75% of the threat may still go.
#[must_use]
pub fn is_risk_worth(risk: u32, ships: u32, step: u32, total_ships: u32, yard_power_10: i64) -> bool {
    if risk < ships {
        return true;
    }
    if step < 50
        || total_ships < 50
        || f64::from(ships) > 0.2 * f64::from(total_ships)
        || f64::from(ships) > 0.5 * yard_power_10 as f64
    {
        return false;
    }
    f64::from(ships) > f64::from(risk) * 0.75
}

/// Garrison an attack arriving at `target` after `time` turns must beat.
///
/// Simulates the defender's economy turn by turn: the target reinforces and
/// spawns first, then every other yard close enough to relay ships in time
/// contributes its garrison, arrivals and spawns, all paid from one shared
/// ore bank.
#[must_use]
pub fn attack_target_power(board: &Board, target: YardRef<'_>, time: u32) -> i64 {
    let owner = target.owner();
    let spawn_cost = board.config.spawn_cost;

    let mut income: std::collections::HashMap<u32, f64> = std::collections::HashMap::new();
    let mut reinforcements: std::collections::HashMap<Point, std::collections::HashMap<u32, i64>> =
        std::collections::HashMap::new();
    for yard in board.yards_of(owner) {
        let per_yard = reinforcements.entry(yard.pos()).or_default();
        for f in board.incoming_allied_fleets(owner, yard.pos()) {
            *income.entry(f.eta()).or_insert(0.0) += f.expected_ore(board);
            *per_yard.entry(f.eta()).or_insert(0) += i64::from(f.ships);
        }
        for f in board.incoming_hostile_fleets(owner, yard.pos()) {
            *per_yard.entry(f.eta()).or_insert(0) -= i64::from(f.ships);
        }
    }

    let arriving = |pos: Point, t: u32| -> i64 {
        reinforcements
            .get(&pos)
            .and_then(|m| m.get(&t))
            .copied()
            .unwrap_or(0)
    };
    let spawn_from = |ore: &mut f64, age: i64| -> i64 {
        let can = i64::from(crate::board::max_ships_to_spawn(age.max(0) as u32));
        let count = ((*ore / spawn_cost).floor() as i64).clamp(0, can);
        *ore -= count as f64 * spawn_cost;
        count
    };

    let mut ore = board.player(owner).map_or(0.0, |p| p.ore);
    let mut own_power = i64::from(target.ships(&board.config));
    let mut help_power = 0i64;

    for t in 0..time {
        ore += income.get(&t).copied().unwrap_or(0.0);
        own_power += arriving(target.pos(), t);
        own_power += spawn_from(&mut ore, target.turns_controlled() + i64::from(t));

        for yard in board.yards_of(owner) {
            if yard.id() == target.id() {
                continue;
            }
            if yard.time_to_build() > 0 && yard.time_to_build() < t {
                continue;
            }
            let help_time = board.grid.distance(yard.pos(), target.pos());
            if time - t < help_time {
                continue;
            }
            if t == 0 || (yard.time_to_build() > 0 && yard.time_to_build() == t) {
                help_power += i64::from(yard.ships(&board.config));
            }
            let spawned = spawn_from(&mut ore, yard.turns_controlled() + i64::from(t));
            help_power += arriving(yard.pos(), t);
            if time - t != help_time {
                help_power += spawned;
            }
        }
    }

    own_power + help_power
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures;
    use crate::board::{GameConfig, Player};
    use crate::grid::Point;

    fn board_with_opponent_yard(ships: u32, turns: u32) -> Board {
        fixtures::board_with(
            21,
            None,
            vec![fixtures::shipyard("op", 1, Point::new(10, 10), ships, turns)],
            Vec::new(),
        )
    }

    #[test]
    fn test_risk_respects_travel_time() {
        let board = board_with_opponent_yard(20, 100);
        let table = RiskTable::build(&board, 0);

        let p = Point::new(13, 10);
        assert_eq!(table.direct_risk_at(p, 2), 0);
        assert_eq!(table.direct_risk_at(p, 3), 20);
        // One enemy spawn cycle fits in the extra turn.
        assert!(table.direct_risk_at(p, 4) > 20);
    }

    #[test]
    fn test_adjacent_risk_dominates_direct() {
        let board = board_with_opponent_yard(20, 100);
        let table = RiskTable::build(&board, 0);
        for p in board.grid.points() {
            for dt in [0, 5, 10, 40] {
                assert!(table.risk_at(p, dt) >= table.direct_risk_at(p, dt));
            }
        }
    }

    #[test]
    fn test_risk_monotonic_in_time() {
        let board = board_with_opponent_yard(20, 100);
        let table = RiskTable::build(&board, 0);
        let p = Point::new(5, 5);
        let mut prev = 0;
        for dt in 0..=i64::from(RISK_HORIZON) {
            let risk = table.risk_at(p, dt);
            assert!(risk >= prev);
            prev = risk;
        }
        // Clamped outside the horizon.
        assert_eq!(table.risk_at(p, -1), 0);
        assert_eq!(table.risk_at(p, 1000), table.risk_at(p, 40));
    }

    #[test]
    fn test_optimistic_discounts_docked_ships() {
        let board = board_with_opponent_yard(20, 100);
        let table = RiskTable::build(&board, 0);
        let p = Point::new(13, 10);
        assert_eq!(table.optimistic_direct_risk_at(p, 3), 0);
        assert!(table.optimistic_direct_risk_at(p, 3) <= table.direct_risk_at(p, 3));
    }

    #[test]
    fn test_is_risk_worth_gate() {
        // Outmatching the threat is always fine.
        assert!(is_risk_worth(10, 20, 0, 30, 0));
        // Early game: never launch into superior strength.
        assert!(!is_risk_worth(20, 20, 10, 300, 100));
        // Established game: a near-match with a small share of the total
        // fleet may go.
        assert!(is_risk_worth(50, 45, 60, 300, 100));
        assert!(!is_risk_worth(50, 30, 60, 300, 100));
        // But not when it commits too much of the fleet.
        assert!(!is_risk_worth(50, 45, 60, 200, 100));
    }

    #[test]
    fn test_attack_target_power_counts_helpers_in_range() {
        let grid = fixtures::empty_grid(21);
        let target = fixtures::shipyard("t", 1, Point::new(10, 10), 10, 0);
        let helper = fixtures::shipyard("h", 1, Point::new(13, 10), 30, 0);
        let board = Board::new(
            GameConfig::default(),
            0,
            grid,
            vec![Player { id: 0, ore: 0.0 }, Player { id: 1, ore: 0.0 }],
            vec![target, helper],
            Vec::new(),
        );
        let target = YardRef::Built(board.shipyard("t").unwrap());

        // The helper is 3 away: with 4 turns it relays its garrison.
        assert_eq!(attack_target_power(&board, target, 4), 40);
        // With only 2 turns it cannot.
        assert_eq!(attack_target_power(&board, target, 2), 10);
    }
}
