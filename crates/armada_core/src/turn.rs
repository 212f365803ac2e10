//! The per-turn decision context and the top-level `decide` entry point.
//!
//! A [`Turn`] wraps one immutable [`Board`] with everything the tactic
//! passes accumulate while deciding: assigned yard actions, guard ships,
//! the ore reserve, and the cached risk tables and garrison projections.
//! Passes run in a fixed order and communicate only through this context;
//! a yard with an action assigned is skipped by later passes unless the
//! action is an explicitly replaceable marker.

use std::collections::HashMap;

use crate::board::{Board, PlayerId, Shipyard, ShipyardAction, YardProjection, YardRef};
use crate::grid::Point;
use crate::intent::Session;
use crate::risk::{self, RiskTable};
use crate::tactics;

/// Mutable decision state layered over one board snapshot.
pub struct Turn<'a> {
    /// The snapshot being decided.
    pub board: &'a Board,
    /// The deciding player.
    pub me: PlayerId,
    /// Wall-clock overage budget left, seconds. Large values enable the
    /// more expensive mining enumeration.
    pub remaining_time: f64,
    actions: HashMap<String, ShipyardAction>,
    guards: HashMap<String, u32>,
    ore_reserve: f64,
    risk: RiskTable,
    opponent_risk: Option<RiskTable>,
    projections: HashMap<String, YardProjection>,
}

impl<'a> Turn<'a> {
    /// Build the context: risk tables for both perspectives and garrison
    /// projections for every yard on the board.
    #[must_use]
    pub fn new(board: &'a Board, me: PlayerId, remaining_time: f64) -> Self {
        let risk = RiskTable::build(board, me);
        let opponent_risk = board
            .opponents_of(me)
            .first()
            .map(|p| RiskTable::build(board, p.id));
        let mut projections = HashMap::new();
        for yard in board.all_yards() {
            projections.insert(yard.id().to_string(), board.project_yard(yard));
        }
        Self {
            board,
            me,
            remaining_time,
            actions: HashMap::new(),
            guards: HashMap::new(),
            ore_reserve: 0.0,
            risk,
            opponent_risk,
            projections,
        }
    }

    /// The action assigned to a yard so far, if any.
    #[must_use]
    pub fn action(&self, id: &str) -> Option<&ShipyardAction> {
        self.actions.get(id)
    }

    /// Whether a yard has any action assigned, replaceable or not.
    #[must_use]
    pub fn has_action(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Assign a yard's action, replacing any marker already there.
    pub fn set_action(&mut self, id: &str, action: ShipyardAction) {
        self.actions.insert(id.to_string(), action);
    }

    /// Ships pinned to a yard for defense this turn.
    #[must_use]
    pub fn guard(&self, id: &str) -> u32 {
        self.guards.get(id).copied().unwrap_or(0)
    }

    /// Pin `ships` of a yard's garrison; they are invisible to launches.
    pub fn set_guard(&mut self, id: &str, ships: u32) {
        self.guards.insert(id.to_string(), ships);
    }

    /// Docked ships a launch from this yard may take.
    #[must_use]
    pub fn available_ships(&self, sy: &Shipyard) -> u32 {
        sy.ships.saturating_sub(self.guard(&sy.id))
    }

    /// Ore already committed to spawn orders this turn.
    fn committed_spawn_cost(&self) -> f64 {
        let spawned: u32 = self
            .actions
            .values()
            .map(|a| match a {
                ShipyardAction::Spawn(n) => *n,
                _ => 0,
            })
            .sum();
        f64::from(spawned) * self.board.config.spawn_cost
    }

    /// Bank minus the reserve and the cost of spawns already ordered.
    #[must_use]
    pub fn available_ore(&self) -> f64 {
        let bank = self.board.player(self.me).map_or(0.0, |p| p.ore);
        bank - self.ore_reserve - self.committed_spawn_cost()
    }

    /// Set ore aside; later spawns cannot touch it.
    pub fn reserve_ore(&mut self, amount: f64) {
        self.ore_reserve += amount;
    }

    /// The ore currently reserved.
    #[must_use]
    pub fn ore_reserve(&self) -> f64 {
        self.ore_reserve
    }

    /// Spawn as many ships as the yard and the remaining ore allow. Marks
    /// the yard `Hold` when nothing can be spawned, so later passes leave
    /// it alone.
    pub fn spawn_or_hold(&mut self, sy: &Shipyard) -> u32 {
        let n = self.try_spawn(sy);
        if n == 0 {
            self.set_action(&sy.id, ShipyardAction::Hold);
        }
        n
    }

    /// Spawn as many ships as possible without marking the yard on failure.
    pub fn try_spawn(&mut self, sy: &Shipyard) -> u32 {
        let affordable = (self.available_ore() / self.board.config.spawn_cost).floor();
        let n = if affordable <= 0.0 {
            0
        } else {
            (affordable as u32).min(sy.max_spawn())
        };
        if n > 0 {
            self.set_action(&sy.id, ShipyardAction::Spawn(n));
        }
        n
    }

    /// Projected strength of a yard at `time`, guard ships excluded.
    ///
    /// Queries past the projection horizon return the final value with the
    /// guard still counted, matching how callers treat the far future as a
    /// steady state.
    #[must_use]
    pub fn power(&self, yard: YardRef<'_>, time: i64) -> i64 {
        if time < 0 {
            return 0;
        }
        let Some(proj) = self.projections.get(yard.id()) else {
            return 0;
        };
        match proj.ship_counts.get(time as usize) {
            Some(&count) => count - i64::from(self.guard(yard.id())),
            None => proj.ship_counts.last().copied().unwrap_or(0),
        }
    }

    /// First turn the yard's projected strength reaches `ships`, guard
    /// excluded; `10000` when it never does within the horizon.
    #[must_use]
    pub fn time_to_ships(&self, sy: &Shipyard, ships: i64) -> u32 {
        for t in 0..=i64::from(self.board.grid.size()) {
            if self.power(YardRef::Built(sy), t) >= ships {
                return t as u32;
            }
        }
        10_000
    }

    /// A yard's garrison projection, as computed at turn start.
    #[must_use]
    pub fn projection(&self, id: &str) -> Option<&YardProjection> {
        self.projections.get(id)
    }

    /// Enemy strike strength reachable at `p` by `time` (splash included).
    #[must_use]
    pub fn risk_at(&self, p: Point, time: i64) -> u32 {
        self.risk.risk_at(p, time)
    }

    /// The same question from the first opponent's point of view: how hard
    /// could *we* hit `p` by `time`.
    #[must_use]
    pub fn opponent_view_risk_at(&self, p: Point, time: i64) -> u32 {
        self.opponent_risk
            .as_ref()
            .map_or(0, |table| table.risk_at(p, time))
    }

    /// Risk/reward gate for committing `ships` from `sy` against `risk`.
    #[must_use]
    pub fn is_risk_worth(&self, risk: u32, ships: u32, sy: &Shipyard) -> bool {
        risk::is_risk_worth(
            risk,
            ships,
            self.board.step,
            self.board.ship_count(self.me),
            self.power(YardRef::Built(sy), 10),
        )
    }

    /// Own built yards with at least `min_available` free ships and no
    /// action assigned yet, in board order.
    #[must_use]
    pub fn open_yards(&self, min_available: u32) -> Vec<&'a Shipyard> {
        self.board
            .shipyards_of(self.me)
            .filter(|sy| self.available_ships(sy) >= min_available && !self.has_action(&sy.id))
            .collect()
    }

    /// Finish the turn and hand over the assigned actions.
    #[must_use]
    pub fn into_actions(self) -> HashMap<String, ShipyardAction> {
        self.actions
    }
}

/// Decide one turn: run every tactic pass in order and collect the yard
/// actions. Returns an empty map when the player is gone or unopposed.
#[must_use]
pub fn decide(
    board: &Board,
    me: PlayerId,
    session: &mut Session,
    remaining_time: f64,
) -> HashMap<String, ShipyardAction> {
    if board.player(me).is_none() {
        return HashMap::new();
    }
    if board.opponents_of(me).is_empty() {
        return HashMap::new();
    }

    session.observe(board, me);

    let mut turn = Turn::new(board, me, remaining_time);
    tactics::spawning::conservative_save_ore(&mut turn);
    tactics::defense::defend_shipyards(&mut turn, session);
    tactics::spawning::save_ore(&mut turn);
    tactics::offense::coordinate_shipyard_capture(&mut turn, session);
    tactics::offense::capture_shipyards(&mut turn);
    tactics::expansion::expand(&mut turn, session);
    tactics::offense::whittle_attack(&mut turn, session);
    tactics::interdiction::adjacent_attack(&mut turn);
    tactics::interdiction::direct_attack(&mut turn);
    tactics::spawning::greedy_spawn(&mut turn);
    tactics::mining::mine(&mut turn);
    tactics::spawning::spawn(&mut turn);
    turn.into_actions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, shipyard, uniform_ore_grid};

    #[test]
    fn test_spawn_accounting() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(3, 3), 5, 100),
                shipyard("b", 0, Point::new(15, 15), 5, 100),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        assert_eq!(turn.available_ore(), 500.0);

        let a = board.shipyard("a").unwrap();
        // Controlled for 100 turns: ladder allows 7 per turn.
        assert_eq!(turn.spawn_or_hold(a), 7);
        assert_eq!(turn.available_ore(), 430.0);

        turn.reserve_ore(425.0);
        let b = board.shipyard("b").unwrap();
        // 5 ore left is below the spawn cost.
        assert_eq!(turn.spawn_or_hold(b), 0);
        assert_eq!(turn.action("b"), Some(&ShipyardAction::Hold));
    }

    #[test]
    fn test_guard_reduces_availability_and_power() {
        let board = board_with(
            21,
            None,
            vec![shipyard("sy", 0, Point::new(3, 3), 30, 0)],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let sy = board.shipyard("sy").unwrap();
        assert_eq!(turn.available_ships(sy), 30);

        turn.set_guard("sy", 12);
        assert_eq!(turn.available_ships(sy), 18);
        assert_eq!(turn.power(YardRef::Built(sy), 0), 18);
    }

    #[test]
    fn test_decide_requires_opposition() {
        let board = board_with(
            21,
            None,
            vec![shipyard("sy", 0, Point::new(3, 3), 10, 0)],
            Vec::new(),
        );
        let mut session = Session::default();
        // Player 1 has no presence and player 0 no opponents.
        assert!(decide(&board, 1, &mut session, 60.0).is_empty());
        assert!(decide(&board, 0, &mut session, 60.0).is_empty());
    }

    #[test]
    fn test_decide_small_yard_spawns() {
        let board = board_with(
            21,
            Some(uniform_ore_grid(21, 50.0)),
            vec![
                shipyard("mine", 0, Point::new(3, 3), 3, 0),
                shipyard("theirs", 1, Point::new(13, 13), 3, 0),
            ],
            Vec::new(),
        );
        let mut session = Session::default();
        let actions = decide(&board, 0, &mut session, 60.0);
        // Too few ships to mine or attack with; the spawn pass takes over.
        assert_eq!(actions.get("mine"), Some(&ShipyardAction::Spawn(1)));
    }
}
