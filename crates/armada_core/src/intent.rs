//! Cross-turn intents and session memory.
//!
//! Everything that must survive from one turn to the next lives in a
//! [`Session`] owned by the caller and threaded through `decide`. Intents
//! reference shipyards by stable id and re-resolve them against each new
//! snapshot; a yard that vanished (captured, destroyed) is dropped from the
//! intent with a warning, never an error.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::board::{Board, PlayerId, ShipyardAction, YardRef};
use crate::grid::Point;
use crate::plan::plans_through;
use crate::route::Route;
use crate::search::{find_shortcut_routes, is_safety_route_to_convert, RouteQuery};
use crate::turn::Turn;

/// Turns a coordinated launch may slip past its scheduled time before the
/// yard is given up on.
const STRIKE_TIMEOUT: i64 = 5;

/// A multi-turn undertaking. `Idle` is the initial and terminal state;
/// every `act` consumes the current intent and returns its successor.
#[derive(Debug, Clone, Default)]
pub enum Intent {
    /// No commitment.
    #[default]
    Idle,
    /// Hold and spawn everywhere until enough force is simultaneously
    /// available, then fall back to the strike planner.
    PrepareStrike(PrepareStrike),
    /// Synchronized multi-yard launches against one target cell.
    CoordinatedStrike(CoordinatedStrike),
    /// One or more yards saving up to found new shipyards.
    Expansion(Expansion),
}

impl Intent {
    /// Whether no undertaking is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Intent::Idle)
    }
}

/// Force-gathering precursor to a coordinated strike.
#[derive(Debug, Clone)]
pub struct PrepareStrike {
    /// Turns left before giving up on gathering.
    pub countdown: i64,
    /// The cell the eventual strike should hit, when already chosen.
    pub target: Option<Point>,
    /// Fraction of total force that must be simultaneously available.
    pub fraction: f64,
}

impl PrepareStrike {
    /// Start gathering with the given patience.
    #[must_use]
    pub fn new(countdown: i64, target: Option<Point>) -> Self {
        Self {
            countdown,
            target,
            fraction: 0.5,
        }
    }

    /// Spawn everywhere until ready or out of patience.
    #[must_use]
    pub fn act(mut self, turn: &mut Turn<'_>) -> Intent {
        self.countdown -= 1;

        let total = turn.board.ship_count(turn.me);
        let ready: u32 = turn
            .board
            .shipyards_of(turn.me)
            .map(|sy| turn.available_ships(sy))
            .sum();
        let enough = f64::from(ready) >= f64::from(total) * self.fraction;

        if self.countdown <= 0 || enough {
            return Intent::Idle;
        }

        let yards: Vec<_> = turn.board.shipyards_of(turn.me).collect();
        for sy in yards {
            turn.spawn_or_hold(sy);
        }
        Intent::PrepareStrike(self)
    }
}

/// One yard's share of a coordinated strike.
#[derive(Debug, Clone, Copy)]
pub struct LaunchOrder {
    /// Force this yard committed at planning time.
    pub power: i64,
    /// Turns to wait so all launches arrive together. Goes negative while
    /// the yard keeps failing to find a route.
    pub wait: i64,
}

/// A committed multi-yard attack on one cell.
#[derive(Debug, Clone)]
pub struct CoordinatedStrike {
    /// Participating yards by id.
    pub launches: HashMap<String, LaunchOrder>,
    /// The cell under attack.
    pub target: Point,
}

impl CoordinatedStrike {
    /// Whether `id` is committed to this strike.
    #[must_use]
    pub fn involves(&self, id: &str) -> bool {
        self.launches.contains_key(id)
    }

    /// Launch every yard whose wait has elapsed; spawn at the rest.
    #[must_use]
    pub fn act(mut self, turn: &mut Turn<'_>) -> Intent {
        let board = turn.board;
        let mut remaining: HashMap<String, LaunchOrder> = HashMap::new();

        for (id, order) in self.launches.drain() {
            let Some(sy) = board.shipyard(&id).filter(|sy| sy.owner == turn.me) else {
                warn!(yard = %id, "strike yard is gone, dropping it from the attack");
                continue;
            };
            if order.wait <= -STRIKE_TIMEOUT {
                warn!(yard = %id, "strike yard waited too long for a route, giving up");
                continue;
            }

            let available = turn.available_ships(sy);
            let ships = available.min((order.power as f64 * 1.2) as u32);
            if order.wait > 0 {
                turn.spawn_or_hold(sy);
                remaining.insert(
                    id,
                    LaunchOrder {
                        power: order.power,
                        wait: order.wait - 1,
                    },
                );
                continue;
            }

            let routes = find_shortcut_routes(
                board,
                turn.me,
                sy.pos,
                self.target,
                ships,
                &RouteQuery {
                    allow_join: true,
                    ..RouteQuery::default()
                },
            );
            if let Some(route) = routes.into_iter().min_by(|a, b| {
                a.expected_ore(board, ships)
                    .total_cmp(&b.expected_ore(board, ships))
                    .then(a.len().cmp(&b.len()))
            }) {
                info!(yard = %id, target = ?self.target, ships, "coordinated strike launch");
                turn.set_action(&sy.id, ShipyardAction::Launch { ships, route });
            } else {
                info!(yard = %id, target = ?self.target, "no strike route yet, holding");
                turn.spawn_or_hold(sy);
                remaining.insert(
                    id,
                    LaunchOrder {
                        power: order.power,
                        wait: order.wait - 1,
                    },
                );
            }
        }

        if remaining.is_empty() {
            Intent::Idle
        } else {
            self.launches = remaining;
            Intent::CoordinatedStrike(self)
        }
    }
}

/// Yards saving up to convert a fleet into a new shipyard.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Founding yard id to chosen site.
    pub targets: HashMap<String, Point>,
    /// Extra route slack granted after every failed search.
    pub extra_distance: u32,
}

impl Expansion {
    /// Per yard: hold and spawn until the founding force is assembled, then
    /// launch the safest convert route. A yard that finds no route keeps
    /// its target and gets more route slack next turn.
    #[must_use]
    pub fn act(mut self, turn: &mut Turn<'_>, self_built: &mut HashSet<Point>) -> Intent {
        let board = turn.board;
        let me = turn.me;
        let yard_positions: HashSet<Point> = board.all_yards().map(|y| y.pos()).collect();

        let min_eta = board
            .shipyards_of(me)
            .map(|sy| {
                board
                    .incoming_allied_fleets(me, sy.pos)
                    .map(crate::board::Fleet::eta)
                    .min()
                    .unwrap_or(0)
            })
            .min()
            .unwrap_or(0);
        let max_opp_garrison = board
            .opponents_of(me)
            .first()
            .map_or(0, |opp| {
                board.shipyards_of(opp.id).map(|sy| sy.ships).max().unwrap_or(0)
            });

        let mut remaining: HashMap<String, Point> = HashMap::new();
        for (id, target) in self.targets.drain() {
            let Some(sy) = board.shipyard(&id).filter(|sy| sy.owner == me) else {
                warn!(yard = %id, "expansion yard is gone, dropping its site");
                continue;
            };
            if turn.has_action(&id) {
                warn!(yard = %id, "expansion yard already has an action this turn");
                remaining.insert(id, target);
                continue;
            }

            let available = turn.available_ships(sy);
            let threshold = if max_opp_garrison >= board.config.convert_cost {
                board.config.convert_cost
            } else {
                63
            };
            if available < threshold {
                info!(yard = %id, available, threshold, "expansion yard still gathering");
                remaining.insert(id.clone(), target);
                turn.spawn_or_hold(sy);
                if !matches!(turn.action(&id), Some(ShipyardAction::Spawn(_))) {
                    let eta = if min_eta == 0 { 30 } else { min_eta };
                    turn.set_action(
                        &id,
                        ShipyardAction::AllowMine {
                            max_distance: (eta / 2) as u16,
                            target: sy.pos,
                            max_time: 30,
                        },
                    );
                }
                continue;
            }

            let budget = board.grid.distance(sy.pos, target) + 2 * self.extra_distance;
            let mut routes: Vec<Route> = Vec::new();
            for p in board.grid.points() {
                if yard_positions.contains(&p) {
                    continue;
                }
                let distance = board.grid.distance(sy.pos, p) + board.grid.distance(p, target);
                if distance > budget {
                    continue;
                }
                for plan in plans_through(&board.grid, sy.pos, &[p, target]) {
                    let plan = plan.with_convert();
                    if available < plan.min_fleet_size() {
                        continue;
                    }
                    let route = Route::new(&board.grid, sy.pos, plan, 0);
                    if route.points().iter().any(|x| yard_positions.contains(x)) {
                        continue;
                    }
                    if !is_safety_route_to_convert(route.points(), board, me, available) {
                        continue;
                    }
                    routes.push(route);
                }
            }

            if let Some(route) = routes.into_iter().max_by(|a, b| {
                b.len().cmp(&a.len()).then_with(|| {
                    a.expected_ore(board, available)
                        .total_cmp(&b.expected_ore(board, available))
                })
            }) {
                info!(yard = %id, site = ?route.end(), ships = available, "founding a new shipyard");
                self_built.insert(target);
                turn.set_action(
                    &id,
                    ShipyardAction::Launch {
                        ships: available,
                        route,
                    },
                );
            } else {
                info!(yard = %id, site = ?target, budget, "no safe convert route, widening search");
                turn.spawn_or_hold(sy);
                remaining.insert(id, target);
                self.extra_distance += 1;
            }
        }

        if remaining.is_empty() {
            Intent::Idle
        } else {
            self.targets = remaining;
            Intent::Expansion(self)
        }
    }
}

/// Cross-turn memory, owned by the embedder and threaded through `decide`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// The undertaking in progress, if any.
    pub intent: Intent,
    /// Sites of yards this bot founded itself.
    pub self_built: HashSet<Point>,
    /// Self-founded sites currently not held.
    pub lost_yards: HashSet<Point>,
    /// Last turn each held yard position saw an incoming hostile fleet.
    pub attacked_at: HashMap<Point, u32>,
    /// Last turn a whittle raid was launched.
    pub last_whittle: Option<u32>,
    initialized: bool,
}

impl Session {
    /// Fold a new snapshot into the memory: refresh the self-built and
    /// lost yard sets and the per-yard attack timestamps.
    pub fn observe(&mut self, board: &Board, me: PlayerId) {
        if !self.initialized {
            for sy in board.shipyards_of(me) {
                self.self_built.insert(sy.pos);
            }
        } else {
            for sy in board.shipyards_of(me) {
                self.lost_yards.remove(&sy.pos);
            }
            let held: HashSet<Point> = board.yards_of(me).map(|y| y.pos()).collect();
            for &pos in &self.self_built {
                if !held.contains(&pos) {
                    self.lost_yards.insert(pos);
                }
            }
        }

        let mut attacked = HashMap::new();
        for sy in board.shipyards_of(me) {
            let last = if board.incoming_hostile_fleets(me, sy.pos).next().is_some() {
                board.step
            } else {
                self.attacked_at.get(&sy.pos).copied().unwrap_or(0)
            };
            attacked.insert(sy.pos, last);
        }
        self.attacked_at = attacked;
        self.initialized = true;
    }

    /// Whether a held yard position saw hostiles within the last
    /// `within` turns.
    #[must_use]
    pub fn recently_attacked(&self, pos: Point, step: u32, within: u32) -> bool {
        self.attacked_at
            .get(&pos)
            .is_some_and(|&last| last + within >= step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, fleet, line_route, shipyard};
    use crate::grid::Direction;

    #[test]
    fn test_session_tracks_lost_yards() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(3, 3), 10, 0),
                shipyard("b", 0, Point::new(10, 10), 10, 0),
            ],
            Vec::new(),
        );
        let mut session = Session::default();
        session.observe(&board, 0);
        assert!(session.self_built.contains(&Point::new(3, 3)));
        assert!(session.lost_yards.is_empty());

        // Yard "b" falls to the opponent.
        let later = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(3, 3), 10, 1),
                shipyard("b", 1, Point::new(10, 10), 10, 1),
            ],
            Vec::new(),
        );
        session.observe(&later, 0);
        assert!(session.lost_yards.contains(&Point::new(10, 10)));
        assert!(!session.lost_yards.contains(&Point::new(3, 3)));
    }

    #[test]
    fn test_session_records_attacks() {
        let grid = crate::board::fixtures::empty_grid(21);
        let raider = fleet(
            "r",
            1,
            Point::new(3, 8),
            20,
            0.0,
            line_route(&grid, Point::new(3, 8), Direction::North, 5),
        );
        let mut board = board_with(
            21,
            None,
            vec![shipyard("a", 0, Point::new(3, 3), 10, 0)],
            vec![raider],
        );
        board.step = 40;
        let mut session = Session::default();
        session.observe(&board, 0);
        assert!(session.recently_attacked(Point::new(3, 3), 42, 5));
        assert!(!session.recently_attacked(Point::new(3, 3), 50, 5));
    }

    #[test]
    fn test_strike_launches_when_wait_elapses() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(0, 0), 60, 10),
                shipyard("t", 1, Point::new(5, 0), 10, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let strike = CoordinatedStrike {
            launches: HashMap::from([(
                "a".to_string(),
                LaunchOrder {
                    power: 40,
                    wait: 0,
                },
            )]),
            target: Point::new(5, 0),
        };
        let next = strike.act(&mut turn);
        assert!(next.is_idle());
        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                assert_eq!(*ships, 48);
                assert_eq!(route.end(), Point::new(5, 0));
            }
            other => panic!("expected a launch, got {other:?}"),
        }
    }

    #[test]
    fn test_strike_drops_stale_yard() {
        let board = board_with(
            21,
            None,
            vec![shipyard("t", 1, Point::new(5, 0), 10, 10)],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let strike = CoordinatedStrike {
            launches: HashMap::from([(
                "ghost".to_string(),
                LaunchOrder {
                    power: 40,
                    wait: 0,
                },
            )]),
            target: Point::new(5, 0),
        };
        assert!(strike.act(&mut turn).is_idle());
        assert!(turn.action("ghost").is_none());
    }

    #[test]
    fn test_expansion_holds_below_threshold() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(5, 5), 60, 10),
                shipyard("t", 1, Point::new(18, 18), 10, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut built = HashSet::new();
        let expansion = Expansion {
            targets: HashMap::from([("a".to_string(), Point::new(9, 8))]),
            extra_distance: 0,
        };
        // Opponent garrisons are small, so the full 63-ship threshold holds.
        let next = expansion.act(&mut turn, &mut built);
        assert!(matches!(next, Intent::Expansion(_)));
        assert!(matches!(turn.action("a"), Some(ShipyardAction::Spawn(_))));
        assert!(built.is_empty());
    }

    #[test]
    fn test_expansion_launches_convert_route() {
        let board = board_with(
            21,
            None,
            vec![
                shipyard("a", 0, Point::new(5, 5), 70, 10),
                shipyard("t", 1, Point::new(18, 18), 10, 10),
            ],
            Vec::new(),
        );
        let mut turn = Turn::new(&board, 0, 60.0);
        let mut built = HashSet::new();
        let expansion = Expansion {
            targets: HashMap::from([("a".to_string(), Point::new(9, 8))]),
            extra_distance: 0,
        };
        let next = expansion.act(&mut turn, &mut built);
        assert!(next.is_idle());
        assert!(built.contains(&Point::new(9, 8)));
        match turn.action("a") {
            Some(ShipyardAction::Launch { ships, route }) => {
                assert_eq!(*ships, 70);
                assert!(route.plan().converts());
                assert_eq!(route.end(), Point::new(9, 8));
            }
            other => panic!("expected a convert launch, got {other:?}"),
        }
    }
}
