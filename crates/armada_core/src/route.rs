//! Routes: plans anchored at a concrete start cell.
//!
//! A [`Route`] resolves a [`Plan`] into the ordered cells a fleet will visit
//! and when. [`Route::expected_ore`] is the harvest model used to score
//! candidate launches: it accounts for every already-committed fleet that
//! will sweep the same cells earlier, ordered by predicted arrival time.

use serde::{Deserialize, Serialize};

use crate::board::{collection_rate, Board};
use crate::grid::{Direction, Grid, Point};
use crate::plan::Plan;

/// A plan anchored at a start point, expanded to concrete cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    start: Point,
    plan: Plan,
    points: Vec<Point>,
    start_time: u32,
}

impl Route {
    /// Expand `plan` from `start`. The start cell itself is not part of the
    /// visited sequence; a convert-only plan visits nothing.
    #[must_use]
    pub fn new(grid: &Grid, start: Point, plan: Plan, start_time: u32) -> Self {
        let mut points = Vec::with_capacity(plan.num_steps() as usize);
        let mut cursor = start;
        for seg in plan.segments() {
            for _ in 0..seg.steps {
                cursor = grid.shift(cursor, seg.dir);
                points.push(cursor);
            }
        }
        Self {
            start,
            plan,
            points,
            start_time,
        }
    }

    /// The launch cell.
    #[must_use]
    pub const fn start(&self) -> Point {
        self.start
    }

    /// The final cell; the start cell for a convert-only plan.
    #[must_use]
    pub fn end(&self) -> Point {
        self.points.last().copied().unwrap_or(self.start)
    }

    /// Cells visited after launch, in order, one per turn.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The underlying plan.
    #[must_use]
    pub const fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Number of turns in flight.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.points.len() as u32
    }

    /// Whether the route visits no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Turns until this route launches (0 for immediate launches).
    #[must_use]
    pub const fn start_time(&self) -> u32 {
        self.start_time
    }

    /// Direction of the final leg.
    #[must_use]
    pub fn last_direction(&self) -> Option<Direction> {
        self.plan.last_direction()
    }

    /// Expected total ore harvested by a fleet of `ships` flying this route.
    ///
    /// Each cell's ore is depleted multiplicatively by every committed fleet
    /// (any owner) predicted to cross it *before* this route's own arrival,
    /// then harvested at this fleet's collection rate. Repeat visits by this
    /// route see their own depletion as well.
    #[must_use]
    pub fn expected_ore(&self, board: &Board, ships: u32) -> f64 {
        let rate = collection_rate(ships);
        if rate <= 0.0 {
            return 0.0;
        }

        // Last visit time per cell; later visits overwrite.
        let mut arrival: std::collections::HashMap<Point, u32> = std::collections::HashMap::new();
        let mut ore: std::collections::HashMap<Point, f64> = std::collections::HashMap::new();
        for (t, &p) in self.points.iter().enumerate() {
            arrival.insert(p, t as u32 + self.start_time);
            ore.entry(p).or_insert_with(|| board.grid.ore_at(p));
        }

        for fleet in &board.fleets {
            let depletion = 1.0 - collection_rate(fleet.ships);
            for (t, &p) in fleet.route.points().iter().enumerate() {
                if arrival.get(&p).is_some_and(|&mine| (t as u32) < mine) {
                    if let Some(amount) = ore.get_mut(&p) {
                        *amount *= depletion;
                    }
                }
            }
        }

        let mut total = 0.0;
        for &p in &self.points {
            if let Some(amount) = ore.get_mut(&p) {
                total += *amount * rate;
                *amount *= 1.0 - rate;
            }
        }
        total
    }
}

/// A mining route that may not be launchable yet.
///
/// `time_to_ready` is how many turns the originating shipyard still needs to
/// accumulate the ships the plan requires; the route is executable only once
/// that reaches zero. The wait counts toward the route's effective length
/// when scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningRoute {
    /// The route itself.
    pub route: Route,
    /// Turns until the shipyard can field the required fleet.
    pub time_to_ready: u32,
}

impl MiningRoute {
    /// Pair a route with its readiness delay.
    #[must_use]
    pub const fn new(route: Route, time_to_ready: u32) -> Self {
        Self {
            route,
            time_to_ready,
        }
    }

    /// Whether the route can launch this turn.
    #[must_use]
    pub const fn can_execute(&self) -> bool {
        self.time_to_ready == 0
    }

    /// Flight turns plus the readiness wait.
    #[must_use]
    pub fn effective_len(&self) -> u32 {
        self.route.len() + self.time_to_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures;
    use crate::plan::plans_through;

    #[test]
    fn test_route_expansion() {
        let grid = Grid::new(21, vec![0.0; 441]);
        let mut plan = Plan::new();
        plan.push(Direction::East, 2);
        plan.push(Direction::South, 1);
        let route = Route::new(&grid, Point::new(0, 0), plan, 0);
        assert_eq!(route.len(), 3);
        assert_eq!(
            route.points(),
            &[Point::new(1, 0), Point::new(2, 0), Point::new(2, 1)]
        );
        assert_eq!(route.end(), Point::new(2, 1));
    }

    #[test]
    fn test_convert_only_route_stays_put() {
        let grid = Grid::new(21, vec![0.0; 441]);
        let route = Route::new(&grid, Point::new(4, 4), Plan::new().with_convert(), 0);
        assert!(route.is_empty());
        assert_eq!(route.end(), Point::new(4, 4));
    }

    #[test]
    fn test_expected_ore_collects_along_route() {
        let mut board = fixtures::empty_board(21);
        board.grid = fixtures::uniform_ore_grid(21, 100.0);
        let plan = plans_through(&board.grid, Point::new(0, 0), &[Point::new(2, 0)])
            .pop()
            .unwrap();
        let route = Route::new(&board.grid, Point::new(0, 0), plan, 0);
        let yield_small = route.expected_ore(&board, 8);
        let yield_large = route.expected_ore(&board, 100);
        assert!(yield_small > 0.0);
        // Collection rate grows with fleet size.
        assert!(yield_large > yield_small);
    }

    #[test]
    fn test_expected_ore_sees_earlier_depletion() {
        let mut board = fixtures::empty_board(21);
        board.grid = fixtures::uniform_ore_grid(21, 100.0);

        let plan = plans_through(&board.grid, Point::new(0, 0), &[Point::new(3, 0)])
            .pop()
            .unwrap();
        let route = Route::new(&board.grid, Point::new(0, 0), plan.clone(), 5);
        let clean = route.expected_ore(&board, 20);

        // A committed fleet sweeps the same cells at t=0..2, before our
        // arrival at t=5.., so our yield must drop.
        let other = fixtures::fleet(
            "f1",
            1,
            Point::new(0, 0),
            100,
            0.0,
            Route::new(&board.grid, Point::new(0, 0), plan, 0),
        );
        board.fleets.push(other);
        let depleted = route.expected_ore(&board, 20);
        assert!(depleted < clean);
    }

    #[test]
    fn test_mining_route_readiness() {
        let grid = Grid::new(21, vec![0.0; 441]);
        let mut plan = Plan::new();
        plan.push(Direction::North, 2);
        let route = Route::new(&grid, Point::new(0, 0), plan, 0);
        let waiting = MiningRoute::new(route.clone(), 3);
        assert!(!waiting.can_execute());
        assert_eq!(waiting.effective_len(), 5);
        assert!(MiningRoute::new(route, 0).can_execute());
    }
}
