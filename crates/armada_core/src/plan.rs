//! The movement-plan mini-language.
//!
//! A [`Plan`] is an ordered list of `(direction, run length)` segments with
//! an optional trailing convert marker. Plans serialize to the compact
//! grammar understood by the game engine: a direction letter, followed by a
//! decimal count of *additional* cells to continue straight, e.g. `N2E5C`
//! (three cells north, six cells east, then convert into a shipyard).
//!
//! Longer plan strings require larger fleets: a fleet of `n` ships can carry
//! a plan of at most `floor(2 ln n) + 1` characters. [`Plan::min_fleet_size`]
//! is the inverse of that law and is the hard feasibility gate applied
//! everywhere a route is considered for launch.

use serde::{Deserialize, Serialize};

use crate::error::{ArmadaError, Result};
use crate::grid::{Direction, Grid, Point};

/// Drift horizon for fleets whose committed plan ends in open space.
pub const CRUISE_STEPS: u16 = 31;

/// One straight leg of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanSegment {
    /// Movement direction.
    pub dir: Direction,
    /// Number of cells moved, at least 1.
    pub steps: u16,
}

/// An immutable movement plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plan {
    segments: Vec<PlanSegment>,
    convert: bool,
}

impl Plan {
    /// The empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from segments, merging adjacent same-direction runs.
    #[must_use]
    pub fn from_segments(segments: impl IntoIterator<Item = PlanSegment>) -> Self {
        let mut plan = Self::new();
        for s in segments {
            plan.push(s.dir, s.steps);
        }
        plan
    }

    /// Append a straight run, merging with the last segment when collinear.
    pub fn push(&mut self, dir: Direction, steps: u16) {
        debug_assert!(!self.convert, "cannot extend a plan past its convert marker");
        if steps == 0 {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.dir == dir {
                last.steps += steps;
                return;
            }
        }
        self.segments.push(PlanSegment { dir, steps });
    }

    /// Mark the plan to end with a shipyard conversion.
    #[must_use]
    pub fn with_convert(mut self) -> Self {
        self.convert = true;
        self
    }

    /// Model the open-ended drift of a fleet already in flight: after its
    /// plan runs out it keeps moving on its last heading forever. The final
    /// leg is widened to [`CRUISE_STEPS`] cells (`heading` supplies the
    /// direction for an empty plan); convert plans are left alone.
    #[must_use]
    pub fn with_cruise(mut self, heading: Direction) -> Self {
        if self.convert {
            return self;
        }
        match self.segments.last_mut() {
            Some(last) => last.steps = CRUISE_STEPS,
            None => self.segments.push(PlanSegment {
                dir: heading,
                steps: CRUISE_STEPS,
            }),
        }
        self
    }

    /// Concatenate another plan onto this one.
    #[must_use]
    pub fn join(mut self, other: &Plan) -> Self {
        for s in &other.segments {
            self.push(s.dir, s.steps);
        }
        self.convert = other.convert;
        self
    }

    /// The plan's segments.
    #[must_use]
    pub fn segments(&self) -> &[PlanSegment] {
        &self.segments
    }

    /// Whether the plan ends with a conversion order.
    #[must_use]
    pub const fn converts(&self) -> bool {
        self.convert
    }

    /// Total number of cells moved.
    #[must_use]
    pub fn num_steps(&self) -> u32 {
        self.segments.iter().map(|s| u32::from(s.steps)).sum()
    }

    /// Whether the plan moves nowhere and converts nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && !self.convert
    }

    /// Direction of the final leg, if any.
    #[must_use]
    pub fn last_direction(&self) -> Option<Direction> {
        self.segments.last().map(|s| s.dir)
    }

    /// Direction of the first leg, if any.
    #[must_use]
    pub fn first_direction(&self) -> Option<Direction> {
        self.segments.first().map(|s| s.dir)
    }

    /// Serialized length in characters.
    #[must_use]
    pub fn command_len(&self) -> usize {
        self.to_string().len()
    }

    /// Minimum fleet size able to execute this plan.
    ///
    /// Inverse of the game's plan-length cap `floor(2 ln n) + 1`.
    #[must_use]
    pub fn min_fleet_size(&self) -> u32 {
        min_fleet_size_for_len(self.command_len())
    }

    /// Parse a plan string. `heading` resolves a leading digit run, which in
    /// the wire format means "continue on the current heading": committed
    /// plans of fleets already in flight may start with digits.
    pub fn parse(s: &str, heading: Option<Direction>) -> Result<Self> {
        let err = |message: &str| ArmadaError::PlanParse {
            plan: s.to_string(),
            message: message.to_string(),
        };

        let mut plan = Plan::new();
        let mut chars = s.chars().peekable();
        let mut current: Option<Direction> = None;

        while let Some(c) = chars.next() {
            if plan.convert {
                return Err(err("trailing characters after convert marker"));
            }
            if c == 'C' {
                plan.convert = true;
                continue;
            }
            if let Some(dir) = Direction::from_char(c) {
                plan.push(dir, 1);
                current = Some(dir);
                continue;
            }
            if c.is_ascii_digit() {
                let mut run = c.to_digit(10).unwrap_or(0);
                while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                    run = run * 10 + d;
                    chars.next();
                }
                let dir = match current.or(heading) {
                    Some(dir) => dir,
                    None => return Err(err("leading digits without a heading")),
                };
                // A digit run after "N" extends that leg; a leading digit run
                // moves along the prior heading without re-emitting its letter.
                if current.is_some() {
                    plan.push(dir, run as u16);
                } else {
                    plan.push(dir, run as u16 + 1);
                    current = Some(dir);
                }
                continue;
            }
            return Err(err("unexpected character"));
        }
        Ok(plan)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for s in &self.segments {
            write!(f, "{}", s.dir.to_char())?;
            if s.steps > 1 {
                write!(f, "{}", s.steps - 1)?;
            }
        }
        if self.convert {
            write!(f, "C")?;
        }
        Ok(())
    }
}

/// Minimum fleet size required to carry a plan string of `len` characters.
#[must_use]
pub fn min_fleet_size_for_len(len: usize) -> u32 {
    if len <= 1 {
        return 1;
    }
    let n = ((len as f64 - 1.0) / 2.0).exp().ceil();
    n as u32
}

/// Maximum plan string length a fleet of `ships` can execute.
#[must_use]
pub fn max_plan_len_for_fleet(ships: u32) -> usize {
    if ships == 0 {
        return 0;
    }
    (2.0 * f64::from(ships).ln()).floor() as usize + 1
}

/// Every minimal-distance plan from `start` through the ordered `vias`.
///
/// Each leg contributes its one or two axis moves; with both axes present
/// the leg has two orderings, and the result is the cartesian product over
/// legs, deduplicated after same-direction merging.
#[must_use]
pub fn plans_through(grid: &Grid, start: Point, vias: &[Point]) -> Vec<Plan> {
    let mut plans = vec![Plan::new()];
    let mut from = start;
    for &via in vias {
        let moves = grid.moves_to(from, via);
        let orderings: Vec<Vec<(Direction, u16)>> = match moves.len() {
            0 => vec![vec![]],
            1 => vec![moves.clone()],
            _ => vec![
                vec![moves[0], moves[1]],
                vec![moves[1], moves[0]],
            ],
        };
        let mut next = Vec::with_capacity(plans.len() * orderings.len());
        for plan in &plans {
            for ordering in &orderings {
                let mut extended = plan.clone();
                for &(dir, steps) in ordering {
                    extended.push(dir, steps);
                }
                next.push(extended);
            }
        }
        plans = next;
        from = via;
    }
    plans.sort_by_key(|p| p.to_string());
    plans.dedup();
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_run_lengths() {
        let mut plan = Plan::new();
        plan.push(Direction::North, 3);
        plan.push(Direction::East, 1);
        assert_eq!(plan.to_string(), "N2E");
    }

    #[test]
    fn test_display_convert() {
        let mut plan = Plan::new();
        plan.push(Direction::South, 2);
        let plan = plan.with_convert();
        assert_eq!(plan.to_string(), "S1C");
    }

    #[test]
    fn test_parse_with_heading_digits() {
        // A fleet already heading east with "3N" remaining: four more cells
        // east, then one north.
        let plan = Plan::parse("3N", Some(Direction::East)).unwrap();
        assert_eq!(plan.segments().len(), 2);
        assert_eq!(plan.segments()[0], PlanSegment { dir: Direction::East, steps: 4 });
        assert_eq!(plan.segments()[1], PlanSegment { dir: Direction::North, steps: 1 });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Plan::parse("NXE", None).is_err());
        assert!(Plan::parse("3N", None).is_err());
        assert!(Plan::parse("CN", None).is_err());
    }

    #[test]
    fn test_push_merges_collinear() {
        let mut plan = Plan::new();
        plan.push(Direction::East, 2);
        plan.push(Direction::East, 3);
        assert_eq!(plan.segments().len(), 1);
        assert_eq!(plan.to_string(), "E4");
    }

    #[test]
    fn test_min_fleet_size_ladder() {
        // 1 char -> 1 ship, 2 chars -> 2 ships, 3 chars -> 3, 5 chars -> 8.
        assert_eq!(min_fleet_size_for_len(1), 1);
        assert_eq!(min_fleet_size_for_len(2), 2);
        assert_eq!(min_fleet_size_for_len(3), 3);
        assert_eq!(min_fleet_size_for_len(5), 8);
        // Inverse relationship with the plan-length cap.
        for ships in 1u32..200 {
            let len = max_plan_len_for_fleet(ships);
            assert!(min_fleet_size_for_len(len) <= ships);
        }
    }

    #[test]
    fn test_plans_through_two_orderings() {
        let grid = Grid::new(21, vec![0.0; 441]);
        let plans = plans_through(&grid, Point::new(0, 0), &[Point::new(3, 2)]);
        assert_eq!(plans.len(), 2);
        let strings: Vec<String> = plans.iter().map(|p| p.to_string()).collect();
        assert!(strings.contains(&"E2S1".to_string()));
        assert!(strings.contains(&"S1E2".to_string()));
    }

    #[test]
    fn test_plans_through_collinear_vias_merge() {
        let grid = Grid::new(21, vec![0.0; 441]);
        let plans = plans_through(
            &grid,
            Point::new(0, 0),
            &[Point::new(2, 0), Point::new(5, 0)],
        );
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].to_string(), "E4");
    }

    fn arb_plan() -> impl Strategy<Value = Plan> {
        (
            proptest::collection::vec((0u8..4, 1u16..12), 0..5),
            proptest::bool::ANY,
        )
            .prop_map(|(segs, convert)| {
                let mut plan = Plan::new();
                for (d, steps) in segs {
                    if let Some(dir) = Direction::from_game_id(d) {
                        plan.push(dir, steps);
                    }
                }
                if convert {
                    plan = plan.with_convert();
                }
                plan
            })
    }

    proptest! {
        #[test]
        fn prop_serialize_parse_round_trip(plan in arb_plan()) {
            let s = plan.to_string();
            let parsed = Plan::parse(&s, None).unwrap();
            prop_assert_eq!(parsed.to_string(), s);
        }
    }
}
