//! Forward simulation of every committed route.
//!
//! Runs once per snapshot, at board construction. All fleets advance in
//! lockstep until none remains in flight; each turn resolves, in order,
//! conversions, shipyard arrivals, same-owner merges, cross-owner
//! collisions and adjacent splash damage. Every fleet's route is then
//! truncated to the cells it is predicted to actually visit, and the
//! resulting per-player occupancy and damage maps are recorded for the
//! risk and search layers.
//!
//! The prediction is deliberately coarse: ship counts are frozen at their
//! snapshot values, merged fleets keep following their absorber so their
//! occupancy stays visible, and splash destruction is all-or-nothing.

use std::collections::HashMap;

use crate::board::{Fleet, PlayerId, Shipyard};
use crate::grid::{Direction, Grid, Point};
use crate::plan::Plan;
use crate::route::Route;

/// How a fleet's flight is predicted to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FleetFate {
    /// Docks at a shipyard (existing, or one predicted to be built first).
    Arrived,
    /// Converts into a shipyard at the end of its route.
    Converted,
    /// Absorbed by a larger fleet of the same owner.
    Merged,
    /// Lost to a collision or to adjacent splash damage.
    Destroyed,
    /// Ran out of predicted plan while still in open space.
    Adrift,
}

/// A fleet's predicted presence on a cell at a future turn.
#[derive(Debug, Clone, Copy)]
pub struct FleetStamp {
    /// Index of the fleet in the board's fleet list.
    pub fleet: usize,
    /// The fleet's snapshot ship count.
    pub ships: u32,
    /// Where the fleet's predicted route ends.
    pub end: Point,
}

/// Simulation output: per-player occupancy and splash-damage maps, plus the
/// predicted fate of every fleet. Times index turns after the snapshot;
/// queries beyond the recorded horizon see empty space.
#[derive(Debug, Clone, Default)]
pub struct Forecast {
    occupancy: HashMap<PlayerId, Vec<HashMap<Point, FleetStamp>>>,
    damage: HashMap<PlayerId, Vec<HashMap<Point, u32>>>,
    fates: HashMap<String, FleetFate>,
}

impl Forecast {
    /// The fleet of `player` predicted on `point` at `time`, if any.
    #[must_use]
    pub fn fleet_at(&self, player: PlayerId, time: u32, point: Point) -> Option<&FleetStamp> {
        self.occupancy
            .get(&player)?
            .get(time as usize)?
            .get(&point)
    }

    /// Splash damage `player`'s fleets would deal on `point` at `time`.
    #[must_use]
    pub fn damage_at(&self, player: PlayerId, time: u32, point: Point) -> u32 {
        self.damage
            .get(&player)
            .and_then(|times| times.get(time as usize))
            .and_then(|cells| cells.get(&point))
            .copied()
            .unwrap_or(0)
    }

    /// The predicted fate of a fleet, by id.
    #[must_use]
    pub fn fate(&self, fleet_id: &str) -> Option<FleetFate> {
        self.fates.get(fleet_id).copied()
    }

    /// Turns of recorded occupancy for `player`'s fleets.
    #[must_use]
    pub fn horizon(&self, player: PlayerId) -> u32 {
        self.occupancy
            .get(&player)
            .map_or(0, |times| times.len() as u32)
    }
}

/// One fleet's simulation state.
struct Cursor {
    /// Index into the board's fleet list.
    idx: usize,
    owner: PlayerId,
    ships: u32,
    /// Last cell reached; the snapshot cell before the first step.
    pos: Point,
    active: bool,
    /// Current segment of the committed plan and steps taken within it.
    seg: usize,
    step: u16,
    /// Accumulated legs of the realized path. Zero-length entries mark legs
    /// an absorbed fleet joined mid-flight.
    legs: Vec<(Direction, u16)>,
    /// Cursors absorbed into this one; they keep tracing this fleet's path.
    followers: Vec<usize>,
    /// Realized path ends with a conversion.
    convert_marker: bool,
    fate: FleetFate,
}

/// Advance cursor `i` one cell along its committed plan. Exhausting the
/// plan deactivates the cursor; a trailing convert order reports the
/// conversion cell. Followers' leg records grow in step with this cursor.
fn advance(cursors: &mut [Cursor], i: usize, fleets: &[Fleet], grid: &Grid) -> Option<Point> {
    if !cursors[i].active {
        return None;
    }
    let fleet = &fleets[cursors[i].idx];
    let segments = fleet.route.plan().segments();

    if cursors[i].seg >= segments.len() {
        let followers = cursors[i].followers.clone();
        let cursor = &mut cursors[i];
        cursor.active = false;
        if fleet.route.plan().converts() {
            cursor.convert_marker = true;
            cursor.fate = FleetFate::Converted;
            let pos = cursor.pos;
            for f in followers {
                cursors[f].convert_marker = true;
            }
            return Some(pos);
        }
        cursor.fate = FleetFate::Adrift;
        return None;
    }

    let segment = segments[cursors[i].seg];
    let new_leg = cursors[i].step == 0;
    let followers = cursors[i].followers.clone();

    if new_leg {
        cursors[i].legs.push((segment.dir, 0));
        for &f in &followers {
            cursors[f].legs.push((segment.dir, 0));
        }
    }

    let cursor = &mut cursors[i];
    cursor.pos = grid.shift(cursor.pos, segment.dir);
    if let Some(last) = cursor.legs.last_mut() {
        last.1 += 1;
    }
    cursor.step += 1;
    if cursor.step == segment.steps {
        cursor.seg += 1;
        cursor.step = 0;
    }
    for &f in &followers {
        if let Some(last) = cursors[f].legs.last_mut() {
            last.1 += 1;
        }
    }
    None
}

/// Run the forecast and truncate every fleet's route in place.
pub(crate) fn simulate(grid: &Grid, shipyards: &[Shipyard], fleets: &mut [Fleet]) -> Forecast {
    let mut yard_positions: std::collections::HashSet<Point> =
        shipyards.iter().map(|sy| sy.pos).collect();

    let mut cursors: Vec<Cursor> = fleets
        .iter()
        .enumerate()
        .map(|(idx, f)| Cursor {
            idx,
            owner: f.owner,
            ships: f.ships,
            pos: f.pos,
            active: true,
            seg: 0,
            step: 0,
            legs: Vec::new(),
            followers: Vec::new(),
            convert_marker: false,
            fate: FleetFate::Adrift,
        })
        .collect();

    while cursors.iter().any(|c| c.active) {
        // Advance everyone; conversions open new docking positions for
        // fleets resolved later this same turn.
        for i in 0..cursors.len() {
            if let Some(built) = advance(&mut cursors, i, fleets, grid) {
                yard_positions.insert(built);
            }
        }

        // Docking at any shipyard position ends the flight.
        for cursor in cursors.iter_mut().filter(|c| c.active) {
            if yard_positions.contains(&cursor.pos) {
                cursor.active = false;
                cursor.fate = FleetFate::Arrived;
            }
        }

        // Same-owner fleets on one cell merge into the highest ranked,
        // which carries the absorbed fleets along for occupancy purposes.
        let mut groups: HashMap<(PlayerId, Point), Vec<usize>> = HashMap::new();
        for (i, c) in cursors.iter().enumerate().filter(|(_, c)| c.active) {
            groups.entry((c.owner, c.pos)).or_default().push(i);
        }
        for mut group in groups.into_values().filter(|g| g.len() > 1) {
            group.sort_by(|&a, &b| fleets[cursors[a].idx].rank_cmp(&fleets[cursors[b].idx]));
            let survivor = group[group.len() - 1];
            let heading = cursors[survivor].legs.last().map(|&(dir, _)| dir);
            for &i in &group[..group.len() - 1] {
                cursors[i].active = false;
                cursors[i].fate = FleetFate::Merged;
                if let Some(dir) = heading {
                    cursors[i].legs.push((dir, 0));
                }
                cursors[survivor].followers.push(i);
            }
        }

        // Cross-owner contact: only the highest ranked fleet survives.
        let mut contacts: HashMap<Point, Vec<usize>> = HashMap::new();
        for (i, c) in cursors.iter().enumerate().filter(|(_, c)| c.active) {
            contacts.entry(c.pos).or_default().push(i);
        }
        for mut group in contacts.into_values().filter(|g| g.len() > 1) {
            group.sort_by(|&a, &b| fleets[cursors[a].idx].rank_cmp(&fleets[cursors[b].idx]));
            for &i in &group[..group.len() - 1] {
                cursors[i].active = false;
                cursors[i].fate = FleetFate::Destroyed;
            }
        }

        // Splash: a fleet whose ship count is at or below the summed
        // strength of hostile fleets on adjacent cells is wiped out.
        let occupied: HashMap<Point, usize> = cursors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active)
            .map(|(i, c)| (c.pos, i))
            .collect();
        let mut splash: HashMap<Point, u32> = HashMap::new();
        for (&pos, &i) in &occupied {
            for adj in grid.adjacent(pos) {
                if let Some(&j) = occupied.get(&adj) {
                    if cursors[j].owner != cursors[i].owner {
                        *splash.entry(adj).or_insert(0) += cursors[i].ships;
                    }
                }
            }
        }
        for &i in occupied.values() {
            if cursors[i].ships <= splash.get(&cursors[i].pos).copied().unwrap_or(0) {
                cursors[i].active = false;
                cursors[i].fate = FleetFate::Destroyed;
            }
        }
    }

    // Rewrite routes to the realized paths.
    let mut fates = HashMap::with_capacity(cursors.len());
    for cursor in &cursors {
        let mut plan = Plan::new();
        for &(dir, steps) in &cursor.legs {
            plan.push(dir, steps);
        }
        if cursor.convert_marker {
            plan = plan.with_convert();
        }
        let fleet = &mut fleets[cursor.idx];
        fleet.route = Route::new(grid, fleet.pos, plan, 0);
        fates.insert(fleet.id.clone(), cursor.fate);
    }

    // Occupancy and splash maps from the truncated routes. Later fleets in
    // board order overwrite on shared cells.
    let mut occupancy: HashMap<PlayerId, Vec<HashMap<Point, FleetStamp>>> = HashMap::new();
    let mut damage: HashMap<PlayerId, Vec<HashMap<Point, u32>>> = HashMap::new();
    for (idx, fleet) in fleets.iter().enumerate() {
        let times = occupancy.entry(fleet.owner).or_default();
        let dmg_times = damage.entry(fleet.owner).or_default();
        let len = fleet.route.points().len();
        if times.len() < len {
            times.resize_with(len, HashMap::new);
            dmg_times.resize_with(len, HashMap::new);
        }
        for (t, &p) in fleet.route.points().iter().enumerate() {
            times[t].insert(
                p,
                FleetStamp {
                    fleet: idx,
                    ships: fleet.ships,
                    end: fleet.route.end(),
                },
            );
            for adj in grid.adjacent(p) {
                *dmg_times[t].entry(adj).or_insert(0) += fleet.ships;
            }
        }
    }

    Forecast {
        occupancy,
        damage,
        fates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{board_with, empty_grid, fleet, line_route, shipyard};
    use crate::grid::Direction;

    #[test]
    fn test_route_truncated_at_shipyard() {
        let grid = empty_grid(21);
        let yard = shipyard("sy", 1, Point::new(3, 0), 5, 10);
        let f = fleet(
            "f1",
            0,
            Point::new(0, 0),
            21,
            0.0,
            line_route(&grid, Point::new(0, 0), Direction::East, 6),
        );
        let board = board_with(21, None, vec![yard], vec![f]);

        let f = board.fleet("f1").unwrap();
        assert_eq!(f.route.len(), 3);
        assert_eq!(f.route.end(), Point::new(3, 0));
        assert_eq!(board.forecast.fate("f1"), Some(FleetFate::Arrived));
    }

    #[test]
    fn test_collision_keeps_stronger_fleet() {
        let grid = empty_grid(21);
        let strong = fleet(
            "strong",
            0,
            Point::new(0, 0),
            50,
            0.0,
            line_route(&grid, Point::new(0, 0), Direction::East, 2),
        );
        let weak = fleet(
            "weak",
            1,
            Point::new(4, 0),
            30,
            0.0,
            line_route(&grid, Point::new(4, 0), Direction::West, 2),
        );
        let board = board_with(21, None, Vec::new(), vec![strong, weak]);

        assert_eq!(board.forecast.fate("weak"), Some(FleetFate::Destroyed));
        assert_eq!(board.forecast.fate("strong"), Some(FleetFate::Adrift));
        let weak = board.fleet("weak").unwrap();
        assert_eq!(weak.route.end(), Point::new(2, 0));
        assert_eq!(weak.route.len(), 2);
    }

    #[test]
    fn test_merge_folds_route_into_absorber() {
        let grid = empty_grid(21);
        let absorber = fleet(
            "big",
            0,
            Point::new(0, 0),
            50,
            0.0,
            line_route(&grid, Point::new(0, 0), Direction::East, 5),
        );
        let absorbed = fleet(
            "small",
            0,
            Point::new(4, 0),
            30,
            0.0,
            line_route(&grid, Point::new(4, 0), Direction::West, 2),
        );
        let board = board_with(21, None, Vec::new(), vec![absorber, absorbed]);

        assert_eq!(board.forecast.fate("small"), Some(FleetFate::Merged));
        // The absorbed fleet's prediction continues along its absorber's
        // remaining path, so its occupancy stays on the map.
        let small = board.fleet("small").unwrap();
        assert_eq!(small.route.end(), Point::new(5, 0));
        assert_eq!(small.route.len(), 5);
        let big = board.fleet("big").unwrap();
        assert_eq!(big.route.len(), 5);
    }

    #[test]
    fn test_splash_destroys_at_boundary() {
        let grid = empty_grid(21);
        // Parallel tracks one cell apart; 35 <= 40 dies, 40 > 35 survives.
        let doomed = fleet(
            "doomed",
            0,
            Point::new(0, 0),
            35,
            0.0,
            line_route(&grid, Point::new(0, 0), Direction::East, 5),
        );
        let raider = fleet(
            "raider",
            1,
            Point::new(0, 1),
            40,
            0.0,
            line_route(&grid, Point::new(0, 1), Direction::East, 5),
        );
        let board = board_with(21, None, Vec::new(), vec![doomed, raider]);

        assert_eq!(board.forecast.fate("doomed"), Some(FleetFate::Destroyed));
        assert_eq!(board.forecast.fate("raider"), Some(FleetFate::Adrift));
        assert_eq!(board.fleet("doomed").unwrap().route.len(), 1);
        assert_eq!(board.fleet("raider").unwrap().route.len(), 5);
    }

    #[test]
    fn test_conversion_opens_docking_position() {
        let grid = empty_grid(21);
        let mut plan = Plan::new();
        plan.push(Direction::East, 2);
        let founder = fleet(
            "founder",
            0,
            Point::new(0, 0),
            60,
            0.0,
            Route::new(&grid, Point::new(0, 0), plan.with_convert(), 0),
        );
        // Arrives at the conversion cell well after the yard exists.
        let docker = fleet(
            "docker",
            0,
            Point::new(2, 5),
            21,
            0.0,
            line_route(&grid, Point::new(2, 5), Direction::North, 5),
        );
        let board = board_with(21, None, Vec::new(), vec![founder, docker]);

        assert_eq!(board.forecast.fate("founder"), Some(FleetFate::Converted));
        assert!(board.fleet("founder").unwrap().route.plan().converts());
        assert_eq!(board.forecast.fate("docker"), Some(FleetFate::Arrived));
        assert_eq!(board.fleet("docker").unwrap().route.end(), Point::new(2, 0));
    }

    #[test]
    fn test_every_ship_is_accounted_for() {
        let grid = empty_grid(21);
        let fleets = vec![
            // Same-owner merge pair.
            fleet(
                "m1",
                0,
                Point::new(0, 10),
                50,
                0.0,
                line_route(&grid, Point::new(0, 10), Direction::East, 4),
            ),
            fleet(
                "m2",
                0,
                Point::new(8, 10),
                30,
                0.0,
                line_route(&grid, Point::new(8, 10), Direction::West, 4),
            ),
            // Cross-owner collision pair.
            fleet(
                "c1",
                0,
                Point::new(0, 15),
                40,
                0.0,
                line_route(&grid, Point::new(0, 15), Direction::East, 2),
            ),
            fleet(
                "c2",
                1,
                Point::new(4, 15),
                10,
                0.0,
                line_route(&grid, Point::new(4, 15), Direction::West, 2),
            ),
            // Docks at home.
            fleet(
                "d",
                0,
                Point::new(0, 0),
                21,
                0.0,
                line_route(&grid, Point::new(0, 0), Direction::East, 3),
            ),
            // Converts in open space.
            fleet("v", 1, Point::new(12, 3), 60, 0.0, {
                let mut plan = Plan::new();
                plan.push(Direction::South, 2);
                Route::new(&grid, Point::new(12, 3), plan.with_convert(), 0)
            }),
        ];
        let total: u32 = fleets.iter().map(|f| f.ships).sum();
        let board = board_with(
            21,
            None,
            vec![shipyard("home", 0, Point::new(3, 0), 0, 10)],
            fleets,
        );

        // Every fleet resolves to exactly one fate and no ships vanish
        // from the ledger.
        let mut by_fate: HashMap<FleetFate, u32> = HashMap::new();
        for f in &board.fleets {
            let fate = board.forecast.fate(&f.id).unwrap();
            *by_fate.entry(fate).or_insert(0) += f.ships;
        }
        assert_eq!(by_fate.values().sum::<u32>(), total);
        assert_eq!(by_fate.get(&FleetFate::Merged), Some(&30));
        assert_eq!(by_fate.get(&FleetFate::Destroyed), Some(&10));
        assert_eq!(by_fate.get(&FleetFate::Arrived), Some(&21));
        assert_eq!(by_fate.get(&FleetFate::Converted), Some(&60));
    }

    #[test]
    fn test_occupancy_and_damage_maps() {
        let grid = empty_grid(21);
        let f = fleet(
            "f1",
            0,
            Point::new(0, 0),
            25,
            0.0,
            line_route(&grid, Point::new(0, 0), Direction::East, 3),
        );
        let board = board_with(21, None, Vec::new(), vec![f]);

        let stamp = board.forecast.fleet_at(0, 1, Point::new(2, 0)).unwrap();
        assert_eq!(stamp.ships, 25);
        assert_eq!(stamp.end, Point::new(3, 0));
        assert!(board.forecast.fleet_at(0, 0, Point::new(2, 0)).is_none());
        assert!(board.forecast.fleet_at(1, 1, Point::new(2, 0)).is_none());

        // Damage lands on the cells around the occupied one.
        assert_eq!(board.forecast.damage_at(0, 1, Point::new(2, 1)), 25);
        assert_eq!(board.forecast.damage_at(0, 1, Point::new(2, 0)), 0);
        assert_eq!(board.forecast.horizon(0), 3);
    }
}
