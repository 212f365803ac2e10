//! Route search: finding launchable routes that survive the forecast.
//!
//! All searches share one shape: enumerate via-cell candidates, expand them
//! to concrete plans, gate on the fleet-size law and then drop any route
//! the forecast predicts would be intercepted. Scoring and sizing are the
//! calling pass's business.

use std::collections::{HashMap, HashSet};

use crate::board::{Board, PlayerId, Shipyard, YardRef};
use crate::grid::{Point, DIRECTIONS};
use crate::plan::{plans_through, Plan};
use crate::route::{MiningRoute, Route};

/// Knobs for [`find_shortcut_routes`].
#[derive(Debug, Clone)]
pub struct RouteQuery {
    /// Also avoid cells under predicted enemy splash damage.
    pub safety: bool,
    /// Permit routes crossing shipyard cells mid-flight.
    pub allow_shipyard_intercept: bool,
    /// Exact route length to enumerate; defaults to the direct distance.
    pub route_distance: Option<u32>,
    /// Upper length bound; overrides the exact-distance rule when set.
    pub max_route_distance: Option<u32>,
    /// Tolerate crossing fleets that are themselves headed for the target.
    pub allow_join: bool,
}

impl Default for RouteQuery {
    fn default() -> Self {
        Self {
            safety: true,
            allow_shipyard_intercept: false,
            route_distance: None,
            max_route_distance: None,
            allow_join: false,
        }
    }
}

/// Whether the forecast predicts this route would run into anything before
/// its final cell: a shipyard (unless allowed), any predicted fleet (unless
/// it is headed for `allowed_join_point`), or, with `safety`, a cell under
/// enemy splash damage.
#[must_use]
pub fn is_intercept_route(
    route: &Route,
    board: &Board,
    me: PlayerId,
    safety: bool,
    allow_shipyard_intercept: bool,
    allowed_join_point: Option<Point>,
) -> bool {
    let mut yard_points: HashSet<Point> = HashSet::new();
    let mut pending_points: HashMap<Point, u32> = HashMap::new();
    if !allow_shipyard_intercept {
        yard_points.extend(board.shipyards.iter().map(|sy| sy.pos));
        pending_points.extend(
            board
                .pending_shipyards
                .iter()
                .map(|sy| (sy.pos, sy.time_to_build)),
        );
    }

    let points = route.points();
    if points.is_empty() {
        return false;
    }
    for (t, &point) in points[..points.len() - 1].iter().enumerate() {
        let t = t as u32;
        if yard_points.contains(&point) {
            return true;
        }
        if pending_points.get(&point).is_some_and(|&ttb| ttb <= t) {
            return true;
        }
        for pl in &board.players {
            if let Some(stamp) = board.forecast.fleet_at(pl.id, t, point) {
                if allowed_join_point.map_or(true, |join| stamp.end != join) {
                    return true;
                }
            }
            if safety && pl.id != me && board.forecast.damage_at(pl.id, t, point) > 0 {
                return true;
            }
        }
    }
    false
}

/// Enumerate safe minimal (or bounded) routes from `start` to `end` for a
/// fleet of `num_ships`: every cell acts as a via point, both leg orderings
/// are tried, and each candidate is gated on fleet size and interception.
#[must_use]
pub fn find_shortcut_routes(
    board: &Board,
    me: PlayerId,
    start: Point,
    end: Point,
    num_ships: u32,
    query: &RouteQuery,
) -> Vec<Route> {
    let route_distance = query
        .route_distance
        .unwrap_or_else(|| board.grid.distance(start, end));
    let mut routes = Vec::new();
    for p in board.grid.points() {
        let distance = board.grid.distance(start, p) + board.grid.distance(p, end);
        match query.max_route_distance {
            None if distance != route_distance => continue,
            Some(max) if distance > max => continue,
            _ => {}
        }

        for plan in plans_through(&board.grid, start, &[p, end]) {
            if num_ships < plan.min_fleet_size() {
                continue;
            }
            let route = Route::new(&board.grid, start, plan, 0);
            if is_intercept_route(
                &route,
                board,
                me,
                query.safety,
                query.allow_shipyard_intercept,
                if query.allow_join { Some(end) } else { None },
            ) {
                continue;
            }
            routes.push(route);
        }
    }
    routes
}

/// Whether a conversion route stays clear the whole way and the target cell
/// stays free of enemy fleets after the yard would be built. Own fleets
/// larger than the convoy also block it.
#[must_use]
pub fn is_safety_route_to_convert(
    route_points: &[Point],
    board: &Board,
    me: PlayerId,
    num_ships: u32,
) -> bool {
    let Some(&target_point) = route_points.last() else {
        return false;
    };
    let target_time = route_points.len() as u32;
    for pl in board.opponents_of(me) {
        for t in target_time..board.forecast.horizon(pl.id) {
            if board.forecast.fleet_at(pl.id, t, target_point).is_some() {
                return false;
            }
        }
    }

    let yard_points: HashSet<Point> = board.shipyards.iter().map(|sy| sy.pos).collect();
    let pending_points: HashMap<Point, u32> = board
        .pending_shipyards
        .iter()
        .map(|sy| (sy.pos, sy.time_to_build))
        .collect();

    for (t, &point) in route_points.iter().enumerate() {
        let t = t as u32;
        if yard_points.contains(&point) {
            return false;
        }
        if pending_points.get(&point).is_some_and(|&ttb| ttb <= t) {
            return false;
        }
        for pl in &board.players {
            let is_enemy = pl.id != me;
            if let Some(stamp) = board.forecast.fleet_at(pl.id, t, point) {
                if is_enemy || stamp.ships > num_ships {
                    return false;
                }
            }
            if is_enemy && board.forecast.damage_at(pl.id, t, point) > 0 {
                return false;
            }
        }
    }
    true
}

/// Re-walk every other fleet along `route` and flag contact with any fleet
/// or adjacency to a hostile one, ignoring the fleet being attacked.
#[must_use]
pub fn is_intercept_direct_attack_route(
    route: &Route,
    board: &Board,
    me: PlayerId,
    target_fleet_id: &str,
) -> bool {
    let points = route.points();
    if points.is_empty() {
        return false;
    }
    for (t, &point) in points[..points.len() - 1].iter().enumerate() {
        for fleet in &board.fleets {
            if fleet.id == target_fleet_id {
                continue;
            }
            let Some(&fleet_point) = fleet.route.points().get(t) else {
                continue;
            };
            if fleet_point == point {
                return true;
            }
            if fleet.owner != me && board.grid.adjacent(fleet_point).contains(&point) {
                return true;
            }
        }
    }
    false
}

/// The nearest friendly and enemy yards to a cell.
#[derive(Debug, Clone, Copy)]
pub struct ClosestYards<'a> {
    /// Nearest yard of the querying player.
    pub friendly: Option<YardRef<'a>>,
    /// Nearest yard of any other player.
    pub enemy: Option<YardRef<'a>>,
    /// Distance to `friendly`, or `100000` when there is none.
    pub friendly_distance: u32,
    /// Distance to `enemy`, or `100000` when there is none.
    pub enemy_distance: u32,
}

/// Find the closest friendly and enemy yards to `p`, optionally counting
/// yards still under construction.
#[must_use]
pub fn closest_yards<'a>(
    board: &'a Board,
    me: PlayerId,
    p: Point,
    include_pending: bool,
) -> ClosestYards<'a> {
    let mut closest = ClosestYards {
        friendly: None,
        enemy: None,
        friendly_distance: 100_000,
        enemy_distance: 100_000,
    };
    let yards: Vec<YardRef<'a>> = if include_pending {
        board.all_yards().collect()
    } else {
        board.shipyards.iter().map(YardRef::Built).collect()
    };
    for yard in yards {
        let distance = board.grid.distance(yard.pos(), p);
        if yard.owner() == me {
            if distance < closest.friendly_distance {
                closest.friendly = Some(yard);
                closest.friendly_distance = distance;
            }
        } else if distance < closest.enemy_distance {
            closest.enemy = Some(yard);
            closest.enemy_distance = distance;
        }
    }
    closest
}

/// Build the most lucrative minimal plan through `waypoints`: each leg
/// picks whichever axis ordering harvests more, evaluated with a nominal
/// fleet at the leg's actual departure time.
#[must_use]
pub fn greedy_mining_plan(board: &Board, waypoints: &[Point]) -> Plan {
    let mut plan = Plan::new();
    let Some((&first, rest)) = waypoints.split_first() else {
        return plan;
    };
    let mut last = first;
    for &p in rest {
        let elapsed = plan.num_steps();
        let best = plans_through(&board.grid, last, &[p])
            .into_iter()
            .map(|leg| {
                let ore = Route::new(&board.grid, last, leg.clone(), elapsed).expected_ore(board, 20);
                (ore, leg)
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, leg)) = best {
            plan = plan.join(&leg);
        }
        last = p;
    }
    plan
}

/// Candidate mining loops from `yard` out to `max_distance` and back to the
/// nearest fit destination yard.
///
/// Every nearby cell becomes a via point; with `use_second_points` a second
/// via from the first one's 3x3 block refines the sweep and the leg plans
/// are chosen greedily by expected ore. Destinations under siege are
/// skipped, and a yard still under construction counts when it will exist
/// by the time the fleet gets there. `time_to_ships` supplies the wait
/// until the yard can field a given fleet size.
#[must_use]
pub fn find_mining_routes(
    board: &Board,
    yard: &Shipyard,
    safety: bool,
    max_distance: u16,
    use_second_points: bool,
    time_to_ships: impl Fn(u32) -> u32,
) -> Vec<MiningRoute> {
    if max_distance < 1 {
        return Vec::new();
    }
    let me = yard.owner;
    let departure = yard.pos;

    let besieged = |pos: Point, garrison: u32| {
        let siege: u32 = board
            .incoming_hostile_fleets(me, pos)
            .map(|f| f.ships)
            .sum();
        siege >= garrison
    };
    let built: Vec<Point> = board
        .shipyards_of(me)
        .filter(|sy| !besieged(sy.pos, sy.ships))
        .map(|sy| sy.pos)
        .collect();
    let pending: Vec<(Point, u32)> = board
        .pending_of(me)
        .filter(|sy| !besieged(sy.pos, sy.ships(&board.config)))
        .map(|sy| (sy.pos, sy.time_to_build))
        .collect();
    if built.is_empty() {
        return Vec::new();
    }

    let nearest_built = |to: Point| -> Point {
        built
            .iter()
            .copied()
            .min_by_key(|&d| board.grid.distance(to, d))
            .unwrap_or(departure)
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut routes = Vec::new();
    let mut push_route = |routes: &mut Vec<MiningRoute>, seen: &mut HashSet<String>, plan: Plan| {
        let wait = time_to_ships(plan.min_fleet_size());
        let route = MiningRoute::new(Route::new(&board.grid, departure, plan, 0), wait);
        if !seen.insert(route.route.plan().to_string()) {
            return;
        }
        if is_intercept_route(&route.route, board, me, safety, false, None) {
            return;
        }
        routes.push(route);
    };

    if use_second_points {
        for c in board.grid.nearby(departure, max_distance) {
            if c == departure || built.contains(&c) {
                continue;
            }
            for adj in board.grid.block9(c) {
                if adj == departure || built.contains(&adj) {
                    continue;
                }
                let vias: Vec<Point> = if adj == c { vec![c] } else { vec![c, adj] };
                let tail = *vias.last().unwrap_or(&c);
                let mut dist_through = board.grid.distance(departure, vias[0]);
                for pair in vias.windows(2) {
                    dist_through += board.grid.distance(pair[0], pair[1]);
                }

                let mut dest = nearest_built(tail);
                let reachable = pending
                    .iter()
                    .filter(|(pp, ttb)| *ttb <= dist_through + board.grid.distance(*pp, tail))
                    .min_by_key(|(pp, _)| board.grid.distance(*pp, tail));
                if let Some(&(pp, _)) = reachable {
                    if pp != c
                        && pp != adj
                        && board.grid.distance(pp, tail) < board.grid.distance(dest, tail)
                    {
                        dest = pp;
                    }
                }

                let mut waypoints = vec![departure];
                waypoints.extend(&vias);
                waypoints.push(dest);
                let plan = greedy_mining_plan(board, &waypoints);
                push_route(&mut routes, &mut seen, plan);
            }
        }
    } else {
        for c in board.grid.nearby(departure, max_distance) {
            if c == departure || built.contains(&c) {
                continue;
            }
            let mut dest = nearest_built(c);
            let reachable = pending
                .iter()
                .filter(|(pp, ttb)| {
                    *ttb <= board.grid.distance(*pp, c) + board.grid.distance(departure, c)
                })
                .min_by_key(|(pp, _)| board.grid.distance(c, *pp));
            if let Some(&(pp, _)) = reachable {
                if board.grid.distance(pp, c) < board.grid.distance(dest, c) {
                    dest = pp;
                }
            }
            for plan in plans_through(&board.grid, departure, &[c, dest]) {
                push_route(&mut routes, &mut seen, plan);
            }
        }
    }

    // Via enumeration only composes minimal legs, so loops that retrace or
    // circle back to the departure cell never come out of it. Union in the
    // fixed-shape candidates.
    for plan in template_plans(max_distance) {
        push_route(&mut routes, &mut seen, plan);
    }

    routes
}

/// Fixed-shape loop plans anchored at the departure cell: out-and-back
/// lines and full rectangles, every orientation, total length capped at
/// `2 * max_distance` to match the reach of the via enumeration.
fn template_plans(max_distance: u16) -> Vec<Plan> {
    let mut plans = Vec::new();
    for dir in DIRECTIONS {
        for len in 1..=max_distance {
            let mut line = Plan::new();
            line.push(dir, len);
            line.push(dir.opposite(), len);
            plans.push(line);
        }

        let side = dir.rotate_cw();
        for w in 1..max_distance {
            for h in 1..=(max_distance - w) {
                let mut rect = Plan::new();
                rect.push(dir, w);
                rect.push(side, h);
                rect.push(dir.opposite(), w);
                rect.push(side.opposite(), h);
                plans.push(rect);
            }
        }
    }
    plans
}
