//! Founding new shipyards: deciding when another yard pays off and scoring
//! candidate sites.
//!
//! Site scoring sums nearby ore under a gaussian falloff, discounts ore
//! already served by existing yards, and penalizes crowding, distance and
//! enemy pressure. The chosen sites become an [`Expansion`] intent that
//! holds the founding yards until the convoy is assembled.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::board::{Shipyard, YardRef};
use crate::grid::Point;
use crate::intent::{Expansion, Intent, Session};
use crate::search::{closest_yards, ClosestYards};
use crate::turn::Turn;

/// Gaussian falloff width for site scoring.
const SITE_SIGMA: f64 = 4.0;
/// Founding sites must sit this close to a friendly yard.
const MIN_SITE_DISTANCE: u32 = 4;
const MAX_SITE_DISTANCE: u32 = 6;
/// Ore scores are rescaled so the best site lands here before penalties.
const BASELINE_SITE_SCORE: f64 = 5000.0;

/// A scored candidate site, bucketed under its closest friendly yard.
struct Site {
    anchor: String,
    point: Point,
    nearby_ore: f64,
    fixed_penalty: f64,
}

impl Site {
    fn score(&self) -> f64 {
        self.nearby_ore - self.fixed_penalty
    }
}

/// Plan new shipyards: pick the founding yards and sites and hand them to
/// the expansion intent, which launches as soon as each convoy is ready.
pub fn expand(turn: &mut Turn<'_>, session: &mut Session) {
    let wanted = need_more_shipyards(turn, session);
    if wanted == 0 {
        return;
    }
    info!(wanted, "planning new shipyards");

    let mut sites = score_sites(turn);
    sites.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let board = turn.board;
    let mut available: Vec<&Shipyard> = board
        .shipyards_of(turn.me)
        .filter(|sy| {
            board
                .incoming_hostile_fleets(turn.me, sy.pos)
                .next()
                .is_none()
        })
        .collect();

    let mut targets: HashMap<String, Point> = HashMap::new();
    for site in &sites {
        if targets.len() >= wanted as usize || available.is_empty() {
            break;
        }
        let Some(founder) = take_best_founder(&mut available, turn, site.point) else {
            break;
        };
        if turn.power(YardRef::Built(founder), 10) < i64::from(board.config.convert_cost) {
            continue;
        }
        targets.insert(founder.id.clone(), site.point);
    }

    if targets.is_empty() {
        return;
    }
    let extra_distance = match &session.intent {
        Intent::Expansion(e) => e.extra_distance,
        _ => 0,
    };
    info!(?targets, "starting expansion");
    let intent = Expansion {
        targets,
        extra_distance,
    };
    let mut self_built = std::mem::take(&mut session.self_built);
    session.intent = intent.act(turn, &mut self_built);
    session.self_built = self_built;
}

/// Pop the yard that can field a founding convoy at `site` soonest,
/// counting both travel time and garrison buildup.
fn take_best_founder<'a>(
    available: &mut Vec<&'a Shipyard>,
    turn: &Turn<'_>,
    site: Point,
) -> Option<&'a Shipyard> {
    let grid = &turn.board.grid;
    let idx = available
        .iter()
        .enumerate()
        .min_by_key(|(_, sy)| grid.distance(sy.pos, site) + turn.time_to_ships(sy, 63))
        .map(|(idx, _)| idx)?;
    Some(available.swap_remove(idx))
}

/// How many yards to found this turn; zero when expansion is off the table.
/// An expansion already in progress re-plans every turn.
fn need_more_shipyards(turn: &Turn<'_>, session: &mut Session) -> u32 {
    let board = turn.board;
    let me = turn.me;

    let op_positions: HashSet<Point> = board
        .all_yards()
        .filter(|y| y.owner() != me)
        .map(|y| y.pos())
        .collect();
    let attacking: u32 = board
        .fleets_of(me)
        .filter(|f| op_positions.contains(&f.route.end()))
        .map(|f| f.ships)
        .sum();
    let my_ships = board.ship_count(me).saturating_sub(attacking);
    if my_ships < 100 {
        return 0;
    }

    let op_ships = board
        .opponents_of(me)
        .iter()
        .map(|p| board.ship_count(p.id))
        .max()
        .unwrap_or(0);
    let stockpile: u32 = board
        .opponents_of(me)
        .first()
        .map_or(0, |opp| board.shipyards_of(opp.id).map(|sy| sy.ships).sum());
    if f64::from(stockpile) > 0.5 * f64::from(op_ships) {
        info!("enemy is stockpiling, not expanding");
        if matches!(session.intent, Intent::Expansion(_)) {
            session.intent = Intent::Idle;
        }
        return 0;
    }

    let my_yard_count = board.yards_of(me).count() as u32;
    if my_yard_count * 75 > my_ships {
        return 0;
    }
    if matches!(session.intent, Intent::Expansion(_)) {
        return 1;
    }
    if !session.intent.is_idle() {
        return 0;
    }

    let mut route_lengths: Vec<u32> = Vec::new();
    for yard in board.yards_of(me) {
        for f in board.incoming_allied_fleets(me, yard.pos()) {
            route_lengths.push(f.eta());
        }
    }
    if route_lengths.is_empty() {
        return 0;
    }
    let mean_distance =
        f64::from(route_lengths.iter().sum::<u32>()) / route_lengths.len() as f64;
    let capacity: u32 = board
        .shipyards_of(me)
        .map(|sy| sy.max_spawn().max(5))
        .sum();

    let scale = match board.steps_left() {
        s if s > 100 => 3.0,
        s if s > 50 => 4.0,
        s if s > 10 => 100.0,
        _ => 1000.0,
    };
    let ore = board.player(me).map_or(0.0, |p| p.ore);
    let mut needed = ore > scale * f64::from(capacity) * mean_distance;
    if my_yard_count == 1 && my_ships >= 150 {
        info!("enough ships for a first expansion");
        needed = true;
    }
    if !needed {
        return 0;
    }

    let current = board.shipyards_of(me).count() as u32;
    let expected = current
        + board
            .fleets_of(me)
            .filter(|f| f.route.plan().converts() || op_positions.contains(&f.route.end()))
            .count() as u32;
    let op_yard_count = board
        .opponents_of(me)
        .iter()
        .map(|p| board.yards_of(p.id).count() as u32)
        .max()
        .unwrap_or(0);
    if expected > op_yard_count && board.ship_count(me) < op_ships {
        return 0;
    }

    if current < 10 {
        return u32::from(expected <= current);
    }
    (5i64 - i64::from(expected) + i64::from(current)).max(0) as u32
}

/// Score every eligible cell and keep the best site per closest friendly
/// yard.
fn score_sites(turn: &Turn<'_>) -> Vec<Site> {
    let board = turn.board;
    let me = turn.me;
    let grid = &board.grid;

    let g = |a: Point, b: Point| -> f64 {
        let d = f64::from(grid.distance(a, b));
        (-0.5 * (d / SITE_SIGMA).powi(2)).exp()
    };

    let mut closest: HashMap<Point, ClosestYards<'_>> = HashMap::new();
    for p in grid.points() {
        closest.insert(p, closest_yards(board, me, p, true));
    }

    // Ore next to an existing yard is already being worked; discount it.
    let mut served_ore: HashMap<Point, f64> = HashMap::new();
    for p in grid.points() {
        let c = &closest[&p];
        let ore = grid.ore_at(p);
        let discounted = if c.friendly.is_some() {
            ore * (0.1 + 0.2 * f64::from(c.friendly_distance)).min(1.0)
        } else {
            ore
        };
        served_ore.insert(p, discounted);
    }

    let closer_bonus = |x: Point, p: Point| -> f64 {
        let c = &closest[&x];
        let f = f64::from(c.friendly_distance);
        let e = f64::from(c.enemy_distance);
        let new = f64::from(grid.distance(x, p)).min(f);
        let old_diff = (e - f).max(1.0);
        let new_diff = (e - new).max(1.0);
        if new_diff <= old_diff {
            1.0
        } else {
            1.0 + 2.0 * (new_diff / old_diff) / SITE_SIGMA
        }
    };

    let my_yards: Vec<YardRef<'_>> = board.yards_of(me).collect();
    let num_yards = my_yards.len();
    let total_ore = grid.total_ore();

    let mut sites: Vec<Site> = Vec::new();
    for p in grid.points() {
        if grid.ore_at(p) > 100.0 || grid.ore_at(p) > total_ore * 0.01 {
            continue;
        }
        // Three yards in a line cannot reinforce each other: every minimal
        // route between them runs along the same file.
        if num_yards == 2
            && (my_yards.iter().all(|y| y.pos().x == p.x)
                || my_yards.iter().all(|y| y.pos().y == p.y))
        {
            continue;
        }

        let c = &closest[&p];
        let friendly_closer = c.friendly_distance < c.enemy_distance;
        let min_distance = c.friendly_distance.min(c.enemy_distance);
        if !friendly_closer
            || c.friendly.is_none()
            || min_distance < MIN_SITE_DISTANCE
            || min_distance > MAX_SITE_DISTANCE
        {
            continue;
        }
        let f_dist = c.friendly_distance;
        let e_dist = c.enemy_distance;
        let dist_diff = i64::from(e_dist) - i64::from(f_dist);

        let nearby_ore: f64 = grid
            .nearby(p, 10)
            .into_iter()
            .map(|x| served_ore[&x].powf(1.1) * g(p, x) * closer_bonus(x, p))
            .sum();

        let crowding = board
            .all_yards()
            .filter(|y| grid.distance(y.pos(), p) < 5)
            .count() as f64;
        let shipyard_penalty = 100.0 * crowding;
        let distance_penalty = 50.0 * f64::from(min_distance);

        let mut enemy_penalty = if dist_diff >= 9 {
            0.0
        } else {
            let pressure = turn.risk_at(p, i64::from(f_dist + 3 + e_dist / 2));
            3.0 * f64::from(pressure) * (9 - dist_diff) as f64
        };

        let avg_dist_penalty = if num_yards == 0 {
            0.0
        } else {
            let sum: f64 = my_yards
                .iter()
                .map(|y| f64::from(grid.distance(y.pos(), p)).powf(1.5))
                .sum();
            10.0 * sum / num_yards as f64
        };

        // A site we cannot out-reinforce is a gift to the enemy.
        let risk = turn.risk_at(p, i64::from(f_dist + e_dist + 3));
        let help = i64::from(turn.opponent_view_risk_at(p, i64::from(f_dist + e_dist / 2))) - 50;
        if f64::from(risk) > help as f64 * 1.5 {
            enemy_penalty += enemy_penalty.max(1000.0);
        }

        let anchor = match c.friendly {
            Some(yard) => yard.id().to_string(),
            None => continue,
        };
        sites.push(Site {
            anchor,
            point: p,
            nearby_ore,
            fixed_penalty: shipyard_penalty + distance_penalty + enemy_penalty + avg_dist_penalty,
        });
    }

    // Rescale ore scores to a fixed baseline so the penalties keep a
    // consistent weight across boards.
    let max_ore = sites
        .iter()
        .map(|s| s.nearby_ore)
        .fold(1.0f64, f64::max);
    for site in &mut sites {
        site.nearby_ore *= BASELINE_SITE_SCORE / max_ore;
    }

    // One candidate per anchoring yard: its best-scoring site.
    let mut best_per_anchor: HashMap<String, Site> = HashMap::new();
    for site in sites {
        match best_per_anchor.get(&site.anchor) {
            Some(prev) if prev.score() >= site.score() => {}
            _ => {
                best_per_anchor.insert(site.anchor.clone(), site);
            }
        }
    }
    best_per_anchor.into_values().collect()
}
