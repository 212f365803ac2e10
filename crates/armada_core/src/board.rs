//! The per-turn board snapshot and its entities.
//!
//! A [`Board`] is rebuilt from scratch every turn from the harness
//! observation and is immutable for the turn. Cross-turn identity is
//! carried only by stable entity ids; anything that must survive between
//! turns stores ids and re-resolves them against the next snapshot.
//!
//! Construction runs the forecast simulator once, truncating every fleet's
//! committed route at its predicted end (arrival, merge, destruction or
//! conversion) and recording the expected occupancy/damage maps that the
//! risk and search layers query.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::forecast::{self, Forecast};
use crate::grid::{Direction, Grid, Point};
use crate::route::Route;

/// Game rule constants delivered with the first observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Torus edge length.
    pub size: u16,
    /// Total turns in an episode.
    pub episode_steps: u32,
    /// Ore cost of spawning one ship.
    pub spawn_cost: f64,
    /// Ships consumed by converting a fleet into a shipyard.
    pub convert_cost: u32,
    /// Per-turn multiplicative ore regeneration rate.
    pub regen_rate: f64,
    /// Ore ceiling per cell.
    pub max_cell_ore: f64,
    /// Wall-clock budget per turn, seconds.
    pub act_timeout: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: 21,
            episode_steps: 400,
            spawn_cost: 10.0,
            convert_cost: 50,
            regen_rate: 0.02,
            max_cell_ore: 500.0,
            act_timeout: 3.0,
        }
    }
}

/// Shipyard spawn-capacity ladder: a yard controlled for at least
/// `SPAWN_LADDER[i]` turns can spawn `i + 2` ships per turn.
const SPAWN_LADDER: [u32; 9] = [2, 7, 17, 34, 60, 97, 147, 212, 294];

/// Maximum ships a shipyard may spawn in one turn, by turns controlled.
#[must_use]
pub fn max_ships_to_spawn(turns_controlled: u32) -> u32 {
    for (idx, &threshold) in SPAWN_LADDER.iter().enumerate() {
        if turns_controlled < threshold {
            return idx as u32 + 1;
        }
    }
    SPAWN_LADDER.len() as u32 + 1
}

/// Fraction of a cell's ore collected per visit by a fleet of `ships`.
#[must_use]
pub fn collection_rate(ships: u32) -> f64 {
    if ships == 0 {
        return 0.0;
    }
    (f64::from(ships).ln() / 20.0).min(0.99)
}

/// Stable player identifier from the observation.
pub type PlayerId = usize;

/// A player's per-turn aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Stable player id.
    pub id: PlayerId,
    /// Ore bank.
    pub ore: f64,
}

/// A stationary shipyard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipyard {
    /// Stable id from the observation.
    pub id: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Cell the yard occupies.
    pub pos: Point,
    /// Docked ships.
    pub ships: u32,
    /// Turns this yard has been held by its current owner.
    pub turns_controlled: u32,
}

impl Shipyard {
    /// Maximum ships this yard can spawn this turn.
    #[must_use]
    pub fn max_spawn(&self) -> u32 {
        max_ships_to_spawn(self.turns_controlled)
    }
}

/// A shipyard that does not exist yet but is guaranteed by an en-route
/// conversion order. Disappears when the real yard materializes or the
/// founding fleet dies first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingShipyard {
    /// Id of the founding fleet.
    pub id: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Cell where the yard will be built.
    pub pos: Point,
    /// Turns until the yard exists.
    pub time_to_build: u32,
    /// Ship count of the founding fleet.
    pub fleet_power: u32,
}

impl PendingShipyard {
    /// Ships that will garrison the yard once built (founding fleet minus
    /// the conversion cost).
    #[must_use]
    pub fn ships(&self, config: &GameConfig) -> u32 {
        self.fleet_power.saturating_sub(config.convert_cost)
    }
}

/// A mobile fleet following a committed route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fleet {
    /// Stable id from the observation.
    pub id: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Current cell.
    pub pos: Point,
    /// Ship count, always positive.
    pub ships: u32,
    /// Ore carried.
    pub cargo: f64,
    /// Current heading.
    pub heading: Direction,
    /// Committed route (truncated to the forecast prediction after board
    /// construction).
    pub route: Route,
}

impl Fleet {
    /// Turns until the fleet reaches the end of its predicted route.
    #[must_use]
    pub fn eta(&self) -> u32 {
        self.route.len()
    }

    /// This fleet's per-cell collection rate.
    #[must_use]
    pub fn collection_rate(&self) -> f64 {
        collection_rate(self.ships)
    }

    /// Cargo plus the expected harvest over the remaining route.
    #[must_use]
    pub fn expected_ore(&self, board: &Board) -> f64 {
        self.cargo + self.route.expected_ore(board, self.ships)
    }

    /// Ore it would cost to rebuild this fleet.
    #[must_use]
    pub fn cost(&self, config: &GameConfig) -> f64 {
        config.spawn_cost * f64::from(self.ships)
    }

    /// Expected ore delivered per ore invested.
    #[must_use]
    pub fn expected_value(&self, board: &Board) -> f64 {
        self.expected_ore(board) / self.cost(&board.config)
    }

    /// Engagement ranking: ship count, then cargo, then stable id.
    /// The higher-ranked fleet survives merges and collisions.
    #[must_use]
    pub fn rank_cmp(&self, other: &Fleet) -> Ordering {
        self.ships
            .cmp(&other.ships)
            .then_with(|| self.cargo.total_cmp(&other.cargo))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A shipyard's assigned command for the turn.
///
/// Only `Spawn` and `Launch` encode to game commands; the rest are internal
/// markers that keep later decision passes from re-tasking the yard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShipyardAction {
    /// Build this many new ships.
    Spawn(u32),
    /// Launch `ships` on `route`.
    Launch {
        /// Ships committed to the launch.
        ships: u32,
        /// The committed route.
        route: Route,
    },
    /// Deliberately do nothing this turn.
    Hold,
    /// No commitment, but a later mining pass may launch a short route.
    AllowMine {
        /// Mining distance ceiling while this marker holds.
        max_distance: u16,
        /// The yard the mining run must return toward.
        target: Point,
        /// Turns the relaxation stays meaningful.
        max_time: u32,
    },
    /// The yard is about to fall and nothing can hold it; freeze it.
    EmergencyHold,
}

impl ShipyardAction {
    /// Whether this action may still be replaced by the mining pass.
    #[must_use]
    pub const fn is_replaceable(&self) -> bool {
        matches!(self, ShipyardAction::AllowMine { .. })
    }
}

/// Either a built or a pending shipyard, viewed uniformly.
#[derive(Debug, Clone, Copy)]
pub enum YardRef<'a> {
    /// An existing shipyard.
    Built(&'a Shipyard),
    /// A conversion still in flight.
    Pending(&'a PendingShipyard),
}

impl<'a> YardRef<'a> {
    /// Stable id.
    #[must_use]
    pub fn id(&self) -> &'a str {
        match self {
            YardRef::Built(sy) => &sy.id,
            YardRef::Pending(sy) => &sy.id,
        }
    }

    /// Cell occupied (or to be occupied).
    #[must_use]
    pub fn pos(&self) -> Point {
        match self {
            YardRef::Built(sy) => sy.pos,
            YardRef::Pending(sy) => sy.pos,
        }
    }

    /// Owning player.
    #[must_use]
    pub fn owner(&self) -> PlayerId {
        match self {
            YardRef::Built(sy) => sy.owner,
            YardRef::Pending(sy) => sy.owner,
        }
    }

    /// Current (or projected initial) garrison.
    #[must_use]
    pub fn ships(&self, config: &GameConfig) -> u32 {
        match self {
            YardRef::Built(sy) => sy.ships,
            YardRef::Pending(sy) => sy.ships(config),
        }
    }

    /// Turns until the yard exists; zero for built yards.
    #[must_use]
    pub fn time_to_build(&self) -> u32 {
        match self {
            YardRef::Built(_) => 0,
            YardRef::Pending(sy) => sy.time_to_build,
        }
    }

    /// Turns controlled; negative for yards not yet built.
    #[must_use]
    pub fn turns_controlled(&self) -> i64 {
        match self {
            YardRef::Built(sy) => i64::from(sy.turns_controlled),
            YardRef::Pending(sy) => -i64::from(sy.time_to_build),
        }
    }

    /// Whether a fleet departing `from` could arrive after the yard exists.
    #[must_use]
    pub fn reachable_from(&self, grid: &Grid, from: Point) -> bool {
        match self {
            YardRef::Built(_) => true,
            YardRef::Pending(sy) => sy.time_to_build <= grid.distance(sy.pos, from),
        }
    }
}

/// One turn's immutable world snapshot.
#[derive(Debug, Clone)]
pub struct Board {
    /// Rule constants.
    pub config: GameConfig,
    /// Current turn number.
    pub step: u32,
    /// The torus with per-cell ore.
    pub grid: Grid,
    /// Active players.
    pub players: Vec<Player>,
    /// All shipyards, every owner.
    pub shipyards: Vec<Shipyard>,
    /// All pending shipyards, every owner.
    pub pending_shipyards: Vec<PendingShipyard>,
    /// All fleets, every owner, with forecast-truncated routes.
    pub fleets: Vec<Fleet>,
    /// The forecast simulator's output for this snapshot.
    pub forecast: Forecast,
}

impl Board {
    /// Assemble a snapshot. Derives pending shipyards from committed convert
    /// plans, runs the forecast simulator and truncates fleet routes to
    /// their predicted extent. Players with no remaining presence are
    /// dropped.
    #[must_use]
    pub fn new(
        config: GameConfig,
        step: u32,
        grid: Grid,
        players: Vec<Player>,
        shipyards: Vec<Shipyard>,
        mut fleets: Vec<Fleet>,
    ) -> Self {
        // Pending shipyards come from the full committed plans, before the
        // forecast truncates anything: the order stands even if the fleet is
        // predicted to die on the way.
        let pending_shipyards: Vec<PendingShipyard> = fleets
            .iter()
            .filter(|f| f.route.plan().converts())
            .map(|f| PendingShipyard {
                id: f.id.clone(),
                owner: f.owner,
                pos: f.route.end(),
                time_to_build: f.route.len() + 1,
                fleet_power: f.ships,
            })
            .collect();

        let forecast = forecast::simulate(&grid, &shipyards, &mut fleets);

        let players = players
            .into_iter()
            .filter(|p| {
                shipyards.iter().any(|sy| sy.owner == p.id)
                    || pending_shipyards.iter().any(|sy| sy.owner == p.id)
                    || fleets.iter().any(|f| f.owner == p.id)
            })
            .collect();

        Self {
            config,
            step,
            grid,
            players,
            shipyards,
            pending_shipyards,
            fleets,
            forecast,
        }
    }

    /// Turns remaining after this one.
    #[must_use]
    pub fn steps_left(&self) -> u32 {
        self.config.episode_steps.saturating_sub(self.step + 1)
    }

    /// Look up a player by id.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Active players other than `me`.
    #[must_use]
    pub fn opponents_of(&self, me: PlayerId) -> Vec<&Player> {
        self.players.iter().filter(|p| p.id != me).collect()
    }

    /// Resolve a shipyard id against this turn's snapshot.
    #[must_use]
    pub fn shipyard(&self, id: &str) -> Option<&Shipyard> {
        self.shipyards.iter().find(|sy| sy.id == id)
    }

    /// Resolve a fleet id against this turn's snapshot.
    #[must_use]
    pub fn fleet(&self, id: &str) -> Option<&Fleet> {
        self.fleets.iter().find(|f| f.id == id)
    }

    /// Shipyards owned by `player`.
    pub fn shipyards_of(&self, player: PlayerId) -> impl Iterator<Item = &Shipyard> {
        self.shipyards.iter().filter(move |sy| sy.owner == player)
    }

    /// Pending shipyards owned by `player`.
    pub fn pending_of(&self, player: PlayerId) -> impl Iterator<Item = &PendingShipyard> {
        self.pending_shipyards
            .iter()
            .filter(move |sy| sy.owner == player)
    }

    /// Fleets owned by `player`.
    pub fn fleets_of(&self, player: PlayerId) -> impl Iterator<Item = &Fleet> {
        self.fleets.iter().filter(move |f| f.owner == player)
    }

    /// Built and pending shipyards owned by `player`.
    pub fn yards_of(&self, player: PlayerId) -> impl Iterator<Item = YardRef<'_>> {
        self.shipyards_of(player)
            .map(YardRef::Built)
            .chain(self.pending_of(player).map(YardRef::Pending))
    }

    /// Every built and pending shipyard on the board.
    pub fn all_yards(&self) -> impl Iterator<Item = YardRef<'_>> {
        self.shipyards
            .iter()
            .map(YardRef::Built)
            .chain(self.pending_shipyards.iter().map(YardRef::Pending))
    }

    /// Total ships a player fields (fleets plus docked garrisons).
    #[must_use]
    pub fn ship_count(&self, player: PlayerId) -> u32 {
        self.fleets_of(player).map(|f| f.ships).sum::<u32>()
            + self.shipyards_of(player).map(|sy| sy.ships).sum::<u32>()
    }

    /// Sum of per-turn spawn capacity over a player's built yards.
    #[must_use]
    pub fn production_capacity(&self, player: PlayerId) -> u32 {
        self.shipyards_of(player).map(|sy| sy.max_spawn()).sum()
    }

    /// Fleets of `owner` whose predicted route ends at `pos`.
    pub fn incoming_allied_fleets(
        &self,
        owner: PlayerId,
        pos: Point,
    ) -> impl Iterator<Item = &Fleet> {
        self.fleets
            .iter()
            .filter(move |f| f.owner == owner && f.route.end() == pos)
    }

    /// Fleets of other owners whose predicted route ends at `pos`.
    pub fn incoming_hostile_fleets(
        &self,
        owner: PlayerId,
        pos: Point,
    ) -> impl Iterator<Item = &Fleet> {
        self.fleets
            .iter()
            .filter(move |f| f.owner != owner && f.route.end() == pos)
    }

    /// Sum of cargo held by a player's fleets.
    #[must_use]
    pub fn fleet_ore(&self, player: PlayerId) -> f64 {
        self.fleets_of(player).map(|f| f.cargo).sum()
    }

    /// Sum of expected delivered ore over a player's fleets.
    #[must_use]
    pub fn fleet_expected_ore(&self, player: PlayerId) -> f64 {
        self.fleets_of(player).map(|f| f.expected_ore(self)).sum()
    }
}

/// Projected garrison and spawn activity of one shipyard over the coming
/// turns, assuming scheduled arrivals happen and the owner spawns as hard
/// as their ore income allows.
#[derive(Debug, Clone)]
pub struct YardProjection {
    /// Garrison per future turn, reinforcements applied, that turn's spawn
    /// not yet. Negative when scheduled hostile arrivals overwhelm it.
    pub ship_counts: Vec<i64>,
    /// Cumulative count of turns with neither a reinforcement nor an
    /// affordable spawn, indexed by turn. Empty for pending yards.
    pub idle_turns: Vec<u32>,
}

impl YardProjection {
    /// Projected garrison at `time`, clamped to the projection horizon.
    #[must_use]
    pub fn power_at(&self, time: i64) -> i64 {
        if time < 0 {
            return 0;
        }
        match self.ship_counts.get(time as usize) {
            Some(&count) => count,
            None => self.ship_counts.last().copied().unwrap_or(0),
        }
    }

    /// Idle turns accumulated before `turn`.
    #[must_use]
    pub fn idle_before(&self, turn: i64) -> u32 {
        if turn < 0 {
            return 0;
        }
        match self.idle_turns.get(turn as usize) {
            Some(&idle) => idle,
            None => self.idle_turns.last().copied().unwrap_or(0),
        }
    }

    /// First turn the garrison reaches `ships`; `10000` when it never does
    /// within the horizon.
    #[must_use]
    pub fn time_to_ships(&self, ships: i64) -> u32 {
        for (t, &count) in self.ship_counts.iter().enumerate() {
            if count >= ships {
                return t as u32;
            }
        }
        10_000
    }
}

impl Board {
    /// Expected ore income per future turn for `player`: the expected
    /// delivery of every fleet headed home, booked at its arrival turn.
    fn fleet_income(&self, player: PlayerId) -> std::collections::HashMap<u32, f64> {
        let home: std::collections::HashSet<Point> =
            self.yards_of(player).map(|y| y.pos()).collect();
        let mut income = std::collections::HashMap::new();
        for f in self.fleets_of(player) {
            if home.contains(&f.route.end()) {
                *income.entry(f.eta()).or_insert(0.0) += f.expected_ore(self);
            }
        }
        income
    }

    /// Project a yard's garrison over the next `size + 1` turns.
    ///
    /// Scheduled allied arrivals add, hostile arrivals subtract, and every
    /// turn the owner spawns as many ships as bank plus booked income
    /// affords, up to the yard's capacity. Pending yards contribute nothing
    /// until built and their founding fleet is not double counted.
    #[must_use]
    pub fn project_yard(&self, yard: YardRef<'_>) -> YardProjection {
        let owner = yard.owner();
        let pos = yard.pos();
        let income = self.fleet_income(owner);
        let spawn_cost = self.config.spawn_cost;

        let mut reinforcements: std::collections::HashMap<u32, i64> =
            std::collections::HashMap::new();
        let mut allied_arrivals: std::collections::HashMap<u32, i64> =
            std::collections::HashMap::new();
        for f in &self.fleets {
            if f.route.end() != pos {
                continue;
            }
            if f.owner == owner {
                if matches!(yard, YardRef::Pending(sy) if sy.id == f.id) {
                    continue;
                }
                *reinforcements.entry(f.eta()).or_insert(0) += i64::from(f.ships);
                *allied_arrivals.entry(f.eta()).or_insert(0) += i64::from(f.ships);
            } else {
                *reinforcements.entry(f.eta()).or_insert(0) -= i64::from(f.ships);
            }
        }

        let bank = self.player(owner).map_or(0.0, |p| p.ore);
        let time_to_build = yard.time_to_build();
        let turns_controlled = yard.turns_controlled();
        let horizon = u32::from(self.grid.size());

        let mut ore = bank;
        let mut ships = i64::from(yard.ships(&self.config));
        let mut ship_counts = Vec::with_capacity(horizon as usize + 1);
        for t in 0..=horizon {
            if t < time_to_build {
                ship_counts.push(0);
                continue;
            }
            ships += reinforcements.get(&t).copied().unwrap_or(0);
            ship_counts.push(ships);
            ore += income.get(&t).copied().unwrap_or(0.0);

            let age = (i64::from(t) + turns_controlled).max(0) as u32;
            let can_spawn = i64::from(max_ships_to_spawn(age));
            let spawn = ((ore / spawn_cost).floor() as i64).clamp(0, can_spawn);
            ore -= spawn as f64 * spawn_cost;
            ships += spawn;
        }

        let mut idle_turns = Vec::new();
        if matches!(yard, YardRef::Built(_)) {
            let mut ore = bank;
            let mut idle = 0u32;
            idle_turns.push(idle);
            for t in 1..=2 * horizon {
                ore += income.get(&t).copied().unwrap_or(0.0);
                let age = (i64::from(t) + turns_controlled).max(0) as u32;
                let can_spawn = i64::from(max_ships_to_spawn(age));
                let spawn = ((ore / spawn_cost).floor() as i64).clamp(0, can_spawn);
                if allied_arrivals.get(&t).copied().unwrap_or(0) == 0 && spawn == 0 {
                    idle += 1;
                }
                ore -= spawn as f64 * spawn_cost;
                idle_turns.push(idle);
            }
        }

        YardProjection {
            ship_counts,
            idle_turns,
        }
    }

    /// Launch directions unavailable at each future turn: the cell an
    /// allied fleet arrives from is blocked on the turn before it docks.
    #[must_use]
    pub fn blocked_launch_dirs(
        &self,
        yard: &Shipyard,
    ) -> std::collections::HashMap<u32, Vec<Direction>> {
        let mut blocked: std::collections::HashMap<u32, Vec<Direction>> =
            std::collections::HashMap::new();
        for f in self.incoming_allied_fleets(yard.owner, yard.pos) {
            if f.eta() == 0 {
                continue;
            }
            if let Some(last) = f.route.last_direction() {
                blocked.entry(f.eta() - 1).or_default().push(last.opposite());
            }
        }
        blocked
    }

    /// Whether some minimal-distance launch toward `point` leaves `yard`
    /// in a direction not blocked at `time`.
    #[must_use]
    pub fn can_launch_to_at_time(&self, yard: &Shipyard, point: Point, time: u32) -> bool {
        let blocked = self.blocked_launch_dirs(yard);
        let barred = blocked.get(&time);
        for plan in crate::plan::plans_through(&self.grid, yard.pos, &[point]) {
            let Some(first) = plan.first_direction() else {
                continue;
            };
            if barred.map_or(true, |dirs| !dirs.contains(&first)) {
                return true;
            }
        }
        false
    }
}

/// Board construction helpers shared by tests and benches.
pub mod fixtures {
    use super::*;
    use crate::plan::Plan;

    /// An ore-free grid of the given size.
    #[must_use]
    pub fn empty_grid(size: u16) -> Grid {
        Grid::new(size, vec![0.0; (size as usize) * (size as usize)])
    }

    /// A grid with the same ore amount on every cell.
    #[must_use]
    pub fn uniform_ore_grid(size: u16, ore: f64) -> Grid {
        Grid::new(size, vec![ore; (size as usize) * (size as usize)])
    }

    /// A board with two players and nothing on it.
    #[must_use]
    pub fn empty_board(size: u16) -> Board {
        let config = GameConfig {
            size,
            ..GameConfig::default()
        };
        Board {
            config,
            step: 0,
            grid: empty_grid(size),
            players: vec![Player { id: 0, ore: 500.0 }, Player { id: 1, ore: 500.0 }],
            shipyards: Vec::new(),
            pending_shipyards: Vec::new(),
            fleets: Vec::new(),
            forecast: Forecast::default(),
        }
    }

    /// A shipyard literal.
    #[must_use]
    pub fn shipyard(id: &str, owner: PlayerId, pos: Point, ships: u32, turns: u32) -> Shipyard {
        Shipyard {
            id: id.to_string(),
            owner,
            pos,
            ships,
            turns_controlled: turns,
        }
    }

    /// A fleet literal.
    #[must_use]
    pub fn fleet(
        id: &str,
        owner: PlayerId,
        pos: Point,
        ships: u32,
        cargo: f64,
        route: Route,
    ) -> Fleet {
        let heading = route
            .plan()
            .first_direction()
            .unwrap_or(crate::grid::Direction::North);
        Fleet {
            id: id.to_string(),
            owner,
            pos,
            ships,
            cargo,
            heading,
            route,
        }
    }

    /// Rebuild a board through [`Board::new`] so the forecast runs.
    #[must_use]
    pub fn board_with(
        size: u16,
        grid: Option<Grid>,
        shipyards: Vec<Shipyard>,
        fleets: Vec<Fleet>,
    ) -> Board {
        let config = GameConfig {
            size,
            ..GameConfig::default()
        };
        let grid = grid.unwrap_or_else(|| empty_grid(size));
        let players = vec![
            Player { id: 0, ore: 500.0 },
            Player { id: 1, ore: 500.0 },
        ];
        Board::new(config, 0, grid, players, shipyards, fleets)
    }

    /// A straight-line route literal.
    #[must_use]
    pub fn line_route(grid: &Grid, start: Point, dir: Direction, steps: u16) -> Route {
        let mut plan = Plan::new();
        plan.push(dir, steps);
        Route::new(grid, start, plan, 0)
    }
}
