//! Decoding harness observations into board snapshots.
//!
//! The harness sends one JSON object per turn with the flat ore field, the
//! per-player entity tables and the wall-clock budget. Everything arrives
//! as positional arrays keyed by stable entity ids; this module turns that
//! into a typed [`Board`].

use std::collections::HashMap;

use serde::Deserialize;

use armada_core::board::{Board, Fleet, GameConfig, Player, PlayerId, Shipyard};
use armada_core::error::{ArmadaError, Result};
use armada_core::grid::{Direction, Grid, Point};
use armada_core::plan::Plan;
use armada_core::route::Route;

/// One turn's raw observation.
#[derive(Debug, Deserialize)]
pub struct Observation {
    /// Current turn number.
    pub step: u32,
    /// The player this process controls.
    pub player: PlayerId,
    /// Wall-clock overage budget left, seconds.
    #[serde(rename = "remainingOverageTime", default)]
    pub remaining_overage_time: f64,
    /// Row-major ore field, `size * size` cells.
    pub kore: Vec<f64>,
    /// Per-player state, indexed by player id.
    pub players: Vec<PlayerState>,
}

/// `[bank, shipyards, fleets]` as it appears on the wire.
#[derive(Debug, Deserialize)]
pub struct PlayerState(
    pub f64,
    pub HashMap<String, YardState>,
    pub HashMap<String, FleetState>,
);

/// `[cell, ships, turns_controlled]`.
#[derive(Debug, Deserialize)]
pub struct YardState(pub u32, pub u32, pub u32);

/// `[cell, cargo, ships, heading, flight_plan]`.
#[derive(Debug, Deserialize)]
pub struct FleetState(pub u32, pub f64, pub u32, pub u8, pub String);

/// Rule constants as the harness spells them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    /// Torus edge length.
    pub size: u16,
    /// Total turns in an episode.
    pub episode_steps: u32,
    /// Ore cost of spawning one ship.
    pub spawn_cost: f64,
    /// Ships consumed by a conversion.
    pub convert_cost: u32,
    /// Per-turn ore regeneration rate.
    pub regen_rate: f64,
    /// Ore ceiling per cell.
    pub max_regen_cell_kore: f64,
    /// Wall-clock budget per turn, seconds.
    pub act_timeout: f64,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = GameConfig::default();
        Self {
            size: defaults.size,
            episode_steps: defaults.episode_steps,
            spawn_cost: defaults.spawn_cost,
            convert_cost: defaults.convert_cost,
            regen_rate: defaults.regen_rate,
            max_regen_cell_kore: defaults.max_cell_ore,
            act_timeout: defaults.act_timeout,
        }
    }
}

impl From<RawConfig> for GameConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            size: raw.size,
            episode_steps: raw.episode_steps,
            spawn_cost: raw.spawn_cost,
            convert_cost: raw.convert_cost,
            regen_rate: raw.regen_rate,
            max_cell_ore: raw.max_regen_cell_kore,
            act_timeout: raw.act_timeout,
        }
    }
}

fn point_from_cell(cell: u32, size: u16) -> Result<Point> {
    let size_u32 = u32::from(size);
    if cell >= size_u32 * size_u32 {
        return Err(ArmadaError::InvalidSnapshot(format!(
            "cell index {cell} out of range for size {size}"
        )));
    }
    Ok(Point::new((cell % size_u32) as u16, (cell / size_u32) as u16))
}

/// Normalize a raw flight plan before parsing.
///
/// The game silently ignores conversion orders a fleet is too small to
/// execute, and a fleet stops existing at its first executed conversion, so
/// the committed plan is everything up to and including the first `C`.
fn effective_plan(raw: &str, ships: u32, convert_cost: u32) -> String {
    match raw.find('C') {
        None => raw.to_string(),
        Some(_) if ships < convert_cost => raw.chars().filter(|&c| c != 'C').collect(),
        Some(idx) => raw[..=idx].to_string(),
    }
}

/// Build the typed snapshot for one observation.
pub fn to_board(obs: &Observation, config: &GameConfig) -> Result<Board> {
    let size = config.size;
    let cells = usize::from(size) * usize::from(size);
    if obs.kore.len() != cells {
        return Err(ArmadaError::InvalidSnapshot(format!(
            "ore field has {} cells, expected {cells}",
            obs.kore.len()
        )));
    }
    let grid = Grid::new(size, obs.kore.clone());

    let mut players = Vec::new();
    let mut shipyards = Vec::new();
    let mut fleets = Vec::new();
    for (id, state) in obs.players.iter().enumerate() {
        players.push(Player { id, ore: state.0 });

        for (yard_id, yard) in &state.1 {
            shipyards.push(Shipyard {
                id: yard_id.clone(),
                owner: id,
                pos: point_from_cell(yard.0, size)?,
                ships: yard.1,
                turns_controlled: yard.2,
            });
        }

        for (fleet_id, raw) in &state.2 {
            let pos = point_from_cell(raw.0, size)?;
            let heading = Direction::from_game_id(raw.3).ok_or_else(|| {
                ArmadaError::InvalidSnapshot(format!("bad heading {} for fleet {fleet_id}", raw.3))
            })?;
            let plan_str = effective_plan(&raw.4, raw.2, config.convert_cost);
            // A fleet whose plan runs out keeps cruising on its last heading.
            let plan = Plan::parse(&plan_str, Some(heading))?.with_cruise(heading);
            fleets.push(Fleet {
                id: fleet_id.clone(),
                owner: id,
                pos,
                ships: raw.2,
                cargo: raw.1,
                heading,
                route: Route::new(&grid, pos, plan, 0),
            });
        }
    }

    Ok(Board::new(
        config.clone(),
        obs.step,
        grid,
        players,
        shipyards,
        fleets,
    ))
}
