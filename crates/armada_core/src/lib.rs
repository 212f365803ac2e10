//! # Armada Core
//!
//! Planning engine for a fleet game on a toroidal grid.
//!
//! This crate contains **only** deterministic planning logic:
//! - No IO
//! - No process-global state
//! - No wall-clock reads (callers pass the remaining time budget in)
//!
//! Every turn the harness hands over a fresh observation; the engine builds
//! an immutable [`board::Board`] snapshot from it, runs the tactic passes in
//! a fixed order and returns one action per shipyard. The only state that
//! survives between turns is the [`intent::Session`], which carries
//! multi-turn intents by stable entity id.
//!
//! ## Crate Structure
//!
//! - [`grid`] - torus geometry and the ore field
//! - [`plan`] - the flight-plan mini-language
//! - [`route`] - plans anchored at cells, with harvest estimation
//! - [`board`] - the per-turn snapshot and its entities
//! - [`forecast`] - the committed-route simulator
//! - [`risk`] - reachable-strike-strength tables
//! - [`search`] - route enumeration and interception gating
//! - [`intent`] - multi-turn intents and the cross-turn session
//! - [`turn`] - the per-turn decision context and `decide`
//! - [`tactics`] - the decision passes themselves

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod board;
pub mod error;
pub mod forecast;
pub mod grid;
pub mod intent;
pub mod plan;
pub mod risk;
pub mod route;
pub mod search;
pub mod tactics;
pub mod turn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::board::{
        Board, Fleet, GameConfig, PendingShipyard, Player, PlayerId, Shipyard, ShipyardAction,
        YardRef,
    };
    pub use crate::error::{ArmadaError, Result};
    pub use crate::grid::{Direction, Grid, Point};
    pub use crate::intent::Session;
    pub use crate::plan::Plan;
    pub use crate::route::Route;
    pub use crate::turn::{decide, Turn};
}
