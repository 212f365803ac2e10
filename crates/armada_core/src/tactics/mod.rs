//! The tactic passes run by `decide`, one module per concern.
//!
//! Passes communicate only through the [`crate::turn::Turn`] context: each
//! claims yards by assigning actions and later passes skip claimed yards.
//! The run order lives in `decide` and is part of the semantics; defense
//! outranks offense, offense outranks expansion, and mining takes whatever
//! is left before the final spawn sweep.

pub mod defense;
pub mod expansion;
pub mod interdiction;
pub mod mining;
pub mod offense;
pub mod spawning;
