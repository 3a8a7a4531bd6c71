//! Three-group Schelling model of residential segregation.
//!
//! The [`engine`] module holds the simulation proper; the remaining modules
//! load configurations, save runs and aggregate them.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod manager;
pub mod record;
pub mod stats;
