//! Saved run data.

use crate::config::Config;
use crate::engine::{HistoryEntry, RunOutcome};
use crate::grid::Grid;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Record of a single run to equilibrium.
///
/// Contains everything needed to plot the run or compare it with others:
/// the grid before and after, the segregation history and the final scalars.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Seed of the random number generator.
    pub seed: u64,

    /// Configuration the run was performed with.
    pub cfg: Config,

    /// Grid right after setup.
    pub initial_grid: Grid,

    /// Grid at equilibrium.
    pub final_grid: Grid,

    /// One entry per relocation attempt.
    pub history: Vec<HistoryEntry>,

    /// Number of relocation attempts until equilibrium.
    pub steps: usize,

    /// Number of attempts that moved an agent.
    pub moves: usize,

    /// Segregation score at equilibrium.
    pub final_score: usize,

    /// Normalization of the segregation score.
    pub occupied_cell_count: usize,
}

impl RunRecord {
    pub fn new(seed: u64, cfg: Config, initial_grid: Grid, outcome: RunOutcome) -> Self {
        let occupied_cell_count = cfg.occupied_cell_count();
        Self {
            seed,
            cfg,
            initial_grid,
            final_grid: outcome.final_grid,
            history: outcome.history,
            steps: outcome.steps,
            moves: outcome.moves,
            final_score: outcome.final_score,
            occupied_cell_count,
        }
    }

    /// Fraction of agents that are fully segregated at equilibrium.
    pub fn final_segregation(&self) -> f64 {
        self.final_score as f64 / self.occupied_cell_count as f64
    }

    /// Save the record to a MessagePack file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize record")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a record saved with [`RunRecord::save`].
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let record = decode::from_read(&mut reader).context("failed to deserialize record")?;
        Ok(record)
    }
}
