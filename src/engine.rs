use crate::config::Config;
use crate::error::SimError;
use crate::grid::{Agent, Grid, Group, Position};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, iter};

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    SetupDone,
    Running,
    Converged,
}

/// How the segregation score and the empty/unhappy sets are kept current
/// after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Rescan the whole grid.
    #[default]
    Rescan,
    /// Re-evaluate only the cells around the vacated and the occupied cell.
    Local,
}

/// One relocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Number of attempts since setup, this one included.
    pub step: usize,
    /// Segregation score divided by the occupied cell count, truncated.
    pub segregation: usize,
    /// Segregation score after the attempt.
    pub score: usize,
    /// Whether the agent actually moved.
    pub moved: bool,
}

/// Result of a run to equilibrium.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub history: Vec<HistoryEntry>,
    pub final_grid: Grid,
    pub steps: usize,
    pub final_score: usize,
    pub moves: usize,
}

/// Simulation engine.
///
/// Holds the configuration, the grid with its derived sets, and the random
/// number generator. Call [`Engine::setup`] before running.
pub struct Engine<R = ChaCha12Rng> {
    cfg: Config,
    rng: R,
    mode: UpdateMode,
    phase: Phase,
    grid: Grid,
    empty: BTreeSet<Position>,
    unhappy: BTreeSet<Position>,
    score: usize,
    occupied_cell_count: usize,
    steps: usize,
    moves: usize,
}

impl Engine<ChaCha12Rng> {
    /// Create an engine with a reproducible random source.
    pub fn from_seed(cfg: Config, seed: u64) -> Self {
        Self::new(cfg, ChaCha12Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    /// Create an uninitialized engine drawing randomness from `rng`.
    pub fn new(cfg: Config, rng: R) -> Self {
        Self {
            cfg,
            rng,
            mode: UpdateMode::default(),
            phase: Phase::Uninitialized,
            grid: Grid::new(0),
            empty: BTreeSet::new(),
            unhappy: BTreeSet::new(),
            score: 0,
            occupied_cell_count: 0,
            steps: 0,
            moves: 0,
        }
    }

    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn empty_positions(&self) -> &BTreeSet<Position> {
        &self.empty
    }

    pub fn unhappy_positions(&self) -> &BTreeSet<Position> {
        &self.unhappy
    }

    pub fn segregation_score(&self) -> usize {
        self.score
    }

    pub fn occupied_cell_count(&self) -> usize {
        self.occupied_cell_count
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn moves(&self) -> usize {
        self.moves
    }

    /// Agent occupying `pos`, if any.
    pub fn agent_at(&self, pos: Position) -> Option<Agent> {
        self.grid.get(pos).map(|group| Agent { pos, group })
    }

    /// Populate the grid with a random arrangement of the configured groups.
    ///
    /// Discards any previous state, so it can be called again to restart.
    ///
    /// # Errors
    /// Returns [`SimError::Config`] if the configuration is invalid.
    pub fn setup(&mut self) -> Result<()> {
        self.cfg
            .validate()
            .map_err(|error| SimError::Config(format!("{error:#}")))?;

        let size = self.cfg.model.size;
        let [count_a, count_b, count_c] = self.cfg.group_counts();

        let mut cells = Vec::with_capacity(size * size);
        cells.extend(iter::repeat_n(Some(Group::A), count_a));
        cells.extend(iter::repeat_n(Some(Group::B), count_b));
        cells.extend(iter::repeat_n(Some(Group::C), count_c));
        cells.resize(size * size, None);
        cells.shuffle(&mut self.rng);

        self.grid = Grid::from_cells(size, cells).context("failed to place agents")?;
        self.occupied_cell_count = self.cfg.occupied_cell_count();
        self.steps = 0;
        self.moves = 0;
        self.score = self.compute_segregation_score();
        self.recompute_unhappy_and_empty();
        self.phase = Phase::SetupDone;

        log::info!(
            "set up {size}x{size} grid: {count_a} A, {count_b} B, {count_c} C, {} empty",
            self.empty.len()
        );
        log::info!(
            "initial segregation score {}, {} unhappy",
            self.score,
            self.unhappy.len()
        );

        Ok(())
    }

    /// Whether the agent at `pos` has no neighbor of another group.
    ///
    /// Always `false` for an empty cell.
    pub fn is_fully_segregated(&self, pos: Position) -> bool {
        let Some(group) = self.grid.get(pos) else {
            return false;
        };
        self.grid
            .neighbors(pos)
            .all(|nbr| self.grid.get(nbr).is_none_or(|other| other == group))
    }

    /// Whether an agent of `group` would be happy at `pos`.
    ///
    /// Empty neighbors are ignored. With no occupied neighbor the agent is
    /// happy.
    pub fn is_happy(&self, pos: Position, group: Group) -> bool {
        let mut same = 0;
        let mut different = 0;
        for nbr in self.grid.neighbors(pos) {
            match self.grid.get(nbr) {
                Some(other) if other == group => same += 1,
                Some(_) => different += 1,
                None => {}
            }
        }
        let total = same + different;
        total == 0 || same as f64 / total as f64 >= self.cfg.model.threshold
    }

    /// Count the fully segregated agents on the whole grid.
    pub fn compute_segregation_score(&self) -> usize {
        self.grid
            .positions()
            .filter(|&pos| self.is_fully_segregated(pos))
            .count()
    }

    /// Rebuild the empty and unhappy sets from a full scan.
    pub fn recompute_unhappy_and_empty(&mut self) {
        self.empty.clear();
        self.unhappy.clear();
        for pos in self.grid.positions() {
            match self.grid.get(pos) {
                None => {
                    self.empty.insert(pos);
                }
                Some(group) => {
                    if !self.is_happy(pos, group) {
                        self.unhappy.insert(pos);
                    }
                }
            }
        }
    }

    /// Try to move `agent` to a random empty cell.
    ///
    /// The move happens only if the agent would be happy there.
    /// Returns whether the agent moved.
    ///
    /// # Errors
    /// Returns [`SimError::NoVacancy`] if the grid has no empty cell and
    /// [`SimError::StaleAgent`] if `agent` does not match the grid.
    pub fn attempt_relocate(&mut self, agent: Agent) -> Result<bool> {
        self.ensure_set_up()?;
        if self.grid.get(agent.pos) != Some(agent.group) {
            bail!(SimError::StaleAgent {
                pos: agent.pos,
                group: agent.group,
            });
        }

        let Some(dest) = choose_from(&self.empty, &mut self.rng)? else {
            bail!(SimError::NoVacancy);
        };

        if !self.is_happy(dest, agent.group) {
            log::trace!("{agent:?} stays, would be unhappy at {dest:?}");
            return Ok(false);
        }

        self.relocate(agent, dest);
        log::trace!("{agent:?} moved to {dest:?}");

        Ok(true)
    }

    /// Perform one iteration of the relocation loop.
    ///
    /// Returns `None` once no agent is unhappy.
    pub fn step(&mut self) -> Result<Option<HistoryEntry>> {
        self.ensure_set_up()?;

        let Some(pos) = choose_from(&self.unhappy, &mut self.rng)? else {
            self.phase = Phase::Converged;
            return Ok(None);
        };
        self.phase = Phase::Running;

        let agent = self
            .agent_at(pos)
            .with_context(|| format!("unhappy set holds empty cell {pos:?}"))?;
        let moved = self
            .attempt_relocate(agent)
            .context("failed to relocate agent")?;

        self.steps += 1;
        Ok(Some(HistoryEntry {
            step: self.steps,
            segregation: self.score / self.occupied_cell_count,
            score: self.score,
            moved,
        }))
    }

    /// Run until no agent is unhappy.
    ///
    /// May never return if no equilibrium is reachable; see
    /// [`Engine::run_bounded`].
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.run_until(None)
    }

    /// Run until no agent is unhappy, giving up after `max_steps` attempts.
    ///
    /// # Errors
    /// Returns [`SimError::NotConverged`] once the budget is spent.
    pub fn run_bounded(&mut self, max_steps: usize) -> Result<RunOutcome> {
        self.run_until(Some(max_steps))
    }

    fn run_until(&mut self, max_steps: Option<usize>) -> Result<RunOutcome> {
        self.ensure_set_up()?;

        let steps_per_log = self.cfg.run.steps_per_log.max(1);
        let mut history: Vec<HistoryEntry> = Vec::new();

        loop {
            if max_steps.is_some_and(|max| history.len() >= max) && !self.unhappy.is_empty() {
                bail!(SimError::NotConverged { steps: self.steps });
            }

            let Some(entry) = self.step()? else {
                break;
            };
            if entry.step % steps_per_log == 0 {
                log::info!(
                    "step {}: {} unhappy, {} moves, score {}",
                    entry.step,
                    self.unhappy.len(),
                    self.moves,
                    self.score
                );
            }
            history.push(entry);
        }

        log::info!(
            "converged after {} steps ({} moves), score {}",
            self.steps,
            self.moves,
            self.score
        );

        Ok(RunOutcome {
            history,
            final_grid: self.grid.clone(),
            steps: self.steps,
            final_score: self.score,
            moves: self.moves,
        })
    }

    fn relocate(&mut self, agent: Agent, dest: Position) {
        match self.mode {
            UpdateMode::Rescan => {
                self.grid.set(agent.pos, None);
                self.grid.set(dest, Some(agent.group));
                self.score = self.compute_segregation_score();
                self.recompute_unhappy_and_empty();
            }
            UpdateMode::Local => {
                // A cell's state depends only on its own 3x3 block.
                let affected: BTreeSet<_> = self
                    .grid
                    .block(agent.pos)
                    .chain(self.grid.block(dest))
                    .collect();

                let before = self.count_fully_segregated(&affected);
                self.grid.set(agent.pos, None);
                self.grid.set(dest, Some(agent.group));
                let after = self.count_fully_segregated(&affected);
                self.score = self.score - before + after;

                self.empty.remove(&dest);
                self.empty.insert(agent.pos);
                for pos in affected {
                    self.unhappy.remove(&pos);
                    if let Some(group) = self.grid.get(pos) {
                        if !self.is_happy(pos, group) {
                            self.unhappy.insert(pos);
                        }
                    }
                }
            }
        }
        self.moves += 1;
    }

    fn count_fully_segregated(&self, positions: &BTreeSet<Position>) -> usize {
        positions
            .iter()
            .filter(|&&pos| self.is_fully_segregated(pos))
            .count()
    }

    fn ensure_set_up(&self) -> Result<()> {
        if self.phase == Phase::Uninitialized {
            bail!(SimError::NotSetUp);
        }
        Ok(())
    }
}

/// Pick a uniformly random element of `set`, `None` if it is empty.
fn choose_from<R: Rng>(set: &BTreeSet<Position>, rng: &mut R) -> Result<Option<Position>> {
    if set.is_empty() {
        return Ok(None);
    }
    let idx = Uniform::new(0, set.len())?.sample(rng);
    Ok(set.iter().nth(idx).copied())
}
