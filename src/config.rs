use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Grid side length.
    pub size: usize,
    /// Minimum fraction of same-group neighbors for an agent to be happy.
    pub threshold: f64,
}

/// Initial condition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Fraction of empty cells.
    pub empty_ratio: f64,
    /// Fraction of occupied cells in group A.
    pub group_a_ratio: f64,
    /// Fraction of occupied cells in group B.
    pub group_b_ratio: f64,
    /// Fraction of occupied cells in group C (takes the remainder).
    pub group_c_ratio: f64,
}

/// Run control parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Step budget, unbounded if absent.
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Number of steps between progress logs.
    #[serde(default = "default_steps_per_log")]
    pub steps_per_log: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            steps_per_log: default_steps_per_log(),
        }
    }
}

fn default_steps_per_log() -> usize {
    10_000
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter, failing on the first invalid one.
    pub fn validate(&self) -> Result<()> {
        check_num(self.model.size, 1..).context("invalid grid size")?;
        check_num(self.model.threshold, 0.0..=1.0).context("invalid threshold")?;

        check_num(self.init.empty_ratio, 0.0..1.0).context("invalid empty ratio")?;
        check_num(self.init.group_a_ratio, 0.0..=1.0).context("invalid group A ratio")?;
        check_num(self.init.group_b_ratio, 0.0..=1.0).context("invalid group B ratio")?;
        check_num(self.init.group_c_ratio, 0.0..=1.0).context("invalid group C ratio")?;

        // Group C takes the remainder, so A and B must leave it non-negative.
        let sum_ab = self.init.group_a_ratio + self.init.group_b_ratio;
        if sum_ab > 1.0 {
            bail!("group A and B ratios must sum to at most 1.0, but sum to {sum_ab}");
        }
        check_num(self.occupied_cell_count(), 1..).context("invalid number of occupied cells")?;

        if let Some(max_steps) = self.run.max_steps {
            check_num(max_steps, 1..).context("invalid maximum number of steps")?;
        }
        check_num(self.run.steps_per_log, 1..).context("invalid number of steps per log")?;

        Ok(())
    }

    /// Number of cells left empty at setup.
    pub fn empty_count(&self) -> usize {
        (self.init.empty_ratio * self.n_cells() as f64) as usize
    }

    /// Number of agents in each group at setup.
    pub fn group_counts(&self) -> [usize; 3] {
        let occupied = self.n_cells() - self.empty_count();
        let count_a = (occupied as f64 * self.init.group_a_ratio) as usize;
        let count_b = (occupied as f64 * self.init.group_b_ratio) as usize;
        [count_a, count_b, occupied - count_a - count_b]
    }

    /// Normalization for the segregation score, fixed for a run.
    pub fn occupied_cell_count(&self) -> usize {
        ((1.0 - self.init.empty_ratio) * self.n_cells() as f64) as usize
    }

    fn n_cells(&self) -> usize {
        self.model.size * self.model.size
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN is never contained in a range.
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
