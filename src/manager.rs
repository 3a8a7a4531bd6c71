use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::record::RunRecord;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory holding `config.toml` and one `run-NNNN` directory
/// per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a new simulation to equilibrium and save its record.
    ///
    /// Without a seed one is drawn from the OS and logged. The run directory
    /// is created only once the run has converged.
    pub fn create_run(&self, seed: Option<u64>) -> Result<()> {
        let seed = seed.unwrap_or_else(rand::random);
        log::info!("seed {seed}");

        let mut engine = Engine::from_seed(self.cfg.clone(), seed);
        engine.setup().context("failed to set up engine")?;
        let initial_grid = engine.grid().clone();

        let outcome = match self.cfg.run.max_steps {
            Some(max_steps) => engine.run_bounded(max_steps),
            None => engine.run(),
        }
        .context("failed to run simulation")?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let record = RunRecord::new(seed, self.cfg.clone(), initial_grid, outcome);
        let record_file = self.record_file(run_idx);
        record
            .save(&record_file)
            .with_context(|| format!("failed to save {record_file:?}"))?;
        log::info!("saved {record_file:?}");

        Ok(())
    }

    /// Aggregate the records of every finished run.
    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new();

        let pattern = self.sim_dir.join("run-*").join("record.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut n_records = 0;
        for file in glob(pattern).context("failed to glob record files")? {
            let file = file.context("failed to read glob entry")?;
            analyzer.add_file(&file).context("failed to add file")?;
            n_records += 1;
        }
        log::info!("analyzed {n_records} runs");

        let analysis_file = self.analysis_file();
        analyzer
            .save_results(&analysis_file)
            .with_context(|| format!("failed to save {analysis_file:?}"))?;
        log::info!("saved {analysis_file:?}");

        Ok(())
    }

    /// Remove every run directory and the analysis file.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let analysis_file = self.analysis_file();
        if analysis_file.exists() {
            fs::remove_file(&analysis_file)
                .with_context(|| format!("failed to remove {analysis_file:?}"))?;
            log::info!("removed {analysis_file:?}");
        }

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn record_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("record.msgpack")
    }

    fn analysis_file(&self) -> PathBuf {
        self.sim_dir.join("analysis.json")
    }
}
