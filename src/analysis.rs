use crate::record::RunRecord;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use std::{fs::File, io::BufWriter, path::Path};

/// Quantity accumulated over the runs of a simulation.
pub trait Obs {
    fn update(&mut self, record: &RunRecord) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Segregation score at equilibrium.
pub struct FinalScore {
    acc: Accumulator,
}

impl FinalScore {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalScore {
    fn update(&mut self, record: &RunRecord) -> Result<()> {
        self.acc.add(record.final_score as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "final_score": self.acc.report() })
    }
}

/// Fraction of fully segregated agents at equilibrium.
pub struct FinalSegregation {
    acc: Accumulator,
}

impl FinalSegregation {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalSegregation {
    fn update(&mut self, record: &RunRecord) -> Result<()> {
        self.acc.add(record.final_segregation());
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "final_segregation": self.acc.report() })
    }
}

/// Relocation attempts until equilibrium, and how many of them moved an agent.
pub struct ConvergenceTime {
    steps: Accumulator,
    moves: Accumulator,
}

impl ConvergenceTime {
    pub fn new() -> Self {
        Self {
            steps: Accumulator::new(),
            moves: Accumulator::new(),
        }
    }
}

impl Obs for ConvergenceTime {
    fn update(&mut self, record: &RunRecord) -> Result<()> {
        self.steps.add(record.steps as f64);
        self.moves.add(record.moves as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "steps": self.steps.report(),
            "moves": self.moves.report(),
        })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FinalScore::new()),
            Box::new(FinalSegregation::new()),
            Box::new(ConvergenceTime::new()),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_record(&mut self, record: &RunRecord) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let record = RunRecord::load(file).with_context(|| format!("failed to load {file:?}"))?;
        self.add_record(&record)
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.reports())
            .context("failed to serialize results")?;
        Ok(())
    }
}
