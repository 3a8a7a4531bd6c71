use segsim::config::{Config, InitConfig, ModelConfig, RunConfig};
use segsim::engine::Engine;
use segsim::error::SimError;
use segsim::grid::Group;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

const MAX_STEPS: usize = 100_000;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Fixture {
    seed: u64,
    initial_codes: Vec<Vec<u8>>,
    final_codes: Vec<Vec<u8>>,
    initial_score: usize,
    final_score: usize,
    steps: usize,
    moves: usize,
}

fn golden_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("two_groups_4x4.json")
}

fn two_groups_4x4() -> Config {
    Config {
        model: ModelConfig {
            size: 4,
            threshold: 0.5,
        },
        init: InitConfig {
            empty_ratio: 0.25,
            group_a_ratio: 0.5,
            group_b_ratio: 0.5,
            group_c_ratio: 0.0,
        },
        run: RunConfig::default(),
    }
}

fn run_seed(seed: u64) -> Option<Fixture> {
    let mut engine = Engine::from_seed(two_groups_4x4(), seed);
    engine.setup().expect("failed to set up");

    let grid = engine.grid();
    assert_eq!(grid.count(Some(Group::A)), 6);
    assert_eq!(grid.count(Some(Group::B)), 6);
    assert_eq!(grid.count(None), 4);

    let initial_codes = grid.to_codes();
    let initial_score = engine.segregation_score();

    match engine.run_bounded(MAX_STEPS) {
        Ok(outcome) => Some(Fixture {
            seed,
            initial_codes,
            final_codes: outcome.final_grid.to_codes(),
            initial_score,
            final_score: outcome.final_score,
            steps: outcome.steps,
            moves: outcome.moves,
        }),
        Err(error) => {
            assert!(matches!(
                error.downcast_ref::<SimError>(),
                Some(SimError::NotConverged { .. })
            ));
            None
        }
    }
}

/// First seed whose run reaches equilibrium within the step budget.
fn first_converging_run() -> Fixture {
    (0..64)
        .find_map(run_seed)
        .expect("no seed reached equilibrium")
}

#[test]
fn two_groups_4x4_matches_golden() {
    let fixture = first_converging_run();
    // Same seed, same trajectory.
    assert_eq!(run_seed(fixture.seed).as_ref(), Some(&fixture));

    let file = golden_file();
    if env::var_os("SEGSIM_BLESS").is_some() {
        let contents = serde_json::to_string_pretty(&fixture).expect("failed to serialize fixture");
        fs::write(&file, contents + "\n").expect("failed to write golden file");
        return;
    }

    let contents =
        fs::read_to_string(&file).expect("golden file missing; rerun with SEGSIM_BLESS=1");
    let expected: Fixture = serde_json::from_str(&contents).expect("failed to parse golden file");
    assert_eq!(
        fixture, expected,
        "run diverged from {file:?}; rerun with SEGSIM_BLESS=1 if the change is intended"
    );
}
