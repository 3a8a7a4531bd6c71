use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "size = 16\n"
        + "threshold = 0.4\n"
        + "\n"
        + "[init]\n"
        + "empty_ratio = 0.3\n"
        + "group_a_ratio = 0.33\n"
        + "group_b_ratio = 0.33\n"
        + "group_c_ratio = 0.34\n"
        + "\n"
        + "[run]\n"
        + "max_steps = 1000000\n"
        + "steps_per_log = 1000\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_segsim"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "1"]);
    run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "2"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    assert!(test_dir.join("run-0000").join("record.msgpack").is_file());
    assert!(test_dir.join("run-0002").join("record.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let analysis = fs::read_to_string(test_dir.join("analysis.json"))
        .expect("failed to read analysis file");
    let analysis: serde_json::Value =
        serde_json::from_str(&analysis).expect("failed to parse analysis file");
    assert_eq!(analysis[0]["final_score"]["n_vals"], 3);

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("analysis.json").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = r#"
[model]
size = 8
threshold = 1.5

[init]
empty_ratio = 0.2
group_a_ratio = 0.5
group_b_ratio = 0.5
group_c_ratio = 0.0
"#;
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_segsim"))
        .args(["--sim-dir", test_dir.to_str().expect("non UTF-8 path"), "create"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());
    let stderr_str = String::from_utf8_lossy(&output.stderr);
    assert!(stderr_str.contains("invalid threshold"), "stderr:\n{stderr_str}");
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn unconverged_run_leaves_no_run_dir() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("unconverged_run");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    // One A and two C's on a 2x2 grid: nobody is ever happy at threshold 1.
    let config_contents = r#"
[model]
size = 2
threshold = 1.0

[init]
empty_ratio = 0.25
group_a_ratio = 0.34
group_b_ratio = 0.33
group_c_ratio = 0.33

[run]
max_steps = 50
"#;
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir.to_str().expect("non UTF-8 path");
    for _ in 0..2 {
        let output = Command::new(env!("CARGO_BIN_EXE_segsim"))
            .args(["--sim-dir", test_dir_str, "create", "--seed", "3"])
            .output()
            .expect("failed to execute command");

        assert!(!output.status.success());
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        assert!(stderr_str.contains("failed to run simulation"), "stderr:\n{stderr_str}");
    }
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}
