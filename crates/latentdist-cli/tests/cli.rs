//! End-to-end tests of the `latentdist` binary.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn latentdist(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_latentdist"))
        .args(args)
        .output()
        .expect("failed to run latentdist")
}

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("missing output file");
    serde_json::from_str(&text).expect("output is not JSON")
}

fn simulate_er(dir: &Path, name: &str, n: &str, seed: &str) -> String {
    let path = dir.join(name);
    let path = path.to_str().unwrap().to_string();
    let out = latentdist(&[
        "simulate", "er", "--n", n, "--p", "0.3", "--seed", seed, "--output", &path,
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    path
}

#[test]
fn simulate_writes_square_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let path = simulate_er(dir.path(), "a.json", "12", "1");
    let json = read_json(Path::new(&path));
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 12);
    assert!(rows.iter().all(|r| r.as_array().unwrap().len() == 12));
}

#[test]
fn test_command_writes_result() {
    let dir = tempfile::tempdir().unwrap();
    let a = simulate_er(dir.path(), "a.json", "30", "1");
    let b = simulate_er(dir.path(), "b.json", "40", "2");
    let out_path = dir.path().join("result.json");
    let out = latentdist(&[
        "test",
        &a,
        &b,
        "--n-bootstraps",
        "20",
        "--seed",
        "3",
        "--workers",
        "-1",
        "--output",
        out_path.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let result = read_json(&out_path);
    assert_eq!(result["null_distribution"].as_array().unwrap().len(), 20);
    let p = result["p_value"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p), "p = {p}");
    assert_eq!(result["test"], "dcorr");
}

#[test]
fn config_file_is_merged_with_flags() {
    let dir = tempfile::tempdir().unwrap();
    let a = simulate_er(dir.path(), "a.json", "25", "4");
    let b = simulate_er(dir.path(), "b.json", "25", "5");
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"test": "hsic", "metric": "gaussian", "n_bootstraps": 15}"#)
        .unwrap();
    let out_path = dir.path().join("result.json");
    let out = latentdist(&[
        "test",
        &a,
        &b,
        "--config",
        config.to_str().unwrap(),
        "--n-bootstraps",
        "10",
        "--seed",
        "1",
        "--output",
        out_path.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let result = read_json(&out_path);
    assert_eq!(result["test"], "hsic");
    assert_eq!(result["null_distribution"].as_array().unwrap().len(), 10);
}

#[test]
fn bad_test_name_fails() {
    let dir = tempfile::tempdir().unwrap();
    let a = simulate_er(dir.path(), "a.json", "10", "1");
    let out = latentdist(&["test", &a, &a, "--test", "foo"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("ValueError"), "stderr: {stderr}");
}

#[test]
fn embed_reports_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let a = simulate_er(dir.path(), "a.json", "30", "6");
    let out_path = dir.path().join("embedding.json");
    let out = latentdist(&[
        "embed",
        &a,
        "--n-components",
        "2",
        "--seed",
        "0",
        "--output",
        out_path.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report = read_json(&out_path);
    assert_eq!(report["n_components"], 2);
    assert_eq!(report["directed"], false);
    assert_eq!(report["embedding"].as_array().unwrap().len(), 30);
}
