use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn iothrottle() -> Command {
    let mut cmd = Command::cargo_bin("iothrottle").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_version() {
    iothrottle()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("iothrottle 0.1.0"));
}

#[test]
fn test_cli_help() {
    iothrottle()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Inspect and simulate a leaky bucket I/O throttle",
        ));
}

#[test]
fn test_cli_requires_subcommand() {
    iothrottle().assert().failure();
}

#[test]
fn test_cli_show_static_config() {
    iothrottle()
        .args(["show", "--config", &fixture("static.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"static\""))
        .stdout(predicate::str::contains("\"enabled\": true"))
        .stdout(predicate::str::contains("\"op_size\": 4096"));
}

#[test]
fn test_cli_show_from_env() {
    iothrottle()
        .arg("show")
        .env("IOTHROTTLE_MODE", "static")
        .env("IOTHROTTLE_BPS_AVG", "5000")
        .assert()
        .success()
        .stdout(predicate::str::contains("bytes_per_sec_total"))
        .stdout(predicate::str::contains("\"avg\": 5000.0"));
}

#[test]
fn test_cli_show_rejects_mismatched_config() {
    iothrottle()
        .args(["show", "--config", &fixture("mismatch.json")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to configure throttle"));
}

#[test]
fn test_cli_show_missing_config() {
    iothrottle()
        .args(["show", "--config", &fixture("does-not-exist.json")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_simulate_static() {
    iothrottle()
        .args([
            "simulate",
            "--config",
            &fixture("static.json"),
            "--ops",
            "200",
            "--size",
            "4096",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"admitted\": 200"))
        .stdout(predicate::str::contains("\"increases\": 0"));
}

#[test]
fn test_cli_simulate_dynamic_increases() {
    iothrottle()
        .args([
            "simulate",
            "--config",
            &fixture("dynamic.json"),
            "--ops",
            "100",
            "--increase-every",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"admitted\": 100"))
        .stdout(predicate::str::contains("\"increases\": 10"))
        .stdout(predicate::str::contains("\"avg_is_max\": true"));
}

#[test]
fn test_cli_simulate_stops_counting_increases_at_ceiling() {
    iothrottle()
        .args([
            "simulate",
            "--config",
            &fixture("dynamic.json"),
            "--ops",
            "200",
            "--increase-every",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"admitted\": 200"))
        .stdout(predicate::str::contains("\"increases\": 10,"))
        .stdout(predicate::str::contains("\"avg_is_max\": true"));
}

#[test]
fn test_cli_simulate_rejects_zero_tick() {
    iothrottle()
        .args([
            "simulate",
            "--config",
            &fixture("static.json"),
            "--tick-ms",
            "0",
        ])
        .assert()
        .failure();
}

#[test]
fn test_cli_simulate_gives_up() {
    iothrottle()
        .args([
            "simulate",
            "--config",
            &fixture("dynamic.json"),
            "--ops",
            "1000",
            "--max-denials",
            "3",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Gave up after 3 denied admissions"));
}
