mod common;

use common::{fixture_path, spawn_command};
use tickdown::error::ExitCode;

#[test]
fn validate_valid_config() {
    let config = fixture_path("quick.yaml");
    let output = spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn validate_invalid_config_lists_every_error() {
    let config = fixture_path("invalid.yaml");
    let output = spawn_command(&["validate", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    for path in [
        "settings.tick",
        "countdowns[0].id",
        "countdowns[0].phases",
        "countdowns[1].phases[0].duration",
        "countdowns[2].id",
    ] {
        assert!(stderr.contains(path), "missing {path} in: {stderr}");
    }
}

#[test]
fn validate_strict_rejects_warnings() {
    let config = fixture_path("warnings.yaml");

    let lenient = spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(lenient.status.success());

    let strict = spawn_command(&["validate", "--strict", config.to_str().unwrap()]);
    assert_eq!(strict.status.code(), Some(ExitCode::CONFIG_ERROR));
}

#[test]
fn validate_missing_file() {
    let output = spawn_command(&["validate", "/tmp/nonexistent_tickdown_test_file.yaml"]);
    assert!(
        !output.status.success(),
        "validate should fail for nonexistent file"
    );
}

#[test]
fn run_prints_messages_and_journals_events() {
    let config = fixture_path("quick.yaml");
    let events = tempfile::NamedTempFile::new().unwrap();
    let output = spawn_command(&[
        "--quiet",
        "run",
        config.to_str().unwrap(),
        "--events-file",
        events.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "run should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in [
        "kettle: kettle 0",
        "kettle: kettle done",
        "oven: preheated",
        "oven: baked",
        "oven: oven done",
    ] {
        assert!(stdout.contains(line), "missing {line:?} in: {stdout}");
    }

    let journal = std::fs::read_to_string(events.path()).unwrap();
    let parsed: Vec<serde_json::Value> = journal
        .lines()
        .map(|line| serde_json::from_str(line).expect("journal line should be JSON"))
        .collect();
    assert_eq!(parsed.len(), 6);
    for (expected, event) in parsed.iter().enumerate() {
        assert_eq!(event["sequence"], expected);
    }
    for id in ["kettle", "oven"] {
        let kinds: Vec<&str> = parsed
            .iter()
            .filter(|e| e["countdown_id"] == id)
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["Start", "Finish", "Close"], "{id}");
    }
}

#[test]
fn run_cancel_after_cancels_long_countdowns() {
    let config = fixture_path("long.yaml");
    let events = tempfile::NamedTempFile::new().unwrap();
    let output = spawn_command(&[
        "run",
        config.to_str().unwrap(),
        "--events-file",
        events.path().to_str().unwrap(),
        "--cancel-after",
        "200ms",
        "-q",
    ]);
    assert!(
        output.status.success(),
        "run should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("marathon: abandoned"));

    let journal = std::fs::read_to_string(events.path()).unwrap();
    let kinds: Vec<String> = journal
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["Start", "Cancel", "Close"]);
}

#[test]
fn run_missing_config_fails() {
    let output = spawn_command(&["run", "/tmp/nonexistent_tickdown_run.yaml"]);
    assert_eq!(output.status.code(), Some(ExitCode::CONFIG_ERROR));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = spawn_command(&["explode"]);
    assert_eq!(output.status.code(), Some(ExitCode::USAGE_ERROR));

    let output = spawn_command(&["run", "--cancel-after", "soon"]);
    assert_eq!(output.status.code(), Some(ExitCode::USAGE_ERROR));
}

#[test]
fn help_exits_successfully() {
    let output = spawn_command(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("validate"));
}
