use super::*;

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use mb_core::ErrorKind;

const SESSION: &str = r#"{
    "objects": [
        {"index": 1, "type": "profile", "name": "Main"},
        {"index": 2, "type": "account", "parent": 1, "name": "Acct"},
        {"index": 10, "type": "character", "parent": 2, "name": "Alice",
         "value": "mbox::OnKeyDown(0x41, || mbox::SendMacro(Me, Heal));",
         "refs": {"Heal": 40}},
        {"index": 11, "type": "character", "parent": 2, "name": "Bob"},
        {"index": 30, "type": "party", "parent": 1, "name": "Duo",
         "value": "mbox::AddCharacter(Alice, 1); mbox::AddCharacter(Bob, 2);",
         "refs": {"Alice": 10, "Bob": 11}},
        {"index": 40, "type": "action_macro", "parent": 1, "name": "Heal", "value": "/cast Heal"}
    ],
    "macroPool": [{"key": 112, "modifiers": "CONTROL"}],
    "party": 30
}"#;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("mbox-rs-{}-{}", name, nanos))
}

fn write_temp(name: &str, content: &str) -> String {
    let path = temp_path(name);
    fs::write(&path, content).expect("file should be written");
    path.to_string_lossy().to_string()
}

#[test]
fn validate_accepts_a_clean_session() {
    let session = write_temp("session.json", SESSION);
    assert_eq!(run_cli_from_args(["mbox", "validate", "--session", session.as_str()]), 0);
}

#[test]
fn validate_reports_structural_errors() {
    let broken = SESSION.replace(r#""parent": 2, "name": "Bob""#, r#""parent": 1, "name": "Bob""#);
    let session = write_temp("broken.json", &broken);
    assert_eq!(run_cli_from_args(["mbox", "validate", "--session", session.as_str()]), 1);
}

#[test]
fn assemble_writes_the_export_file() {
    let session = write_temp("assemble.json", SESSION);
    let export = temp_path("export").join("bindings.json");
    let export_str = export.to_string_lossy().to_string();
    let code = run_cli_from_args([
        "mbox",
        "assemble",
        "--session",
        session.as_str(),
        "--export-out",
        export_str.as_str(),
    ]);
    assert_eq!(code, 0);
    let written = fs::read_to_string(&export).expect("export should exist");
    let bindings: Vec<serde_json::Value> = serde_json::from_str(&written).expect("json");
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0]["characterName"], "Alice");
    assert_eq!(bindings[0]["text"], "/cast Heal");
}

#[test]
fn assemble_fails_when_the_pool_is_too_small() {
    let small = SESSION.replace(r#"[{"key": 112, "modifiers": "CONTROL"}]"#, "[]");
    let session = write_temp("small.json", &small);
    assert_eq!(run_cli_from_args(["mbox", "assemble", "--session", session.as_str()]), 1);
}

#[test]
fn replay_feeds_recorded_inputs() {
    let session = write_temp("replay.json", SESSION);
    let inputs = write_temp(
        "inputs.json",
        r#"[
            {"character": 11, "input": {"type": "key_press", "key": 65}},
            {"character": 10, "input": {"type": "other"}}
        ]"#,
    );
    let code = run_cli_from_args([
        "mbox",
        "replay",
        "--session",
        session.as_str(),
        "--inputs",
        inputs.as_str(),
    ]);
    assert_eq!(code, 0);

    let unslotted = write_temp(
        "inputs-bad.json",
        r#"[{"character": 40, "input": {"type": "key_press", "key": 65}}]"#,
    );
    let code = run_cli_from_args([
        "mbox", "replay", "--session", session.as_str(), "--inputs", unslotted.as_str(),
    ]);
    assert_eq!(code, 1);
}

#[test]
fn loaders_map_io_and_json_errors() {
    let missing = temp_path("missing.json");
    let error = load_session(&missing).expect_err("missing file");
    assert_eq!(error.kind, ErrorKind::CliIo);

    let garbage = write_temp("garbage.json", "{ not json");
    let error = load_session(Path::new(&garbage)).expect_err("bad json");
    assert_eq!(error.kind, ErrorKind::CliSessionInvalid);

    let posted = load_inputs(Path::new(&write_temp(
        "posted.json",
        r#"[{"character": 10, "input": {"type": "timer", "timer": 5}}]"#,
    )))
    .expect("inputs");
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].character, mb_core::ObjectId(10));
}

#[test]
fn bad_arguments_use_clap_exit_code() {
    assert_eq!(run_cli_from_args(["mbox", "validate"]), 2);
}
