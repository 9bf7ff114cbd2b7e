// Non-interactive subcommands of the binary.
use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

fn wordrill(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wordrill").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .arg("--db")
        .arg(home.path().join("test.db"));
    cmd
}

#[test]
fn import_then_list_sessions() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("words.csv");
    fs::write(
        &csv,
        "word,meaning,ipa,syllables\ncat,猫,/kæt/,cat\nbutter,黄油,,but-ter\n",
    )
    .unwrap();

    let out = wordrill(&home)
        .args(["import", "--plan", "1"])
        .arg(&csv)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Imported 2 words into plan 1"));

    let out = wordrill(&home).args(["sessions", "--plan", "1"]).output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("No sessions for plan 1"));
}

#[test]
fn import_rejects_rows_without_a_word() {
    let home = TempDir::new().unwrap();
    let csv = home.path().join("bad.csv");
    fs::write(&csv, "word,meaning\n,nothing\n").unwrap();

    wordrill(&home)
        .args(["import", "--plan", "1"])
        .arg(&csv)
        .assert()
        .failure();
}

#[test]
fn cancelling_unknown_session_fails() {
    let home = TempDir::new().unwrap();
    wordrill(&home).args(["cancel", "feedface"]).assert().failure();
}

#[test]
fn practice_requires_a_terminal() {
    let home = TempDir::new().unwrap();
    wordrill(&home)
        .args(["practice", "--plan", "1", "--schedule", "1"])
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn config_init_writes_effective_settings() {
    let home = TempDir::new().unwrap();
    let out = wordrill(&home).args(["config", "--init"]).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let path = stdout.trim().strip_prefix("Wrote ").unwrap();
    let written: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(written["autoplay_max_plays"], 3);
    assert_eq!(written["advance_after_correct_ms"], 1500);

    let shown = wordrill(&home).arg("config").output().unwrap();
    assert!(String::from_utf8_lossy(&shown.stdout).contains(path));
}
