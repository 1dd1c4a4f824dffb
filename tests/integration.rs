use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn resolver_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_contact-resolver"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/contacts.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );

    let config_path = config_dir.join("resolver.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_resolver(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = resolver_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn identify(config_path: &Path, args: &[&str]) -> Value {
    let mut full = vec!["identify"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_resolver(config_path, &full);
    assert!(success, "identify failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON {:?}: {}", stdout, e))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_resolver(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/contacts.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_resolver(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_resolver(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_identify_first_fragment_creates_primary() {
    let (_tmp, config_path) = setup_test_env();
    run_resolver(&config_path, &["init"]);

    let json = identify(&config_path, &["--email", "a@x.com"]);
    assert_eq!(
        json,
        serde_json::json!({
            "contact": {
                "primaryContatctId": 1,
                "emails": ["a@x.com"],
                "phoneNumbers": [],
                "secondaryContactIds": []
            }
        })
    );
}

#[test]
fn test_identify_links_and_merges() {
    let (_tmp, config_path) = setup_test_env();
    run_resolver(&config_path, &["init"]);

    identify(&config_path, &["--email", "a@x.com", "--phone", "111"]);
    let json = identify(&config_path, &["--email", "a@x.com", "--phone", "222"]);
    assert_eq!(json["contact"]["phoneNumbers"], serde_json::json!(["111", "222"]));
    assert_eq!(json["contact"]["secondaryContactIds"], serde_json::json!([2]));

    identify(&config_path, &["--email", "z@x.com", "--phone", "999"]);
    let json = identify(&config_path, &["--email", "z@x.com", "--phone", "222"]);
    assert_eq!(json["contact"]["primaryContatctId"], 1);
    assert_eq!(
        json["contact"]["emails"],
        serde_json::json!(["a@x.com", "z@x.com"])
    );
    assert_eq!(json["contact"]["secondaryContactIds"], serde_json::json!([2, 3]));
}

#[test]
fn test_identify_without_fields_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_resolver(&config_path, &["init"]);

    let (_, stderr, success) = run_resolver(&config_path, &["identify"]);
    assert!(!success, "identify with no fields should fail");
    assert!(stderr.contains("Either email or phoneNumber must be provided"));

    let (stdout, _, _) = run_resolver(&config_path, &["get", "1"]);
    assert!(stdout.is_empty(), "nothing should have been stored");
}

#[test]
fn test_get_prints_identity() {
    let (_tmp, config_path) = setup_test_env();
    run_resolver(&config_path, &["init"]);
    identify(&config_path, &["--email", "a@x.com"]);
    identify(&config_path, &["--email", "a@x.com", "--phone", "555"]);

    let (stdout, stderr, success) = run_resolver(&config_path, &["get", "2"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["contact"]["primaryContatctId"], 1);
    assert_eq!(json["contact"]["phoneNumbers"], serde_json::json!(["555"]));
}

#[test]
fn test_get_unknown_contact_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_resolver(&config_path, &["init"]);

    let (_, stderr, success) = run_resolver(&config_path, &["get", "42"]);
    assert!(!success);
    assert!(stderr.contains("contact not found: 42"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_resolver(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
