use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn portal_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("portal");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/portal.sqlite"

[llm]
provider = "disabled"

[search]
result_limit = 50
rerank_limit = 20

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("portal.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_portal(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = portal_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run portal binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_portal(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/portal.sqlite").exists());

    // Idempotent
    let (_, stderr, success) = run_portal(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_init_seed_populates_terminology() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_portal(&config_path, &["init", "--seed"]);
    assert!(success, "init --seed failed: {}", stderr);
    assert!(stdout.contains("Seeded"));

    let (stdout, _, success) = run_portal(&config_path, &["terminology", "list", "--json"]);
    assert!(success);
    let rows: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(!rows.as_array().unwrap().is_empty());

    // Seeding again inserts nothing new.
    let (stdout, _, success) = run_portal(&config_path, &["terminology", "seed"]);
    assert!(success);
    assert!(stdout.contains("Seeded 0"));
}

#[test]
fn test_search_misspelled_state_without_llm() {
    let (_tmp, config_path) = setup_test_env();
    run_portal(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_portal(&config_path, &["search", "texs customer stories", "--json"]);
    assert!(success, "search failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["parsed"]["states"], serde_json::json!(["TX"]));
    assert_eq!(outcome["parsed"]["types"], serde_json::json!(["Customer Story"]));
    assert_eq!(outcome["ranked_by"], "manual");
}

#[test]
fn test_terminology_add_and_reject_verified_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_portal(&config_path, &["init"]);

    let (stdout, stderr, success) = run_portal(
        &config_path,
        &["terminology", "add", "topic", "grad plan", "graduation tracking"],
    );
    assert!(success, "add failed: {}", stderr);
    let id = stdout
        .trim()
        .rsplit('(')
        .next()
        .unwrap()
        .trim_end_matches(')')
        .to_string();

    let (_, _, success) = run_portal(&config_path, &["terminology", "reject", &id]);
    assert!(!success, "rejecting a verified mapping should fail");

    let (_, _, success) = run_portal(&config_path, &["terminology", "approve", "no-such-id"]);
    assert!(!success);
}

#[test]
fn test_export_empty_library_writes_header() {
    let (tmp, config_path) = setup_test_env();
    run_portal(&config_path, &["init"]);

    let out = tmp.path().join("out/export.csv");
    let (_, stderr, success) =
        run_portal(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: {}", stderr);
    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("Title,Type,State"));
}

#[test]
fn test_stats_and_dedup_on_empty_library() {
    let (_tmp, config_path) = setup_test_env();
    run_portal(&config_path, &["init"]);

    let (stdout, _, success) = run_portal(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total"], 0);

    let (stdout, _, success) = run_portal(&config_path, &["dedup"]);
    assert!(success);
    assert!(stdout.contains("No duplicates found."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_portal(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_report_weekly_without_llm() {
    let (_tmp, config_path) = setup_test_env();
    run_portal(&config_path, &["init"]);

    let (stdout, stderr, success) = run_portal(&config_path, &["report", "weekly", "--json"]);
    assert!(success, "report failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(report["summary"].as_str().unwrap().contains("0 items"));
}

#[test]
fn test_openai_without_key_falls_back_to_local_search() {
    let (tmp, config_path) = setup_test_env();
    let config_content = format!(
        r#"[db]
path = "{}/data/portal.sqlite"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "PORTAL_TEST_UNSET_API_KEY"
"#,
        tmp.path().display()
    );
    fs::write(&config_path, config_content).unwrap();

    let (_, stderr, success) = run_portal(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);

    let (stdout, stderr, success) = run_portal(&config_path, &["search", "texs ebooks", "--json"]);
    assert!(success, "search failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["parsed"]["states"], serde_json::json!(["TX"]));
    assert_eq!(json["ranked_by"], "manual");
}
