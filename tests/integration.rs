//! End-to-end tests driving the built `crema` binary: init → sync →
//! recommend → alerts → history, against a temp database and feed files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crema_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crema");
    path
}

const FEED_INITIAL: &str = r#"[
  {
    "slug": "yirgacheffe",
    "name": "Ethiopia Yirgacheffe",
    "url": "https://example.com/yirgacheffe",
    "originCountry": "Ethiopia",
    "process": "washed",
    "roastLevel": "light",
    "tastingNotes": "jasmine, lemon, honey",
    "isBlend": false,
    "isDecaf": false,
    "variants": [
      { "weightGrams": 250, "currentPrice": 20.0, "inStock": 1 }
    ],
    "rating": { "value": 4.5, "count": 12, "bestRating": 5 },
    "badges": [ { "badgeType": "limited", "label": "Limited edition" } ]
  },
  {
    "slug": "santos",
    "name": "Brazil Santos",
    "url": "https://example.com/santos",
    "originCountry": "Brazil",
    "process": "natural",
    "roastLevel": "medium",
    "tastingNotes": "chocolate, caramel, nutty",
    "isBlend": false,
    "isDecaf": false,
    "variants": [
      { "weightGrams": 1000, "currentPrice": 18.0, "inStock": 1 }
    ],
    "badges": []
  }
]"#;

const FEED_PRICE_DROP: &str = r#"[
  {
    "slug": "yirgacheffe",
    "name": "Ethiopia Yirgacheffe",
    "url": "https://example.com/yirgacheffe",
    "originCountry": "Ethiopia",
    "process": "washed",
    "roastLevel": "light",
    "tastingNotes": "jasmine, lemon, honey",
    "isBlend": false,
    "isDecaf": false,
    "variants": [
      { "weightGrams": 250, "currentPrice": 15.0, "inStock": 1 }
    ],
    "rating": { "value": 4.5, "count": 12, "bestRating": 5 },
    "badges": [ { "badgeType": "limited", "label": "Limited edition" } ]
  },
  {
    "slug": "santos",
    "name": "Brazil Santos",
    "url": "https://example.com/santos",
    "originCountry": "Brazil",
    "process": "natural",
    "roastLevel": "medium",
    "tastingNotes": "chocolate, caramel, nutty",
    "isBlend": false,
    "isDecaf": false,
    "variants": [
      { "weightGrams": 1000, "currentPrice": 18.0, "inStock": 1 }
    ],
    "badges": []
  }
]"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let feeds_dir = root.join("feeds");
    fs::create_dir_all(&feeds_dir).unwrap();
    fs::write(feeds_dir.join("test-shop.json"), FEED_INITIAL).unwrap();

    let config_content = format!(
        r#"[database]
path = "{root}/data/crema.sqlite"

[[shops]]
slug = "test-shop"
name = "Test Shop"
url = "https://example.com"
feed = "{root}/feeds/test-shop.json"

[scoring.weights]
price_value = 0.3
rating = 0.2
origin_quality = 0.15
review_score = 0.1
freshness = 0.1
awards = 0.05
subscription_savings = 0.05
special_badges = 0.05

[scoring]
freshness_window_days = 90

[scoring.price_tiers.budget]
max_per_kg = 15
label = "Budget"

[scoring.price_tiers.mid_range]
max_per_kg = 30
label = "Mid-range"

[scoring.price_tiers.premium]
max_per_kg = 50
label = "Premium"

[scoring.price_tiers.ultra_premium]
max_per_kg = 999
label = "Ultra-premium"

[scoring.origin_tiers.S]
score = 100
countries = ["Ethiopia", "Kenya"]

[scoring.origin_tiers.A]
score = 85
countries = ["Brazil", "Colombia"]

[alerts.price_drop]
min_percentage = 5
severity = "info"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("crema.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crema(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crema_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crema binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crema(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_crema(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_crema(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_shops_lists_feed_status() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_crema(&config_path, &["shops"]);
    assert!(success);
    assert!(stdout.contains("test-shop"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_sync_ingests_feed() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    let (stdout, stderr, success) = run_crema(&config_path, &["sync", "test-shop"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("items found: 2"));
    assert!(stdout.contains("new products: 2"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_sync_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);
    let (stdout, _, success) = run_crema(&config_path, &["sync", "all"]);

    assert!(success);
    assert!(stdout.contains("new products: 0"));
    assert!(stdout.contains("price changes: 0"));
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    let (stdout, _, success) = run_crema(&config_path, &["sync", "all", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("items found: 2"));

    // A real sync afterwards still sees everything as new
    let (stdout, _, _) = run_crema(&config_path, &["sync", "all"]);
    assert!(stdout.contains("new products: 2"));
}

#[test]
fn test_price_drop_produces_alert() {
    let (tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    // The shop lowers the Yirgacheffe price by 25%
    fs::write(tmp.path().join("feeds/test-shop.json"), FEED_PRICE_DROP).unwrap();
    let (stdout, _, success) = run_crema(&config_path, &["sync", "all"]);
    assert!(success);
    assert!(stdout.contains("price changes: 1"));

    let (stdout, _, success) = run_crema(&config_path, &["alerts", "list"]);
    assert!(success);
    assert!(stdout.contains("Price drop: Ethiopia Yirgacheffe"));
    assert!(stdout.contains("20.00"));
    assert!(stdout.contains("15.00"));
    assert!(stdout.contains("high"));
}

#[test]
fn test_alerts_read_flow() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    // Two new-product alerts from the first sync
    let (stdout, _, _) = run_crema(&config_path, &["alerts", "list", "--unread"]);
    assert!(stdout.contains("New product"));
    assert!(stdout.contains("2 unread"));

    let (stdout, _, success) = run_crema(&config_path, &["alerts", "read-all"]);
    assert!(success);
    assert!(stdout.contains("2 alerts marked read"));

    let (stdout, _, _) = run_crema(&config_path, &["alerts", "list", "--unread"]);
    assert!(stdout.contains("No alerts."));
}

#[test]
fn test_recommend_ranks_products() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    let (stdout, stderr, success) = run_crema(&config_path, &["recommend", "--top", "5"]);
    assert!(success, "recommend failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Top 2 recommendations"));
    assert!(stdout.contains("Ethiopia Yirgacheffe"));
    assert!(stdout.contains("Brazil Santos"));
    assert!(stdout.contains("confident"));
}

#[test]
fn test_recommend_json_output() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    let (stdout, _, success) = run_crema(&config_path, &["recommend", "--json"]);
    assert!(success);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0]["score"].as_i64().unwrap() > 0);
    assert!(results[0]["confidence"].as_f64().unwrap() > 0.0);
    assert!(results[0]["breakdown"].is_object());
}

#[test]
fn test_recommend_budget_filter() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    // Yirgacheffe is 8.00 €/100g, Santos 1.80 €/100g
    let (stdout, _, success) = run_crema(&config_path, &["recommend", "--budget", "3.0"]);
    assert!(success);
    assert!(stdout.contains("Brazil Santos"));
    assert!(!stdout.contains("Ethiopia Yirgacheffe"));
}

#[test]
fn test_recommend_flavor_filter() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    // Only the Santos notes mention chocolate
    let (stdout, _, success) = run_crema(&config_path, &["recommend", "--flavor", "chocolate"]);
    assert!(success);
    assert!(stdout.contains("Brazil Santos"));
    assert!(!stdout.contains("Ethiopia Yirgacheffe"));
}

#[test]
fn test_history_round_trip() {
    let (tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);
    fs::write(tmp.path().join("feeds/test-shop.json"), FEED_PRICE_DROP).unwrap();
    run_crema(&config_path, &["sync", "all"]);

    // Product 1 is the Yirgacheffe: two observations, most recent first
    let (stdout, stderr, success) = run_crema(&config_path, &["history", "--product", "1"]);
    assert!(success, "history failed: stdout={}, stderr={}", stdout, stderr);
    let first_pos = stdout.find("15.00").expect("latest price in history");
    let second_pos = stdout.find("20.00").expect("older price in history");
    assert!(first_pos < second_pos, "history not in descending order:\n{}", stdout);
}

#[test]
fn test_stats_overview() {
    let (_tmp, config_path) = setup_test_env();

    run_crema(&config_path, &["init"]);
    run_crema(&config_path, &["sync", "all"]);

    let (stdout, _, success) = run_crema(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Products:      2 (2 active)"));
    assert!(stdout.contains("Price history: 2 entries"));
    assert!(stdout.contains("test-shop"));
}

#[test]
fn test_invalid_config_is_fatal() {
    let (_tmp, config_path) = setup_test_env();

    // Break the weight sum
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        content.replace("price_value = 0.3", "price_value = 0.9"),
    )
    .unwrap();

    let (_, stderr, success) = run_crema(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("sum to 1.0"));
}
