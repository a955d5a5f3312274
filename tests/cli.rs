use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const ENV_VARS: [&str; 8] = [
    "STOCKCACHE_FORMAT",
    "STOCKCACHE_CONFIG",
    "STOCKCACHE_API_URL",
    "STOCKCACHE_TENANT",
    "STOCKCACHE_DEBUG",
    "STOCKCACHE_NO_CACHE",
    "STOCKCACHE_CACHE_DIR",
    "STOCKCACHE_API_TOKEN",
];

/// The binary with a clean environment and an isolated cache directory
fn stockcache(cache_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stockcache"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--cache-dir").arg(cache_dir);
    cmd
}

fn write_config(dir: &Path, api_url: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    let contents = format!(
        "api_url: {api_url}\napi_token: test-token\ntenant_id: acme\ncache:\n  expiration_secs: 120\n"
    );
    fs::write(&path, contents).expect("failed to write config");
    path
}

#[test]
fn init_writes_config_from_flags() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = temp.path().join("nested").join("config.yaml");

    stockcache(temp.path())
        .arg("init")
        .arg("--config")
        .arg(&config_path)
        .arg("--api-url")
        .arg("https://stock.example.com/api/")
        .arg("--token")
        .arg("secret")
        .arg("--tenant")
        .arg("north")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration saved"));

    let saved = fs::read_to_string(&config_path)?;
    assert!(saved.contains("https://stock.example.com/api"));
    assert!(!saved.contains("/api/"));
    assert!(saved.contains("api_token: secret"));
    assert!(saved.contains("tenant_id: north"));
    Ok(())
}

#[test]
fn status_uses_custom_config_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config_path = write_config(temp.path(), "https://stock.example.com/api");

    let assert = stockcache(temp.path())
        .arg("status")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(stdout.contains("Tenant: acme"));
    assert!(stdout.contains(&config_path.to_string_lossy().to_string()));
    assert!(stdout.contains("TTL 120s"));
    Ok(())
}

#[test]
fn status_without_config_suggests_init() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    stockcache(temp.path())
        .arg("status")
        .arg("--config")
        .arg(temp.path().join("missing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration not found"));
    Ok(())
}

#[test]
fn cache_path_honors_override() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let cache_dir = temp.path().join("cache");

    stockcache(&cache_dir)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(cache_dir.to_string_lossy().to_string()));
    Ok(())
}

#[test]
fn cache_status_and_clear_on_empty_cache() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = temp.path().join("missing.yaml");

    let assert = stockcache(temp.path())
        .args(["cache", "status", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(json["total_entries"], 0);
    assert_eq!(json["enabled"], true);

    stockcache(temp.path())
        .args(["cache", "clear", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache was already empty"));

    stockcache(temp.path())
        .args(["cache", "keys", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found."));
    Ok(())
}

#[test]
fn invalidate_pattern_on_empty_cache() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    stockcache(temp.path())
        .args(["invalidate", "--pattern", "batches", "--config"])
        .arg(temp.path().join("missing.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached entries matched pattern batches"));
    Ok(())
}

#[test]
fn invalidate_rejects_two_selectors() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    stockcache(temp.path())
        .args(["invalidate", "--key", "a", "--resource", "loans"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn get_without_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    stockcache(temp.path())
        .args(["get", "batches", "--config"])
        .arg(temp.path().join("missing.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("stockcache init"));
    Ok(())
}

#[test]
fn get_rejects_unknown_resource() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;

    stockcache(temp.path())
        .args(["get", "widgets"])
        .assert()
        .failure();
    Ok(())
}

#[cfg_attr(not(feature = "http-tests"), ignore)]
#[test]
fn get_batches_is_cached_between_runs() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/batches")
        .match_query(mockito::Matcher::Any)
        .match_header("x-tenant-id", "acme")
        .with_status(200)
        .with_body(r#"{"data":[{"code":"B-001","qty":4}],"meta":{"current_page":1,"last_page":1,"total":1}}"#)
        .expect(1)
        .create();

    let temp = tempdir()?;
    let config_path = write_config(temp.path(), &server.url());

    for _ in 0..2 {
        let assert = stockcache(temp.path())
            .args(["get", "batches", "--format", "json", "--config"])
            .arg(&config_path)
            .assert()
            .success();
        let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
        assert!(stdout.contains("B-001"));
        assert!(stdout.contains("batches_page_1_20@acme"));
    }
    mock.assert();

    stockcache(temp.path())
        .args(["cache", "keys", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("batches_page_1_20@acme"));

    stockcache(temp.path())
        .args(["invalidate", "--resource", "batches", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalidated 1 entries"));
    Ok(())
}
