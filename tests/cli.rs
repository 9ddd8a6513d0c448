use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::JoinHandle;
use tempfile::tempdir;

const ROOT_PAGE: &str = "<html>offline shell</html>";

fn write_config(dir: &Path, origin: &str, manifest: &[&str]) -> PathBuf {
    write_config_with(dir, origin, manifest, "")
}

fn write_config_with(dir: &Path, origin: &str, manifest: &[&str], extra: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    let mut contents = format!("origin: {origin}\nversion: v-test\ncache_prefix: app\n{extra}manifest:\n");
    for entry in manifest {
        contents.push_str(&format!("  - {entry}\n"));
    }
    fs::write(&path, contents).expect("failed to write config");
    path
}

/// swcache pointed at an isolated config and cache directory
fn swcache(config: &Path, cache_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("swcache"));
    cmd.arg("--config")
        .arg(config)
        .arg("--cache-dir")
        .arg(cache_dir)
        .env_remove("SWCACHE_CONFIG")
        .env_remove("SWCACHE_ORIGIN")
        .env_remove("SWCACHE_VERSION")
        .env_remove("SWCACHE_CACHE_DIR")
        .env_remove("SWCACHE_FORMAT")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy");
    cmd
}

/// Answer exactly one HTTP request, then close the port.
///
/// A mockito server keeps listening for its whole lifetime, so it cannot
/// stand in for an origin that goes away between two commands.
fn serve_once(body: &'static str) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let origin = format!("http://{}", listener.local_addr().expect("addr"));

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .expect("write");
    });

    (origin, handle)
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn version_reports_uninstalled_cache() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = write_config(temp.path(), "http://127.0.0.1:9", &["/"]);

    swcache(&config, &temp.path().join("cache"))
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("swcache version"))
        .stdout(predicate::str::contains("v-test (not installed)"));

    Ok(())
}

#[test]
fn cache_path_honours_cache_dir() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = write_config(temp.path(), "http://127.0.0.1:9", &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(cache_dir.to_string_lossy().to_string()));

    Ok(())
}

#[test]
fn sweep_requires_registration() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = write_config(temp.path(), "http://127.0.0.1:9", &["/"]);

    swcache(&config, &temp.path().join("cache"))
        .arg("sweep")
        .assert()
        .failure()
        .stderr(predicate::str::contains("swcache register"));

    Ok(())
}

#[test]
fn register_fails_when_origin_unreachable() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let config = write_config(temp.path(), "http://127.0.0.1:9", &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir)
        .arg("register")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch required asset"));

    // Nothing was activated
    swcache(&config, &cache_dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));

    Ok(())
}

#[test]
fn navigation_falls_back_to_root_document_offline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config(temp.path(), &origin, &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir)
        .arg("register")
        .assert()
        .success()
        .stdout(predicate::str::contains("activated"));
    server.join().expect("server thread");

    // Origin is gone now; any page resolves to the cached shell
    let output = swcache(&config, &cache_dir)
        .args(["fetch", "/reports/2024", "--accept", "text/html", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["data"]["source"], "cache");
    assert_eq!(json["data"]["policy"], "navigation");
    assert_eq!(json["data"]["body"], ROOT_PAGE);

    Ok(())
}

#[test]
fn static_miss_fails_offline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config(temp.path(), &origin, &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();
    server.join().expect("server thread");

    swcache(&config, &cache_dir)
        .args(["fetch", "/static/missing.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));

    Ok(())
}

#[test]
fn reregistering_unchanged_version_works_offline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config(temp.path(), &origin, &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();
    server.join().expect("server thread");

    swcache(&config, &cache_dir)
        .arg("register")
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));

    swcache(&config, &cache_dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cache version v-test"))
        .stdout(predicate::str::contains("not installed").not());

    Ok(())
}

#[test]
fn changed_manifest_waits_until_skip_waiting() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let cache_dir = temp.path().join("cache");

    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config(temp.path(), &origin, &["/"]);
    swcache(&config, &cache_dir).arg("register").assert().success();
    server.join().expect("server thread");

    // Same version tag, new manifest, no eager takeover
    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config_with(temp.path(), &origin, &["/index.html"], "eager_takeover: false\n");
    swcache(&config, &cache_dir)
        .arg("register")
        .assert()
        .success()
        .stdout(predicate::str::contains("waiting"));
    server.join().expect("server thread");

    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config_with(temp.path(), &origin, &["/index.html"], "eager_takeover: false\n");
    swcache(&config, &cache_dir)
        .args(["register", "--skip-waiting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("activated"));
    server.join().expect("server thread");

    // The new definition is now the one on record
    swcache(&config, &cache_dir)
        .arg("register")
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));

    Ok(())
}

#[test]
fn push_click_opens_notification_target() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let (origin, server) = serve_once(ROOT_PAGE);
    let config = write_config(temp.path(), &origin, &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();
    server.join().expect("server thread");

    let output = swcache(&config, &cache_dir)
        .args(["push", "--click", "--format", "json"])
        .output()?;
    assert!(output.status.success());
    let json = json_stdout(&output);
    assert!(json["data"]["click"]["Opened"].is_u64());

    let output = swcache(&config, &cache_dir)
        .args(["push", "--click", "close", "--format", "json"])
        .output()?;
    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["data"]["click"], "Dismissed");

    Ok(())
}

#[cfg_attr(not(feature = "http-tests"), ignore)]
#[test]
fn api_offline_payload_when_origin_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _root = server.mock("GET", "/").with_status(200).with_body(ROOT_PAGE).create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), &server.url(), &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();

    // Every later request gets an error status
    server.reset();

    let output = swcache(&config, &cache_dir)
        .args(["fetch", "/api/stats", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["data"]["status"], 503);
    assert_eq!(json["data"]["source"], "offline");
    assert_eq!(json["data"]["content_type"], "application/json");

    let payload: serde_json::Value =
        serde_json::from_str(json["data"]["body"].as_str().expect("body"))?;
    assert_eq!(payload["offline"], true);
    assert!(payload["error"].is_string());
    assert!(payload["message"].is_string());

    Ok(())
}

#[cfg_attr(not(feature = "http-tests"), ignore)]
#[test]
fn static_asset_is_served_from_cache() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _root = server.mock("GET", "/").with_status(200).with_body(ROOT_PAGE).create();
    let app_js = server
        .mock("GET", "/static/app.js")
        .with_status(200)
        .with_body("boot()")
        .expect(1)
        .create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), &server.url(), &["/", "/static/app.js"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();

    let output = swcache(&config, &cache_dir)
        .args(["fetch", "/static/app.js", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["data"]["source"], "cache");
    assert_eq!(json["data"]["body"], "boot()");

    // Only the install touched the origin
    app_js.assert();

    Ok(())
}

#[cfg_attr(not(feature = "http-tests"), ignore)]
#[test]
fn new_version_removes_old_partitions() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _root = server
        .mock("GET", "/")
        .with_status(200)
        .with_body(ROOT_PAGE)
        .expect_at_least(2)
        .create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), &server.url(), &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();
    swcache(&config, &cache_dir)
        .args(["register", "--cache-version", "v-next"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app-static-v-test"));

    let output = swcache(&config, &cache_dir)
        .args(["cache", "status", "--format", "json", "--cache-version", "v-next"])
        .output()?;
    let json = json_stdout(&output);
    let names: Vec<&str> = json["data"]
        .as_array()
        .expect("partition list")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();

    assert!(names.contains(&"app-static-v-next"));
    assert!(names.iter().all(|n| !n.ends_with("v-test")));

    Ok(())
}

#[cfg_attr(not(feature = "http-tests"), ignore)]
#[test]
fn push_renders_notification_for_registered_worker() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new();
    let _root = server.mock("GET", "/").with_status(200).with_body(ROOT_PAGE).create();

    let temp = tempdir()?;
    let config = write_config(temp.path(), &server.url(), &["/"]);
    let cache_dir = temp.path().join("cache");

    swcache(&config, &cache_dir).arg("register").assert().success();

    let output = swcache(&config, &cache_dir)
        .args(["push", "--body", "Budget report ready", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let json = json_stdout(&output);
    assert_eq!(json["data"]["body"], "Budget report ready");
    assert_eq!(json["data"]["actions"].as_array().map(Vec::len), Some(2));

    Ok(())
}
