//! End-to-end tests for the `sitefreeze` binary against mock servers.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use common::sitefreeze_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_missing_front_key_fails_before_any_network_activity() {
    // Unreachable hosts: the run must fail on config alone.
    sitefreeze_cmd()
        .args([
            "--cms-host",
            "http://127.0.0.1:1",
            "--external-preview",
            "http://127.0.0.1:1",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SITEFREEZE_FRONT_KEY"));
}

#[test]
fn test_help_documents_the_flag_surface() {
    let assert = sitefreeze_cmd().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    for flag in [
        "--out",
        "--cms-host",
        "--front-key",
        "--piece-types",
        "--locales",
        "--build-cmd",
        "--serve-cmd",
        "--external-preview",
        "--static-dir",
        "--uploads-dir",
        "--concurrency",
        "--retries",
        "--timeout-ms",
        "--quiet",
    ] {
        assert!(output.contains(flag), "missing {flag} in --help output");
    }
}

#[test]
fn test_unreadable_locale_file_is_a_descriptive_error() {
    sitefreeze_cmd()
        .args([
            "--front-key",
            "secret",
            "--locales",
            "/nonexistent/locales.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locale file"));
}

#[cfg(target_os = "linux")]
mod interrupt {
    use std::path::Path;
    use std::process::{Command, Stdio};
    use std::time::Duration;

    fn wait_for_pid(path: &Path) -> i32 {
        for _ in 0..400 {
            if let Ok(raw) = std::fs::read_to_string(path) {
                if let Ok(pid) = raw.trim().parse() {
                    return pid;
                }
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        panic!("serve command never wrote its pid");
    }

    /// Gone or zombie both mean the process is no longer running.
    fn process_stopped(pid: i32) -> bool {
        for _ in 0..200 {
            match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => return true,
                Ok(stat) => {
                    if stat
                        .rsplit(") ")
                        .next()
                        .is_some_and(|rest| rest.starts_with('Z'))
                    {
                        return true;
                    }
                },
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        false
    }

    #[test]
    fn test_sigint_mid_supervision_stops_the_serve_process() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let serve_cmd = format!("echo $$ > {}; exec sleep 60", pid_file.display());

        // Port 1 never answers, so the run sits in readiness polling with a
        // live serve process when the signal lands.
        let mut command = Command::new(assert_cmd::cargo::cargo_bin!("sitefreeze"));
        command
            .args([
                "--front-key",
                "secret",
                "--cms-host",
                "http://127.0.0.1:1",
                "--build-cmd",
                "true",
                "--serve-cmd",
                &serve_cmd,
                "--port",
                "1",
                "--quiet",
                "--out",
            ])
            .arg(dir.path().join("dist"))
            .env_remove("SITEFREEZE_FRONT_KEY")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let mut cli = command.spawn().unwrap();

        let serve_pid = wait_for_pid(&pid_file);

        #[allow(clippy::cast_possible_wrap)]
        kill(Pid::from_raw(cli.id() as i32), Signal::SIGINT).unwrap();

        for _ in 0..400 {
            if cli.try_wait().unwrap().is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        if cli.try_wait().unwrap().is_none() {
            cli.kill().unwrap();
            panic!("cli ignored SIGINT");
        }

        assert!(
            process_stopped(serve_pid),
            "serve process survived the interrupt"
        );
    }
}

/// A content API serving one fixed page listing; everything else 404s.
async fn mock_cms() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "_url": "/" }, { "_url": "/about/" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_export_writes_static_tree() {
    let cms = mock_cms().await;

    let preview = MockServer::start().await;
    for (route, body) in [
        ("/", "<html>home</html>"),
        ("/about/", "<html>about</html>"),
        ("/404/", "<html>lost</html>"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&preview)
            .await;
    }

    let out = tempfile::tempdir().unwrap();
    let output_dir = out.path().join("dist");

    let cms_uri = cms.uri();
    let preview_uri = preview.uri();
    let dir_arg = output_dir.to_string_lossy().to_string();
    tokio::task::spawn_blocking(move || {
        sitefreeze_cmd()
            .args([
                "--front-key",
                "secret",
                "--cms-host",
                &cms_uri,
                "--external-preview",
                &preview_uri,
                "--piece-types",
                "articles",
                "--out",
                &dir_arg,
            ])
            .assert()
            .success();
    })
    .await
    .unwrap();

    assert_eq!(
        std::fs::read_to_string(output_dir.join("index.html")).unwrap(),
        "<html>home</html>"
    );
    assert!(output_dir.join("about/index.html").is_file());
    assert_eq!(
        std::fs::read_to_string(output_dir.join("404.html")).unwrap(),
        "<html>lost</html>"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_page_exits_one_but_keeps_output() {
    let cms = mock_cms().await;

    let preview = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .mount(&preview)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&preview)
        .await;

    let out = tempfile::tempdir().unwrap();
    let output_dir = out.path().join("dist");

    let cms_uri = cms.uri();
    let preview_uri = preview.uri();
    let dir_arg = output_dir.to_string_lossy().to_string();
    tokio::task::spawn_blocking(move || {
        sitefreeze_cmd()
            .args([
                "--front-key",
                "secret",
                "--cms-host",
                &cms_uri,
                "--external-preview",
                &preview_uri,
                "--piece-types",
                "articles",
                "--retries",
                "0",
                "--out",
                &dir_arg,
            ])
            .assert()
            .failure()
            .code(1);
    })
    .await
    .unwrap();

    // Degraded success: the page that rendered is still deployed.
    assert!(output_dir.join("index.html").is_file());
    assert!(!output_dir.join("about/index.html").exists());
}
