//! Command-line integration tests
//!
//! Each test runs the `shopmcp` binary with HOME and the XDG directories
//! pointed at a temp dir, so no user config is read and logs stay local.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn command(home: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shopmcp"));
    cmd.args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY");
    cmd
}

fn shopmcp(home: &Path, args: &[&str]) -> Output {
    command(home, args).output().expect("run shopmcp")
}

/// Poll `check` every 50ms until it holds or `limit` passes
fn wait_for(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_call_get_price_through_child_server() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["call", "get_price", r#"{"product_id":"2"}"#]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("Smartphone"));
    assert!(out.contains("The price of Smartphone is $500.00"));
}

#[test]
fn test_in_process_tools_listing() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["--in-process", "tools"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Product Price Server"));
    for name in ["help", "get_price", "calculate_total", "apply_discount"] {
        assert!(out.contains(name), "missing {} in:\n{}", name, out);
    }
}

#[test]
fn test_unknown_product_exits_nonzero() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["call", "get_price", r#"{"product_id":"42"}"#]);

    assert!(!output.status.success());
    assert!(stdout(&output).contains("Product not found: 42"));
}

#[test]
fn test_invalid_json_arguments_rejected_before_spawn() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["call", "get_price", "{product_id: 1"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Tool arguments must be JSON"));
}

#[test]
fn test_ask_without_api_key_fails() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["ask", "筆電多少錢"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
}

#[test]
fn test_config_file_reaches_child_server() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.yml");
    fs::write(
        &config,
        r#"
catalog:
  products:
    - id: "7"
      name: Monitor
      price: 250
"#,
    )
    .unwrap();

    let output = shopmcp(
        home.path(),
        &["--config", config.to_str().unwrap(), "call", "get_price", r#"{"product_id":"7"}"#],
    );

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("The price of Monitor is $250.00"));
}

#[test]
fn test_log_file_written_under_data_dir() {
    let home = TempDir::new().unwrap();
    let output = shopmcp(home.path(), &["--in-process", "tools"]);
    assert!(output.status.success());

    let log = home.path().join("data").join("shopmcp").join("logs").join("client.log");
    assert!(log.exists(), "expected {}", log.display());
}

#[cfg(unix)]
#[test]
fn test_sigterm_during_handshake_reaps_child_server() {
    let home = TempDir::new().unwrap();
    let pid_file = home.path().join("child.pid");

    // A server that records its pid and never answers
    let script = home.path().join("silent.sh");
    fs::write(&script, format!("echo $$ > {}\nexec sleep 1000\n", pid_file.display())).unwrap();

    let config = home.path().join("silent.yml");
    fs::write(
        &config,
        format!(
            "server:\n  command: sh\n  args: [\"{}\"]\n  shutdown_grace_ms: 200\nclient:\n  request_timeout_ms: null\n",
            script.display()
        ),
    )
    .unwrap();

    let mut parent = command(home.path(), &["--config", config.to_str().unwrap(), "call", "help"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn shopmcp");

    let mut child_pid = None;
    assert!(
        wait_for(Duration::from_secs(10), || {
            child_pid = fs::read_to_string(&pid_file).ok().and_then(|s| s.trim().parse::<u32>().ok());
            child_pid.is_some()
        }),
        "child server never started"
    );
    let child_pid = child_pid.unwrap().to_string();

    let status = Command::new("kill").args(["-TERM", &parent.id().to_string()]).status().unwrap();
    assert!(status.success());

    let mut exit = None;
    assert!(
        wait_for(Duration::from_secs(10), || {
            exit = parent.try_wait().unwrap();
            exit.is_some()
        }),
        "shopmcp ignored SIGTERM"
    );

    let child_alive = || {
        Command::new("kill")
            .args(["-0", &child_pid])
            .stderr(Stdio::null())
            .status()
            .unwrap()
            .success()
    };
    let reaped = wait_for(Duration::from_secs(10), || !child_alive());
    if !reaped {
        let _ = Command::new("kill").args(["-KILL", &child_pid]).status();
    }
    assert!(reaped, "child server {} outlived shopmcp", child_pid);
    assert!(exit.unwrap().success());
}
