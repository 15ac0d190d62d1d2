//! CLI tests for the `cortex` binary.
//!
//! Spawns the binary and verifies exit codes for configuration errors and for
//! short missions driven by a local one-shot chat server.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cortex::exit_codes;

fn cortex(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cortex"));
    cmd.current_dir(dir)
        .env_remove("OPENROUTER_API_KEY")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null());
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("spawn cortex")
}

/// Answer a single `/api/chat` request with `content` as the assistant message.
fn chat_server(content: &str) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    let body = serde_json::json!({
        "model": "llama3",
        "message": { "role": "assistant", "content": content },
        "done": true,
    })
    .to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).expect("read");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_lowercase();
            let Some(header_end) = text.find("\r\n\r\n") else {
                if n == 0 {
                    break;
                }
                continue;
            };
            let body_len = text[..header_end]
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if n == 0 || buf.len() >= header_end + 4 + body_len {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write");
    });
    (url, handle)
}

#[test]
fn missing_api_key_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path()).args([
        "--target",
        "example.com",
        "--objective",
        "identify open ports",
        "--yes",
    ]));

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENROUTER_API_KEY"));
}

#[test]
fn ollama_without_model_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path()).args([
        "--target",
        "example.com",
        "--objective",
        "identify open ports",
        "--provider",
        "ollama",
        "--yes",
    ]));

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("model name is required"));
}

#[test]
fn blank_target_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path())
        .env("OPENROUTER_API_KEY", "sk-test")
        .args(["--target", "  ", "--objective", "scan", "--yes"]));

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn missing_arguments_exit_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path()).args(["--target", "example.com"]));
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn missing_config_file_is_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path())
        .env("OPENROUTER_API_KEY", "sk-test")
        .args([
            "--target",
            "example.com",
            "--objective",
            "scan",
            "--config",
            "absent.toml",
            "--yes",
        ]));

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.toml"));
}

#[test]
fn closed_stdin_cancels_before_any_request() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = run(cortex(temp.path()).args([
        "--target",
        "example.com",
        "--objective",
        "scan",
        "--provider",
        "ollama",
        "--model",
        "llama3",
        "--ollama-url",
        "http://127.0.0.1:9",
    ]));

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Execution cancelled."));
}

#[test]
fn immediate_success_exits_ok_and_writes_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (url, server) = chat_server(r#"{"thought":"nothing to do","command":"FINISH_SUCCESS"}"#);

    let output = run(cortex(temp.path()).args([
        "--target",
        "example.com",
        "--objective",
        "identify open ports",
        "--provider",
        "ollama",
        "--model",
        "llama3",
        "--ollama-url",
        url.as_str(),
        "--history-json",
        "history.json",
        "--transcript",
        "session.log",
        "--yes",
    ]));
    server.join().expect("server");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let dump: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("history.json")).expect("history"),
    )
    .expect("json");
    assert_eq!(dump["mission"]["target"], "example.com");
    assert_eq!(dump["outcome"], "success");
    assert_eq!(dump["steps"][0]["step"], 1);

    let transcript = fs::read_to_string(temp.path().join("session.log")).expect("transcript");
    assert!(transcript.contains("[+] THOUGHT: nothing to do"));
    assert!(transcript.contains("Final Status: FINISH_SUCCESS"));
}

#[test]
fn declared_failure_exits_with_mission_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (url, server) = chat_server(r#"{"thought":"target unreachable","command":"FINISH_FAILURE"}"#);

    let output = run(cortex(temp.path()).args([
        "--target",
        "example.com",
        "--objective",
        "identify open ports",
        "--provider",
        "ollama",
        "--model",
        "llama3",
        "--ollama-url",
        url.as_str(),
        "--yes",
    ]));
    server.join().expect("server");

    assert_eq!(output.status.code(), Some(exit_codes::MISSION_FAILED));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Final Status: FINISH_FAILURE"));
}

#[cfg(unix)]
#[test]
fn interrupt_kills_running_command_and_exits() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let temp = tempfile::tempdir().expect("tempdir");
    let (url, server) = chat_server(r#"{"thought":"wait","command":"sleep 3; touch marker"}"#);

    let mut child = cortex(temp.path())
        .args([
            "--target",
            "example.com",
            "--objective",
            "identify open ports",
            "--provider",
            "ollama",
            "--model",
            "llama3",
            "--ollama-url",
            url.as_str(),
            "--yes",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cortex");
    server.join().expect("server");
    thread::sleep(Duration::from_millis(500));

    let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid"));
    kill(pid, Signal::SIGINT).expect("send SIGINT");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::INTERRUPTED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Interrupted."));
    thread::sleep(Duration::from_secs(4));
    assert!(!temp.path().join("marker").exists());
}
