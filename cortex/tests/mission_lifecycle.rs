//! End-to-end mission scenarios through the public API.
//!
//! Drives the controller and report synthesizer with scripted doubles and
//! checks history, conversation, spill files and the report gate together.

use std::fs;
use std::time::Duration;

use cortex::console::NullObserver;
use cortex::core::report::Report;
use cortex::core::types::{ChatMessage, MissionSpec, Outcome};
use cortex::io::history_store::write_history;
use cortex::io::spill::{DEFAULT_SPILL_THRESHOLD, OutputSpillManager};
use cortex::llm::BackendError;
use cortex::llm::retry::{RetryPolicy, RetryingClient};
use cortex::mission::{MissionController, MissionSettings, MissionStop};
use cortex::prompt::PromptEngine;
use cortex::report::ReportSynthesizer;
use cortex::test_support::{
    RecordingObserver, RecordingSleeper, ScriptedBackend, ScriptedClient, ScriptedExecutor,
};

fn mission() -> MissionSpec {
    MissionSpec::new("example.com", "identify open ports").expect("spec")
}

fn system_prompt() -> String {
    PromptEngine::new()
        .system_prompt(DEFAULT_SPILL_THRESHOLD)
        .expect("system prompt")
}

#[test]
fn scan_then_success_produces_narrative_report() {
    let temp = tempfile::tempdir().expect("tempdir");
    let client = ScriptedClient::texts([
        r#"{"thought":"scan","command":"nmap -F example.com"}"#,
        r#"{"thought":"ports found","command":"FINISH_SUCCESS"}"#,
        "# Penetration Test Report\n## Executive Summary\nPort 80 is open.\n## Proof of Concept (PoC)\n```\n80/tcp open http\n```",
    ]);
    let executor = ScriptedExecutor::new(["PORT   STATE SERVICE\n80/tcp open  http\n"]);
    let observer = RecordingObserver::default();

    let finished = MissionController::new(
        mission(),
        system_prompt(),
        &client,
        &executor,
        &observer,
        OutputSpillManager::new(temp.path(), DEFAULT_SPILL_THRESHOLD),
        MissionSettings::default(),
    )
    .run()
    .expect("run");

    let first = &finished.history.records()[0];
    assert_eq!(first.step, 1);
    assert_eq!(first.command, "nmap -F example.com");
    assert!(!first.result.is_empty());

    let prompts = PromptEngine::new();
    let report = ReportSynthesizer::new(&client, &prompts)
        .generate_and_render(&mission(), &finished.history, &observer)
        .expect("report");
    assert!(report.is_narrative());
    assert_eq!(client.calls(), 3);

    let sent = client.sent();
    let report_call = &sent[2];
    assert_eq!(report_call.len(), 1);
    assert!(report_call[0].content.contains("80/tcp open  http"));
    assert_eq!(observer.report(), Some(report));
}

#[test]
fn transient_backend_failures_are_absorbed_by_retry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let backend = ScriptedBackend::new(vec![
        Err(BackendError::Transport("dns failure".into())),
        Err(BackendError::Status {
            code: 502,
            body: "bad gateway".into(),
        }),
        Ok(r#"{"thought":"quit","command":"FINISH_FAILURE"}"#.into()),
    ]);
    let sleeper = RecordingSleeper::default();
    let client = RetryingClient::with_sleeper(&backend, RetryPolicy::default(), &sleeper);
    let executor = ScriptedExecutor::default();

    let finished = MissionController::new(
        mission(),
        system_prompt(),
        &client,
        &executor,
        NullObserver,
        OutputSpillManager::new(temp.path(), DEFAULT_SPILL_THRESHOLD),
        MissionSettings::default(),
    )
    .run()
    .expect("run");

    assert!(sleeper.total() >= Duration::from_secs(15));
    assert_eq!(backend.calls(), 3);
    assert_eq!(finished.history.records()[0].thought, "quit");
    assert_eq!(finished.stop, MissionStop::Terminal(Outcome::Failure));
}

#[test]
fn unreachable_backend_ends_mission_as_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let backend = ScriptedBackend::new(Vec::new());
    let sleeper = RecordingSleeper::default();
    let client = RetryingClient::with_sleeper(&backend, RetryPolicy::default(), &sleeper);
    let executor = ScriptedExecutor::default();

    let finished = MissionController::new(
        mission(),
        system_prompt(),
        &client,
        &executor,
        NullObserver,
        OutputSpillManager::new(temp.path(), DEFAULT_SPILL_THRESHOLD),
        MissionSettings::default(),
    )
    .run()
    .expect("run");

    assert_eq!(finished.outcome(), Outcome::Failure);
    assert_eq!(finished.history.len(), 1);
    assert!(executor.commands().is_empty());

    let prompts = PromptEngine::new();
    let report = ReportSynthesizer::new(&client, &prompts)
        .generate(&mission(), &finished.history)
        .expect("report");
    assert!(!report.is_narrative());
    assert_eq!(backend.calls(), 3);
}

#[test]
fn large_output_is_spilled_and_referenced_by_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let big = "x".repeat(40_000);
    let client = ScriptedClient::texts([
        r#"{"thought":"crawl","command":"curl -s http://example.com/big"}"#,
        r#"{"thought":"inspect","command":"grep -c x output_step_1.log"}"#,
        r#"{"thought":"done","command":"FINISH_SUCCESS"}"#,
        "# Report",
    ]);
    let executor = ScriptedExecutor::new([big.clone(), "1\n".to_string()]);

    let finished = MissionController::new(
        mission(),
        system_prompt(),
        &client,
        &executor,
        NullObserver,
        OutputSpillManager::new(temp.path(), DEFAULT_SPILL_THRESHOLD),
        MissionSettings::default(),
    )
    .run()
    .expect("run");

    let spill_file = temp.path().join("output_step_1.log");
    assert_eq!(fs::read(&spill_file).expect("spill"), big.as_bytes());
    assert!(finished.history.records()[0].result_pointer.is_some());

    // The second model call sees the file name, never the spilled content.
    let sent = client.sent();
    let second_call: &[ChatMessage] = &sent[1];
    let feedback = &second_call.last().expect("feedback").content;
    assert!(feedback.contains("output_step_1.log"));
    assert!(second_call.iter().all(|m| !m.content.contains(&big)));
    assert!(!temp.path().join("output_step_2.log").exists());
}

#[test]
fn immediate_success_short_circuits_report_and_dumps_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let client = ScriptedClient::texts([r#"{"thought":"nothing to do","command":"FINISH_SUCCESS"}"#]);
    let executor = ScriptedExecutor::default();

    let finished = MissionController::new(
        mission(),
        system_prompt(),
        &client,
        &executor,
        NullObserver,
        OutputSpillManager::new(temp.path(), DEFAULT_SPILL_THRESHOLD),
        MissionSettings::default(),
    )
    .run()
    .expect("run");
    assert_eq!(finished.history.len(), 1);

    let prompts = PromptEngine::new();
    let report = ReportSynthesizer::new(&client, &prompts)
        .generate(&mission(), &finished.history)
        .expect("report");
    assert!(matches!(report, Report::Summary { .. }));
    assert_eq!(client.calls(), 1);

    let path = temp.path().join("history.json");
    write_history(&path, &mission(), Some(finished.outcome()), &finished.history)
        .expect("write history");
    let dump: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(dump["outcome"], "success");
    assert_eq!(dump["steps"].as_array().map(Vec::len), Some(1));
    assert_eq!(dump["steps"][0]["command"], "FINISH_SUCCESS");
}
