// tests/runtime_fake_executor.rs

mod common;
use crate::common::{decode, Agent, PASSWORD, TEST_PATH, USER};

use std::sync::Arc;

use rcmd::config::ConfigFile;
use rcmd::engine::{RuntimeEvent, TaskEvent};
use rcmd::errors::CmdError;
use rcmd::fs::RealFileSystem;
use rcmd::resolve::ExecutableResolver;
use rcmd::types::OutputStream;
use rcmd_test_utils::builders::{RequestBuilder, ShadowFixture};
use rcmd_test_utils::fake_executor::{FakeExecutor, FakeExecutorHandle};
use rcmd_test_utils::{assert_no_reply, init_tracing};

fn config(shadow: &ShadowFixture, max_concurrent: usize, backlog_limit: Option<usize>) -> ConfigFile {
    let mut cfg = shadow.config();
    cfg.exec.max_concurrent = max_concurrent;
    cfg.exec.backlog_limit = backlog_limit;
    cfg.exec.search_path = Some(TEST_PATH.to_string());
    cfg
}

fn start(cfg: &ConfigFile, executor: FakeExecutor) -> Agent {
    Agent::start(cfg, move |_events| executor)
}

/// A request whose first parameter is its token, so launches can be matched
/// back to requests.
fn echo(token: &str) -> serde_json::Value {
    RequestBuilder::new(token)
        .credentials(USER, PASSWORD)
        .cmd("echo")
        .params(&[token])
        .build()
}

async fn launched_token(handle: &mut FakeExecutorHandle) -> (rcmd::types::TaskId, String) {
    let req = handle.next_launch().await;
    (req.id, req.args[0].clone())
}

async fn finish(agent: &Agent, task: rcmd::types::TaskId, code: i32) {
    agent
        .events
        .send(RuntimeEvent::Task(TaskEvent::Exited { task, code }))
        .await
        .unwrap();
}

#[tokio::test]
async fn completed_task_replies_with_token_code_and_output() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 5, None), executor);

    agent.send(echo("tok-1")).await;
    let (id, token) = launched_token(&mut handle).await;
    assert_eq!(token, "tok-1");

    for (stream, chunk) in [
        (OutputStream::Stdout, &b"hello "[..]),
        (OutputStream::Stderr, &b"warn"[..]),
        (OutputStream::Stdout, &b"world\n"[..]),
    ] {
        agent
            .events
            .send(RuntimeEvent::Task(TaskEvent::Output {
                task: id,
                stream,
                chunk: chunk.to_vec(),
            }))
            .await
            .unwrap();
    }
    finish(&agent, id, 3).await;

    let reply = agent.reply().await;
    assert_eq!(reply["type"], "cmd");
    assert_eq!(reply["token"], "tok-1");
    assert_eq!(reply["attrs"]["code"], 3);
    assert_eq!(decode(&reply, "stdout"), b"hello world\n");
    assert_eq!(decode(&reply, "stderr"), b"warn");

    let core = agent.shutdown().await;
    assert!(core.is_idle());
    assert_eq!(handle.released(), vec![id]);
}

#[tokio::test]
async fn wrong_password_is_denied_without_launch() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 5, None), executor);

    agent
        .send(
            RequestBuilder::new("t")
                .credentials(USER, "guess")
                .cmd("echo")
                .build(),
        )
        .await;

    let reply = agent.reply().await;
    assert_eq!(reply["token"], "t");
    assert_eq!(reply["attrs"]["err"], CmdError::PermissionDenied.code());
    assert_eq!(reply["attrs"]["msg"], "operation not permitted");
    handle.assert_no_launch(50).await;
    assert_no_reply(&mut agent.replies, 50).await;
}

#[tokio::test]
async fn missing_credentials_are_denied() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 5, None), executor);

    agent.send(RequestBuilder::new("anon").cmd("echo").build()).await;

    let reply = agent.reply().await;
    assert_eq!(reply["attrs"]["err"], 1);
    handle.assert_no_launch(50).await;
}

#[tokio::test]
async fn unresolvable_command_is_not_found() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 5, None), executor);

    agent
        .send(
            RequestBuilder::new("nf")
                .credentials(USER, PASSWORD)
                .cmd("definitely-not-a-real-command-xyz")
                .build(),
        )
        .await;

    let reply = agent.reply().await;
    assert_eq!(reply["token"], "nf");
    assert_eq!(reply["attrs"]["err"], 2);
    assert_eq!(reply["attrs"]["msg"], "not found");
    handle.assert_no_launch(50).await;
}

#[tokio::test]
async fn foreign_message_types_are_ignored() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 5, None), executor);

    agent
        .send(
            RequestBuilder::new("other")
                .credentials(USER, PASSWORD)
                .cmd("echo")
                .msg_type(Some("ping"))
                .build(),
        )
        .await;

    assert_no_reply(&mut agent.replies, 100).await;
    handle.assert_no_launch(10).await;
}

#[tokio::test]
async fn excess_requests_wait_and_launch_in_arrival_order() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 2, None), executor);

    for token in ["a", "b", "c", "d", "e"] {
        agent.send(echo(token)).await;
    }

    let (a, ta) = launched_token(&mut handle).await;
    let (b, tb) = launched_token(&mut handle).await;
    assert_eq!((ta.as_str(), tb.as_str()), ("a", "b"));
    handle.assert_no_launch(100).await;

    finish(&agent, b, 0).await;
    assert_eq!(agent.reply().await["token"], "b");
    let (c, tc) = launched_token(&mut handle).await;
    assert_eq!(tc, "c");
    handle.assert_no_launch(50).await;

    finish(&agent, a, 0).await;
    assert_eq!(agent.reply().await["token"], "a");
    let (d, td) = launched_token(&mut handle).await;
    assert_eq!(td, "d");

    finish(&agent, c, 0).await;
    agent.reply().await;
    let (e, te) = launched_token(&mut handle).await;
    assert_eq!(te, "e");

    finish(&agent, d, 0).await;
    finish(&agent, e, 0).await;
    agent.reply().await;
    agent.reply().await;

    let core = agent.shutdown().await;
    assert!(core.is_idle());
    assert_eq!(handle.released().len(), 5);
}

#[tokio::test]
async fn full_backlog_replies_overloaded() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 1, Some(1)), executor);

    agent.send(echo("run")).await;
    agent.send(echo("wait")).await;
    agent.send(echo("drop")).await;

    let reply = agent.reply().await;
    assert_eq!(reply["token"], "drop");
    assert_eq!(reply["attrs"]["err"], 6);
    assert_eq!(reply["attrs"]["msg"], "too many pending commands");

    let (id, _) = launched_token(&mut handle).await;
    finish(&agent, id, 0).await;
    assert_eq!(agent.reply().await["token"], "run");
    let (_, next) = launched_token(&mut handle).await;
    assert_eq!(next, "wait");
}

#[tokio::test]
async fn failed_launch_replies_and_promotes_the_backlog() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let cfg = config(&shadow, 1, None);
    let false_path = ExecutableResolver::new(TEST_PATH, Arc::new(RealFileSystem))
        .resolve("false")
        .expect("`false` should be on the test search path");

    let (executor, mut handle) = FakeExecutor::new();
    let executor = executor.failing(false_path, CmdError::SystemError);
    let mut agent = start(&cfg, executor);

    agent
        .send(
            RequestBuilder::new("broken")
                .credentials(USER, PASSWORD)
                .cmd("false")
                .build(),
        )
        .await;
    agent.send(echo("next")).await;

    let reply = agent.reply().await;
    assert_eq!(reply["token"], "broken");
    assert_eq!(reply["attrs"]["err"], 4);
    assert_eq!(reply["attrs"]["msg"], "sys error");

    let (_, token) = launched_token(&mut handle).await;
    assert_eq!(token, "next");
}

#[tokio::test]
async fn timeout_is_silent_and_frees_the_slot() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 1, None), executor);

    agent.send(echo("slow")).await;
    agent.send(echo("after")).await;

    let (slow, _) = launched_token(&mut handle).await;
    agent
        .events
        .send(RuntimeEvent::Task(TaskEvent::TimedOut { task: slow }))
        .await
        .unwrap();

    let (after, token) = launched_token(&mut handle).await;
    assert_eq!(token, "after");
    assert_no_reply(&mut agent.replies, 50).await;

    // A stale exit for the timed-out task changes nothing.
    finish(&agent, slow, 0).await;
    assert_no_reply(&mut agent.replies, 50).await;

    finish(&agent, after, 0).await;
    assert_eq!(agent.reply().await["token"], "after");
    assert_eq!(handle.released(), vec![slow, after]);
}

#[tokio::test]
async fn timeout_reply_can_be_enabled() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let mut cfg = config(&shadow, 1, None);
    cfg.exec.reply_on_timeout = true;
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&cfg, executor);

    agent.send(echo("slow")).await;
    let (slow, _) = launched_token(&mut handle).await;
    agent
        .events
        .send(RuntimeEvent::Task(TaskEvent::TimedOut { task: slow }))
        .await
        .unwrap();

    let reply = agent.reply().await;
    assert_eq!(reply["token"], "slow");
    assert_eq!(reply["attrs"]["err"], 7);
    assert_eq!(reply["attrs"]["msg"], "timeout");
}

#[tokio::test]
async fn closed_input_waits_for_admitted_tasks_before_stopping() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, mut handle) = FakeExecutor::new();
    let mut agent = start(&config(&shadow, 1, None), executor);

    agent.send(echo("running")).await;
    agent.send(echo("queued")).await;
    let (running, _) = launched_token(&mut handle).await;

    agent.close_input().await;
    // Requests after the end of input are not admitted.
    agent.send(echo("late")).await;
    assert_no_reply(&mut agent.replies, 50).await;
    assert!(agent.is_running());

    finish(&agent, running, 0).await;
    assert_eq!(agent.reply().await["token"], "running");
    let (queued, token) = launched_token(&mut handle).await;
    assert_eq!(token, "queued");
    assert!(agent.is_running());

    finish(&agent, queued, 0).await;
    assert_eq!(agent.reply().await["token"], "queued");

    let core = agent.join().await;
    assert!(core.is_idle());
    assert_eq!(handle.released(), vec![running, queued]);
}

#[tokio::test]
async fn closed_input_with_nothing_running_stops_at_once() {
    init_tracing();
    let shadow = ShadowFixture::with_users(&[(USER, PASSWORD)]);
    let (executor, _handle) = FakeExecutor::new();
    let agent = start(&config(&shadow, 1, None), executor);

    agent.close_input().await;
    let core = agent.join().await;
    assert!(core.is_idle());
}
