//! End-to-end subprocess session tests.
//!
//! These spawn real shell processes, so they are unix-only.
#![cfg(unix)]

use std::time::Duration;

use devkit_kernel::session::ShellSession;
use devkit_types::{BufferSink, DevError};

fn session() -> ShellSession {
    let mut session = ShellSession::new("/tmp");
    session.set_idle_timeout(Duration::from_secs(5));
    session
}

#[tokio::test]
async fn echo_output_lands_in_the_transcript() {
    let mut session = session();
    let mut process = session.invoke("echo hello").unwrap();
    let rendered = process.run_until_complete(None).await.unwrap();

    assert!(rendered.contains("$ echo hello"));
    assert!(rendered.contains("\nhello"));
    assert!(rendered.starts_with("```"));
}

#[tokio::test]
async fn output_streams_through_the_sink_incrementally() {
    let mut session = session();
    let mut sink = BufferSink::new();
    {
        let mut process = session.invoke("echo first && sleep 0.2 && echo second").unwrap();
        process.run_until_complete(Some(&mut sink)).await.unwrap();
    }

    // At minimum the command echo, then growing transcripts.
    assert!(sink.sends().len() >= 2);
    assert!(sink.sends()[0].contains("$ echo first"));
    let last = sink.last().unwrap();
    assert!(last.contains("first"));
    assert!(last.contains("second"));
}

#[tokio::test]
async fn stderr_is_interleaved_with_stdout() {
    let mut session = session();
    let mut process = session.invoke("echo out && echo err 1>&2").unwrap();
    let rendered = process.run_until_complete(None).await.unwrap();

    assert!(rendered.contains("out"));
    assert!(rendered.contains("err"));
}

#[tokio::test]
async fn cwd_changes_survive_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().canonicalize().unwrap();

    let mut session = session();
    {
        let mut process = session
            .invoke(&format!("cd {}", path.display()))
            .unwrap();
        process.run_until_complete(None).await.unwrap();
    }
    assert_eq!(session.working_directory(), path.to_str().unwrap());

    let mut process = session.invoke("pwd").unwrap();
    let rendered = process.run_until_complete(None).await.unwrap();
    assert!(rendered.contains(path.to_str().unwrap()));
}

#[tokio::test]
async fn exit_command_terminates_the_session() {
    let mut session = session();
    {
        let mut process = session.invoke("exit").unwrap();
        process.run_until_complete(None).await.unwrap();
    }
    assert!(session.is_terminated());

    let err = session.invoke("echo again").unwrap_err();
    assert!(matches!(err, DevError::ConnectionRefused(_)));
}

#[tokio::test]
async fn silence_past_the_idle_window_is_a_timeout() {
    let mut session = ShellSession::new("/tmp");
    session.set_idle_timeout(Duration::from_millis(200));

    let mut process = session.invoke("sleep 30").unwrap();
    let err = process.get_next_line().await.unwrap_err();
    assert!(matches!(err, DevError::Timeout(_)));
    process.close().await;
}

#[tokio::test]
async fn timeout_leaves_an_exit_message_in_the_transcript() {
    let mut session = ShellSession::new("/tmp");
    session.set_idle_timeout(Duration::from_millis(200));

    let rendered = {
        let mut process = session.invoke("sleep 30").unwrap();
        process.run_until_complete(None).await.unwrap()
    };
    assert!(rendered.contains("Timed out."));
    assert!(session.is_terminated());
}

#[tokio::test]
async fn kill_handle_interrupts_a_blocked_read() {
    let mut session = session();
    let mut process = session.invoke("sleep 30").unwrap();
    let handle = process.kill_handle();

    let killer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.kill();
    });

    let err = process.get_next_line().await.unwrap_err();
    assert!(matches!(err, DevError::Interrupted(_)));
    // Reaped: the child recorded an exit status after the kill.
    assert!(process.exit_code().is_some());
    killer.await.unwrap();
}

#[tokio::test]
async fn forced_kill_ends_run_until_complete_with_a_notice() {
    let mut session = session();
    let rendered = {
        let mut process = session.invoke("echo start && sleep 30").unwrap();
        let handle = process.kill_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.kill();
        });
        process.run_until_complete(None).await.unwrap()
    };
    assert!(rendered.contains("start"));
    assert!(rendered.contains("Force killed."));
}

#[tokio::test]
async fn fast_exit_with_no_output_is_not_an_error() {
    let mut session = session();
    let mut process = session.invoke("true").unwrap();
    let rendered = process.run_until_complete(None).await.unwrap();
    assert!(rendered.contains("$ true"));
}

#[tokio::test]
async fn double_backticks_in_output_cannot_break_the_fence() {
    let mut session = session();
    let mut process = session.invoke("printf 'a``b\\n'").unwrap();
    let rendered = process.run_until_complete(None).await.unwrap();
    assert!(rendered.contains("a`\u{200b}`b"));
}
