// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn command_completes_within_timeout() {
    let mut cmd = Command::new("true");
    cmd.stdout(std::process::Stdio::null());
    let output = run_with_timeout(cmd, Duration::from_secs(5), "true").await.unwrap();
    assert!(output.status.success());
}

#[tokio::test]
async fn slow_command_is_killed() {
    let mut cmd = Command::new("sleep");
    cmd.arg("30");
    let err = run_with_timeout(cmd, Duration::from_millis(100), "sleep").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Timeout { .. }));
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let cmd = Command::new("/nonexistent/definitely-not-a-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "ghost").await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }));
}
