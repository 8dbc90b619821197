// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution.
//!
//! Every external command the daemon runs goes through here so that no
//! suspension point is unbounded. The child is killed on timeout and on
//! drop.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Ceiling for encoder concat jobs; stitching minutes of video on an
/// SBC-class CPU is slow even without re-encoding.
pub const CONCAT_TIMEOUT: Duration = Duration::from_secs(120);
/// Ceiling for file-sync runs over a slow cellular link
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(600);
/// Ceiling for short utility commands (audio playback, reboot request)
pub const UTILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{what} failed to spawn: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{what} timed out after {timeout:?}")]
    Timeout { what: String, timeout: Duration },
}

/// Run a command to completion with a hard deadline.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    what: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(SubprocessError::Spawn { what: what.to_string(), source: e }),
        Err(_) => {
            tracing::warn!(what, ?timeout, "subprocess timed out, killed");
            Err(SubprocessError::Timeout { what: what.to_string(), timeout })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
