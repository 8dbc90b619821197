// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Media pipeline seam.
//!
//! The encoder is an external process writing fixed-length, numbered
//! segments into the buffer directory. The core consumes it through this
//! capability: start/stop/liveness, newest-output mtime (the stall
//! heuristic is the contract, not an implementation leak), still capture,
//! and concat-demuxer stitching without re-encode.

use crate::subprocess::{run_with_timeout, SubprocessError, CONCAT_TIMEOUT, UTILITY_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("encoder spawn failed: {0}")]
    Spawn(std::io::Error),
    #[error("encoder command is empty")]
    EmptyCommand,
    #[error("no still-capture command configured")]
    NoStillCommand,
    #[error("{0}")]
    Subprocess(#[from] SubprocessError),
    #[error("concat exited with status {0}")]
    ConcatStatus(i32),
    #[error("still capture exited with status {0}")]
    StillStatus(i32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// External commands making up the pipeline. `{list}`, `{output}` are
/// substituted per invocation.
#[derive(Debug, Clone)]
pub struct EncoderSpec {
    /// Segmenting encoder argv; runs until killed
    pub record_command: Vec<String>,
    /// Concat argv template, e.g. `ffmpeg -f concat -safe 0 -i {list} -c copy {output}`
    pub concat_command: Vec<String>,
    /// Still-frame capture argv template with `{output}`
    pub still_command: Option<Vec<String>>,
    /// Directory the encoder writes segments into
    pub buffer_dir: PathBuf,
}

#[async_trait]
pub trait MediaPipeline: Clone + Send + Sync + 'static {
    async fn start(&self) -> Result<(), PipelineError>;

    /// Kill the encoder process and reap it. Safe when not running.
    async fn stop(&self);

    async fn is_running(&self) -> bool;

    /// mtime of the newest file in the buffer directory
    async fn last_output_mtime(&self) -> Option<SystemTime>;

    async fn capture_still(&self, output: &Path) -> Result<(), PipelineError>;

    /// Stitch segments into one artifact via the concat demuxer
    async fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<(), PipelineError>;
}

/// Production pipeline driving the configured encoder commands
#[derive(Clone)]
pub struct ProcessEncoder {
    spec: Arc<EncoderSpec>,
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessEncoder {
    pub fn new(spec: EncoderSpec) -> Self {
        Self { spec: Arc::new(spec), child: Arc::new(Mutex::new(None)) }
    }

    fn build_command(argv: &[String]) -> Result<Command, PipelineError> {
        let (program, args) = argv.split_first().ok_or(PipelineError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }

    fn substituted(template: &[String], pairs: &[(&str, &str)]) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                let mut arg = arg.clone();
                for (key, value) in pairs {
                    arg = arg.replace(key, value);
                }
                arg
            })
            .collect()
    }
}

#[async_trait]
impl MediaPipeline for ProcessEncoder {
    async fn start(&self) -> Result<(), PipelineError> {
        if self.is_running().await {
            return Ok(());
        }
        let mut cmd = Self::build_command(&self.spec.record_command)?;
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(PipelineError::Spawn)?;

        // Drain stderr so the encoder never blocks on a full pipe;
        // surface its chatter at debug level.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "encoder", "{line}");
                }
            });
        }

        tracing::info!(command = ?self.spec.record_command, "encoder started");
        *self.child.lock() = Some(child);
        Ok(())
    }

    async fn stop(&self) {
        let child = self.child.lock().take();
        if let Some(mut child) = child {
            let _ = child.start_kill();
            // Bounded reap; kill_on_drop covers the refusal case
            let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            tracing::info!("encoder stopped");
        }
    }

    async fn is_running(&self) -> bool {
        let mut guard = self.child.lock();
        match guard.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                // Exited or unknowable: drop the handle either way
                _ => {
                    *guard = None;
                    false
                }
            },
            None => false,
        }
    }

    async fn last_output_mtime(&self) -> Option<SystemTime> {
        newest_mtime(&self.spec.buffer_dir).await
    }

    async fn capture_still(&self, output: &Path) -> Result<(), PipelineError> {
        let template = self.spec.still_command.as_ref().ok_or(PipelineError::NoStillCommand)?;
        let argv = Self::substituted(template, &[("{output}", &output.to_string_lossy())]);
        let cmd = Self::build_command(&argv)?;
        let result = run_with_timeout(cmd, UTILITY_TIMEOUT, "still capture").await?;
        if !result.status.success() {
            return Err(PipelineError::StillStatus(result.status.code().unwrap_or(-1)));
        }
        Ok(())
    }

    async fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<(), PipelineError> {
        // Concat demuxer list file next to the output
        let list_path = output.with_extension("list");
        let mut list = String::new();
        for part in parts {
            list.push_str(&format!("file '{}'\n", part.display()));
        }
        tokio::fs::write(&list_path, list).await?;

        let argv = Self::substituted(
            &self.spec.concat_command,
            &[("{list}", &list_path.to_string_lossy()), ("{output}", &output.to_string_lossy())],
        );
        let cmd = Self::build_command(&argv)?;
        let result = run_with_timeout(cmd, CONCAT_TIMEOUT, "clip concat").await;
        let _ = tokio::fs::remove_file(&list_path).await;

        let output_result = result?;
        if !output_result.status.success() {
            return Err(PipelineError::ConcatStatus(output_result.status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

async fn newest_mtime(dir: &Path) -> Option<SystemTime> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<SystemTime> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(meta) = entry.metadata().await {
            if let Ok(mtime) = meta.modified() {
                if newest.is_none_or(|n| mtime > n) {
                    newest = Some(mtime);
                }
            }
        }
    }
    newest
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{MediaPipeline, PipelineError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::SystemTime;

    #[derive(Default)]
    struct FakePipelineState {
        running: bool,
        start_calls: usize,
        stop_calls: usize,
        mtime: Option<SystemTime>,
        concat_calls: Vec<(Vec<PathBuf>, PathBuf)>,
        still_calls: Vec<PathBuf>,
        concat_writes_empty: bool,
        fail_still: bool,
    }

    /// Fake pipeline with scriptable stall and concat behavior
    #[derive(Clone, Default)]
    pub struct FakePipeline {
        inner: Arc<Mutex<FakePipelineState>>,
    }

    impl FakePipeline {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pretend the newest segment was written at `mtime`
        pub fn set_last_output_mtime(&self, mtime: SystemTime) {
            self.inner.lock().mtime = Some(mtime);
        }

        /// Make concat produce a zero-byte artifact (verification tests)
        pub fn set_concat_writes_empty(&self, empty: bool) {
            self.inner.lock().concat_writes_empty = empty;
        }

        pub fn set_fail_still(&self, fail: bool) {
            self.inner.lock().fail_still = fail;
        }

        pub fn start_calls(&self) -> usize {
            self.inner.lock().start_calls
        }

        pub fn stop_calls(&self) -> usize {
            self.inner.lock().stop_calls
        }

        pub fn concat_calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
            self.inner.lock().concat_calls.clone()
        }

        pub fn still_calls(&self) -> Vec<PathBuf> {
            self.inner.lock().still_calls.clone()
        }
    }

    #[async_trait]
    impl MediaPipeline for FakePipeline {
        async fn start(&self) -> Result<(), PipelineError> {
            let mut state = self.inner.lock();
            state.start_calls += 1;
            state.running = true;
            Ok(())
        }

        async fn stop(&self) {
            let mut state = self.inner.lock();
            state.stop_calls += 1;
            state.running = false;
        }

        async fn is_running(&self) -> bool {
            self.inner.lock().running
        }

        async fn last_output_mtime(&self) -> Option<SystemTime> {
            self.inner.lock().mtime
        }

        async fn capture_still(&self, output: &Path) -> Result<(), PipelineError> {
            let fail = {
                let mut state = self.inner.lock();
                state.still_calls.push(output.to_path_buf());
                state.fail_still
            };
            if fail {
                return Err(PipelineError::StillStatus(1));
            }
            tokio::fs::write(output, b"jpeg").await?;
            Ok(())
        }

        async fn concat(&self, parts: &[PathBuf], output: &Path) -> Result<(), PipelineError> {
            let empty = {
                let mut state = self.inner.lock();
                state.concat_calls.push((parts.to_vec(), output.to_path_buf()));
                state.concat_writes_empty
            };
            if empty {
                tokio::fs::write(output, b"").await?;
                return Ok(());
            }
            let mut bytes = Vec::new();
            for part in parts {
                bytes.extend(tokio::fs::read(part).await?);
            }
            tokio::fs::write(output, bytes).await?;
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePipeline;
