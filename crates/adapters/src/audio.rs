// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audio synthesizer seam.
//!
//! The announcer prefers speech and falls back to tone patterns when no
//! speech model is configured. Playback is serialized by the announcer
//! actor in the daemon; this trait is just one utterance at a time.

use crate::subprocess::{run_with_timeout, SubprocessError, UTILITY_TIMEOUT};
use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio device init failed: {0}")]
    Init(String),
    #[error("playback failed: {0}")]
    Playback(#[from] SubprocessError),
    #[error("playback exited with status {0}")]
    Status(i32),
}

/// Named tone patterns the driver can distinguish by ear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TonePattern {
    /// Two rising notes: a subsystem came back
    Recovered,
    /// Three falling notes, repeated: persistent trouble
    Alarm,
    /// Single short chirp: acknowledgment (manual capture, sync done)
    Ack,
}

impl TonePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            TonePattern::Recovered => "recovered",
            TonePattern::Alarm => "alarm",
            TonePattern::Ack => "ack",
        }
    }
}

#[async_trait]
pub trait AudioSynth: Clone + Send + Sync + 'static {
    /// Prepare the output device. Idempotent.
    async fn init(&self) -> Result<(), AudioError>;

    /// Release the output device. Precedes any re-init.
    async fn cleanup(&self);

    /// Speak a phrase. Only meaningful when a speech model is available.
    async fn speak(&self, text: &str) -> Result<(), AudioError>;

    /// Play a tone pattern through the buzzer/speaker
    async fn tone(&self, pattern: TonePattern) -> Result<(), AudioError>;

    /// Whether speech synthesis is available
    fn has_speech(&self) -> bool;
}

/// Shells out to the configured speech and tone commands.
///
/// `{text}` in the speak command and `{pattern}` in the tone command are
/// replaced per utterance.
#[derive(Clone, Debug)]
pub struct ProcessAudioSynth {
    speak_command: Option<Vec<String>>,
    tone_command: Vec<String>,
}

impl ProcessAudioSynth {
    pub fn new(speak_command: Option<Vec<String>>, tone_command: Vec<String>) -> Self {
        Self { speak_command, tone_command }
    }

    fn substituted(template: &[String], key: &str, value: &str) -> Vec<String> {
        template.iter().map(|a| a.replace(key, value)).collect()
    }

    async fn run(argv: Vec<String>, what: &str) -> Result<(), AudioError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(AudioError::Init("empty audio command".into()));
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_with_timeout(cmd, UTILITY_TIMEOUT, what).await?;
        if !output.status.success() {
            return Err(AudioError::Status(output.status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSynth for ProcessAudioSynth {
    async fn init(&self) -> Result<(), AudioError> {
        // Device is opened per utterance by the child process; nothing
        // to hold between calls.
        Ok(())
    }

    async fn cleanup(&self) {}

    async fn speak(&self, text: &str) -> Result<(), AudioError> {
        let Some(template) = &self.speak_command else {
            return Err(AudioError::Init("no speech command configured".into()));
        };
        let argv = Self::substituted(template, "{text}", text);
        Self::run(argv, "speech synthesis").await
    }

    async fn tone(&self, pattern: TonePattern) -> Result<(), AudioError> {
        let argv = Self::substituted(&self.tone_command, "{pattern}", pattern.as_str());
        Self::run(argv, "tone playback").await
    }

    fn has_speech(&self) -> bool {
        self.speak_command.is_some()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AudioError, AudioSynth, TonePattern};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded utterance
    #[derive(Debug, Clone, PartialEq)]
    pub enum Utterance {
        Spoken(String),
        Tone(TonePattern),
    }

    #[derive(Default)]
    struct FakeAudioState {
        utterances: Vec<Utterance>,
        init_calls: usize,
        cleanup_calls: usize,
        fail_init: bool,
    }

    /// Fake synthesizer recording every utterance
    #[derive(Clone, Default)]
    pub struct FakeAudio {
        speech: bool,
        inner: Arc<Mutex<FakeAudioState>>,
    }

    impl FakeAudio {
        pub fn new() -> Self {
            Self { speech: true, inner: Arc::default() }
        }

        pub fn without_speech() -> Self {
            Self { speech: false, inner: Arc::default() }
        }

        pub fn fail_init(&self, fail: bool) {
            self.inner.lock().fail_init = fail;
        }

        pub fn utterances(&self) -> Vec<Utterance> {
            self.inner.lock().utterances.clone()
        }

        pub fn init_calls(&self) -> usize {
            self.inner.lock().init_calls
        }

        pub fn cleanup_calls(&self) -> usize {
            self.inner.lock().cleanup_calls
        }
    }

    #[async_trait]
    impl AudioSynth for FakeAudio {
        async fn init(&self) -> Result<(), AudioError> {
            let mut state = self.inner.lock();
            state.init_calls += 1;
            if state.fail_init {
                return Err(AudioError::Init("fake init failure".into()));
            }
            Ok(())
        }

        async fn cleanup(&self) {
            self.inner.lock().cleanup_calls += 1;
        }

        async fn speak(&self, text: &str) -> Result<(), AudioError> {
            self.inner.lock().utterances.push(Utterance::Spoken(text.to_string()));
            Ok(())
        }

        async fn tone(&self, pattern: TonePattern) -> Result<(), AudioError> {
            self.inner.lock().utterances.push(Utterance::Tone(pattern));
            Ok(())
        }

        fn has_speech(&self) -> bool {
            self.speech
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAudio, Utterance};
