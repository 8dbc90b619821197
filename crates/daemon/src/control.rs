// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control channel and OS signal adapter.
//!
//! Components react to an explicit channel of control signals. The
//! OS-level handlers are the thinnest possible adapters: they post to
//! the channel and return.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Asynchronous triggers into the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// SIGUSR1: save a clip with the default pre/post windows
    ManualCapture,
    /// SIGUSR2: run an uplink cycle now
    ManualSync,
    /// SIGTERM/SIGINT: clean shutdown
    Shutdown,
}

/// Spawn the signal listener. Each delivery posts one `ControlSignal`;
/// a full channel drops the signal rather than blocking the handler.
pub fn spawn_signal_adapter(
    tx: mpsc::Sender<ControlSignal>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            let posted = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = usr1.recv() => ControlSignal::ManualCapture,
                _ = usr2.recv() => ControlSignal::ManualSync,
                _ = term.recv() => ControlSignal::Shutdown,
                _ = int.recv() => ControlSignal::Shutdown,
            };
            if tx.try_send(posted).is_err() {
                tracing::warn!(signal = ?posted, "control channel full, signal dropped");
            }
            if posted == ControlSignal::Shutdown {
                break;
            }
        }
    });
    Ok(())
}
