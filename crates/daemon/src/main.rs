// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jalopyd: vehicle telemetry daemon.
//!
//! Exit codes: 0 on clean shutdown, 1 on unrecoverable startup failure,
//! 2 on invalid configuration. Ordinary recovery paths never exit.

use jalopy_daemon::{startup, Config};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

fn main() {
    let code = run();
    std::process::exit(code);
}

fn run() -> i32 {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/jalopy/config.toml"));

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jalopyd: {e}");
            return 2;
        }
    };

    // Structured logs to stderr and a daily file in the state directory.
    // The non-blocking guard must outlive the runtime.
    let file_appender = tracing_appender::rolling::daily(&config.store.path, "daemon.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "runtime init failed");
            return 1;
        }
    };

    runtime.block_on(async {
        match startup(config).await {
            Ok(daemon) => daemon.run().await,
            Err(e) => {
                tracing::error!(error = %e, "startup failed");
                1
            }
        }
    })
}
