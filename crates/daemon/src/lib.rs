// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The telemetry daemon: configuration, wiring, supervision.

pub mod announcer;
pub mod config;
pub mod control;
pub mod events;
pub mod lifecycle;
pub mod supervisor;

pub use announcer::{Announcement, Announcer};
pub use config::{Config, ConfigError};
pub use control::ControlSignal;
pub use events::EventWriter;
pub use lifecycle::{startup, Daemon, LifecycleError};
pub use supervisor::{DiskProbe, FixedDisk, ScanReport, StatvfsDisk, Supervisor, SupervisorConfig};
