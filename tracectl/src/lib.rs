// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of tracing targets for the analysis crates and the
//! subscriber setup that turns that registry into an `EnvFilter`.

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod control;
pub mod display;
pub mod targets;

// re-exports
pub use control::{TraceCtlError, TargetRegistry, init_tracing};
pub use tracing::level_filters::LevelFilter;
