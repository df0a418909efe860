// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A library to implement VPC routing analysis: static routing tables compiled
//! into partitions of the address space, the system-implicit routing of a VPC,
//! transit gateways with prefix filters, and the paths they produce.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

mod display;
mod errors;
pub mod global;
pub mod implicit;
pub mod path;
pub mod pretty_utils;
pub mod route;
pub mod table;
pub mod tgw;

// re-exports
pub use errors::RoutingError;
pub use global::{GlobalRoutingAnalyzer, NodeLocation, VpcRouting};
pub use implicit::SystemImplicitRt;
pub use path::{Path, PathElement, ResourceKind, ResourceRef};
pub use route::{Route, RouteAction};
pub use table::{RoutingTable, TableKind};
pub use tgw::{FilterAction, LearnedRoute, PrefixFilter, TgwConnection, TransitGateway};

use tracectl::trace_target;
trace_target!("routing", LevelFilter::INFO, &["analysis"]);
