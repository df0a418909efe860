// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration model of a cloud snapshot. A parser front-end produces the
//! provider-agnostic [`ParsedResources`]; [`build_configs`] validates them and builds
//! the [`MultipleVpcConfigs`] that every analysis consumes: VPCs with their subnets,
//! filters and load balancers, the connectivity endpoints (nodes) and the routing
//! analyzer spanning all VPCs.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod build;
pub mod display;
pub mod errors;
pub mod model;
pub mod resources;

pub use build::build_configs; // re-export
pub use errors::{ConfigError, ConfigResult, stringify}; // re-export
pub use model::{
    LoadBalancer, MultipleVpcConfigs, Nacl, Node, NodeKind, Placement, Pool, SecurityGroup,
    Subnet, VpcConfig,
}; // re-export
pub use resources::ParsedResources; // re-export

use tracectl::trace_target;
trace_target!("config", LevelFilter::INFO, &["analysis"]);
