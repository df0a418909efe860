// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reachability analysis of VPC configurations.
//!
//! [`connectivity`] computes, for every ordered pair of endpoints, the set of
//! connections that may flow between them, combining network ACLs, security
//! groups, load balancer pools, routing and stateful TCP reflection.
//! [`explain`] details the analysis of a single queried pair and [`diff`]
//! compares the connectivity of two configurations.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod connectivity;
pub mod diff;
mod display;
pub mod endpoint;
pub mod errors;
pub mod explain;
pub mod flow;
pub mod pairmap;
pub mod params;

pub use connectivity::{ConnectivityMap, PairConnectivity, connectivity};
pub use diff::{DiffReport, PairDiff, diff, diff_maps};
pub use endpoint::{Endpoint, EndpointKind};
pub use errors::{QueryError, ReachError, ReachResult};
pub use explain::{Explanation, ExplanationTree, explain, resolve};
pub use flow::{BlockedBy, DirectedFlow, FilterTrace, LayerKind};
pub use pairmap::{DirectionalPairMap, EndpointId, PairEntry, PairMapError};
pub use params::{AnalysisParams, AnalysisParamsBuilder, Granularity};

use tracectl::trace_target;
trace_target!("reach", LevelFilter::INFO, &["analysis"]);
