// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Symbolic sets of packet headers.
//!
//! A [`HypercubeSet`] is a canonical union of axis-aligned hyper-rectangles whose
//! axes are [`lpm::IntervalSet`]s. A [`ConnectionSet`] specializes it to the five
//! axes protocol, source port, destination port, ICMP type and ICMP code.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::missing_errors_doc)]

pub mod connection;
pub mod errors;
pub mod hypercube;
pub mod stateful;

pub use connection::{
    ConnectionItem, ConnectionSet, MAX_ICMP_CODE, MAX_ICMP_TYPE, MAX_PORT, MIN_ICMP_CODE,
    MIN_ICMP_TYPE, MIN_PORT, Protocol,
};
pub use errors::AnalysisError;
pub use hypercube::HypercubeSet;
pub use stateful::{StatefulState, stateful_reflect};

use tracectl::trace_target;
trace_target!("connset", LevelFilter::INFO, &["analysis"]);
