// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Integer interval algebra and the IPv4 address-block algebra built on top of it.
//!
//! An [`IntervalSet`] is a canonically reduced union of closed integer intervals. An
//! [`IpBlock`] is an interval set restricted to the 32-bit address space, with CIDR,
//! range and address parsing. [`disjoint_ip_blocks`] computes the coarsest partition
//! of a collection of blocks, which every analyzer upstream uses as its key space.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::similar_names)]
#![allow(clippy::missing_errors_doc)]

pub mod disjoint;
pub mod interval;
pub mod ipblock;

pub use disjoint::disjoint_ip_blocks;
pub use interval::{Interval, IntervalError, IntervalSet};
pub use ipblock::{IpBlock, IpBlockError, private_ip_block, public_internet_block};

use tracectl::trace_target;
trace_target!("lpm", LevelFilter::INFO, &["analysis"]);
