// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Filter analyzers. A network ACL (stateless, ordered allow/deny rules attached to
//! a subnet) and a security group (stateful, allow-only rules attached to endpoints)
//! are each compiled into [`ConnectivityResult`]s keyed by disjoint IP blocks.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod errors;
pub mod nacl;
pub mod result;
pub mod rules;
pub mod sg;

pub use errors::AclError;
pub use nacl::{NaclAnalyzer, SubnetAnalysis};
pub use result::{ConnectivityResult, FilterVerdict};
pub use rules::{Action, Direction, NaclRule, SgRemote, SgRule};
pub use sg::{SgAnalyzer, SgDirectionAnalysis};

use tracectl::trace_target;
trace_target!("acl", LevelFilter::INFO, &["analysis"]);
