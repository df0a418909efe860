// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use lpm::IpBlockError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Route '{0}' delivers but has no next hop")]
    MissingNextHop(String),

    #[error("Route '{0}' has a next hop but does not deliver")]
    UnexpectedNextHop(String),

    #[error("Route '{route}' has invalid priority {priority} (valid: 0-4)")]
    InvalidPriority { route: String, priority: u8 },

    #[error("Prefix filter on {prefix} has invalid bounds ge={ge:?} le={le:?}")]
    InvalidFilterBounds {
        prefix: String,
        ge: Option<u8>,
        le: Option<u8>,
    },

    #[error("Invalid address: {0}")]
    Parse(#[from] IpBlockError),
}
