// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors of the symbolic set algebra. These are assertion-class: they indicate a
//! programming error upstream and abort the query that hit them.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Dimension mismatch: {0} vs {1}")]
    DimensionMismatch(usize, usize),
    #[error("Invalid cube: {0}")]
    InvalidCube(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
