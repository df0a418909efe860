// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors of the connectivity, explain and diff operations

use crate::pairmap::PairMapError;
use config::ConfigError;
use connset::AnalysisError;
use thiserror::Error;

/// Failures of an explain query
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("No endpoint matches '{0}'")]
    NotFound(String),
    #[error("'{query}' matches several endpoints: {}", candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
    #[error("Invalid connection filter: {0}")]
    InvalidConnectionFilter(String),
    #[error("Neither '{src}' nor '{dst}' is an internal endpoint")]
    NoInternalEndpoint { src: String, dst: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReachError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Analysis failure: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Analysis failure: {0}")]
    PairMap(#[from] PairMapError),
}

pub type ReachResult<T> = Result<T, ReachError>;
