// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parameters of a connectivity analysis

use derive_builder::Builder;
use serde::Serialize;
use std::fmt::Display;

/// What the endpoints of an analysis are
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// network interfaces, load balancer private IPs and external address blocks
    #[default]
    PerEndpoint,
    /// subnets, plus external blocks reachable through public gateways
    PerSubnet,
}

/// Struct to configure an analysis. N.B we derive a builder type `AnalysisParamsBuilder`
/// and provide defaults for each field.
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisParams {
    #[builder(default)]
    pub granularity: Granularity,

    /// whether public gateways give access to external destinations
    #[builder(default = true)]
    pub include_pgw: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            granularity: Granularity::PerEndpoint,
            include_pgw: true,
        }
    }
}

impl AnalysisParams {
    #[must_use]
    pub fn per_subnet() -> Self {
        Self {
            granularity: Granularity::PerSubnet,
            ..Self::default()
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::PerEndpoint => write!(f, "per endpoint"),
            Granularity::PerSubnet => write!(f, "per subnet"),
        }
    }
}

impl Display for AnalysisParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.granularity)?;
        if !self.include_pgw {
            write!(f, ", public gateways excluded")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let params = AnalysisParamsBuilder::default()
            .build()
            .expect("All fields have defaults");
        assert_eq!(params, AnalysisParams::default());
        assert!(params.include_pgw);

        let params = AnalysisParamsBuilder::default()
            .granularity(Granularity::PerSubnet)
            .include_pgw(false)
            .build()
            .expect("Valid params");
        assert_eq!(params.to_string(), "per subnet, public gateways excluded");
    }
}
