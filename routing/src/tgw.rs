// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transit gateways: connections to VPCs with prefix-filter admission control,
//! and the routes each gateway learns from the prefixes it admits.

use crate::errors::RoutingError;
use crate::path::ResourceRef;
use lpm::IpBlock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Permit,
    Deny,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixFilter {
    pub prefix: IpBlock,
    pub ge: Option<u8>,
    pub le: Option<u8>,
    pub action: FilterAction,
}

impl PrefixFilter {
    /// Build a filter on CIDR `prefix`. `ge` and `le`, when given, must lie between
    /// the prefix length and 32, with `ge <= le`.
    pub fn new(
        prefix: &str,
        ge: Option<u8>,
        le: Option<u8>,
        action: FilterAction,
    ) -> Result<Self, RoutingError> {
        let block = IpBlock::from_cidr(prefix)?;
        let prefix_length = block.prefix_length()?;
        let in_bounds = |v: Option<u8>| v.is_none_or(|v| (prefix_length..=32).contains(&v));
        let ordered = match (ge, le) {
            (Some(ge), Some(le)) => ge <= le,
            _ => true,
        };
        if !in_bounds(ge) || !in_bounds(le) || !ordered {
            return Err(RoutingError::InvalidFilterBounds {
                prefix: prefix.to_string(),
                ge,
                le,
            });
        }
        Ok(Self {
            prefix: block,
            ge,
            le,
            action,
        })
    }

    /// Whether `subnet` matches the filter. Without bounds the subnet must equal the
    /// prefix; with bounds it must be inside the prefix with a length within them.
    #[must_use]
    pub fn matches(&self, subnet: &IpBlock) -> bool {
        let Ok(len) = subnet.prefix_length() else {
            return false;
        };
        if self.ge.is_none() && self.le.is_none() {
            return *subnet == self.prefix;
        }
        subnet.is_subset(&self.prefix)
            && self.ge.is_none_or(|ge| len >= ge)
            && self.le.is_none_or(|le| len <= le)
    }
}

/// The attachment of one VPC to a transit gateway
#[derive(Debug, Clone, PartialEq)]
pub struct TgwConnection {
    pub name: String,
    /// uid of the attached VPC
    pub vpc: String,
    pub filters: Vec<PrefixFilter>,
    pub default_action: FilterAction,
}

impl TgwConnection {
    #[must_use]
    pub fn new(
        name: &str,
        vpc: &str,
        filters: Vec<PrefixFilter>,
        default_action: FilterAction,
    ) -> Self {
        Self {
            name: name.to_string(),
            vpc: vpc.to_string(),
            filters,
            default_action,
        }
    }

    /// Index of the first filter matching `subnet`, if any
    #[must_use]
    pub fn matching_filter(&self, subnet: &IpBlock) -> Option<usize> {
        self.filters.iter().position(|f| f.matches(subnet))
    }

    #[must_use]
    pub fn admits(&self, subnet: &IpBlock) -> bool {
        let action = self
            .matching_filter(subnet)
            .and_then(|n| self.filters.get(n))
            .map_or(self.default_action, |f| f.action);
        action == FilterAction::Permit
    }
}

/// A prefix published through a transit gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedRoute {
    pub prefix: IpBlock,
    /// uid of the VPC owning the prefix
    pub vpc: String,
    pub connection: String,
}

#[derive(Debug, Clone)]
pub struct TransitGateway {
    pub resource: ResourceRef,
    pub connections: Vec<TgwConnection>,
    learned: Vec<LearnedRoute>,
}

impl TransitGateway {
    #[must_use]
    pub fn new(resource: ResourceRef, connections: Vec<TgwConnection>) -> Self {
        Self {
            resource,
            connections,
            learned: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_connected(&self, vpc: &str) -> bool {
        self.connections.iter().any(|c| c.vpc == vpc)
    }

    /// Learn the prefixes of every attached VPC that its connection admits.
    /// `prefixes` maps a VPC uid to the prefixes it publishes.
    pub fn learn(&mut self, prefixes: &BTreeMap<String, Vec<IpBlock>>) {
        self.learned.clear();
        for conn in &self.connections {
            let published = prefixes.get(&conn.vpc).map(Vec::as_slice).unwrap_or_default();
            let before = self.learned.len();
            for prefix in published.iter().filter(|p| conn.admits(p)) {
                self.learned.push(LearnedRoute {
                    prefix: prefix.clone(),
                    vpc: conn.vpc.clone(),
                    connection: conn.name.clone(),
                });
            }
            if self.learned.len() == before {
                warn!(
                    "Transit gateway {}: connection {} admits no prefix of VPC {}",
                    self.resource.name, conn.name, conn.vpc
                );
            }
        }
        debug!(
            "Transit gateway {} learned {} routes",
            self.resource.name,
            self.learned.len()
        );
    }

    #[must_use]
    pub fn learned_routes(&self) -> &[LearnedRoute] {
        &self.learned
    }

    /// The learned routes usable by `src_vpc`: none unless the VPC is attached,
    /// and never its own prefixes
    pub fn routes_for<'a>(&'a self, src_vpc: &'a str) -> impl Iterator<Item = &'a LearnedRoute> {
        let attached = self.is_connected(src_vpc);
        self.learned
            .iter()
            .filter(move |r| attached && r.vpc != src_vpc)
    }

    /// The learned route covering `dst` for traffic from `src_vpc`
    #[must_use]
    pub fn route_to<'a>(&'a self, src_vpc: &'a str, dst: &IpBlock) -> Option<&'a LearnedRoute> {
        self.routes_for(src_vpc).find(|r| dst.is_subset(&r.prefix))
    }
}

impl Display for FilterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterAction::Permit => write!(f, "permit"),
            FilterAction::Deny => write!(f, "deny"),
        }
    }
}

impl Display for PrefixFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action, self.prefix)?;
        if let Some(ge) = self.ge {
            write!(f, " ge {ge}")?;
        }
        if let Some(le) = self.le {
            write!(f, " le {le}")?;
        }
        Ok(())
    }
}
