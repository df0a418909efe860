// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Endpoints of a connectivity analysis

use config::{Node, NodeKind, Subnet};
use lpm::IpBlock;
use routing::{NodeLocation, ResourceRef};
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    NetworkInterface,
    LoadBalancerIp,
    Subnet,
    External,
}

/// One side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub uid: String,
    /// name used to match endpoints across configurations
    pub name: String,
    /// display form
    pub label: String,
    pub kind: EndpointKind,
    pub address: IpBlock,
    pub vpc: Option<String>,
    pub subnet: Option<String>,
    #[serde(skip)]
    pub resource: ResourceRef,
}

impl Endpoint {
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        let (kind, name) = match (node.kind, &node.owner) {
            (NodeKind::NetworkInterface, Some(owner)) => {
                (EndpointKind::NetworkInterface, format!("{owner}/{}", node.name))
            }
            (NodeKind::NetworkInterface, None) => {
                (EndpointKind::NetworkInterface, node.name.clone())
            }
            (NodeKind::LoadBalancerIp, _) => (EndpointKind::LoadBalancerIp, node.name.clone()),
            (NodeKind::External, _) => (EndpointKind::External, node.name.clone()),
        };
        Self {
            uid: node.uid.clone(),
            name,
            label: node.to_string(),
            kind,
            address: node.address.clone(),
            vpc: node.vpc().map(str::to_string),
            subnet: node.subnet().map(str::to_string),
            resource: node.resource().clone(),
        }
    }

    #[must_use]
    pub fn from_subnet(subnet: &Subnet) -> Self {
        Self {
            uid: subnet.uid.clone(),
            name: subnet.name.clone(),
            label: subnet.name.clone(),
            kind: EndpointKind::Subnet,
            address: subnet.cidr.clone(),
            vpc: Some(subnet.vpc.clone()),
            subnet: Some(subnet.uid.clone()),
            resource: subnet.resource(),
        }
    }

    /// The part `address` of an external endpoint
    #[must_use]
    pub fn restricted_to(&self, address: &IpBlock) -> Self {
        let address = self.address.intersection(address);
        let label = address.to_ip_ranges();
        Self {
            name: label.clone(),
            label,
            address,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.kind != EndpointKind::External
    }

    /// The routing view of an internal endpoint
    #[must_use]
    pub fn location(&self) -> Option<NodeLocation<'_>> {
        Some(NodeLocation {
            resource: &self.resource,
            vpc: self.vpc.as_deref()?,
            subnet: self.subnet.as_deref()?,
            address: &self.address,
        })
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}
