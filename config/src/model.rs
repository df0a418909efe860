// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The validated configuration model consumed by the analyses

use acl::{NaclAnalyzer, SgAnalyzer};
use connset::ConnectionSet;
use lpm::IpBlock;
use routing::{GlobalRoutingAnalyzer, NodeLocation, ResourceKind, ResourceRef};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    NetworkInterface,
    LoadBalancerIp,
    External,
}

/// The VPC and subnet of an internal node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub vpc: String,
    pub subnet: String,
}

/// An endpoint of connectivity: a network interface, a private IP of a load
/// balancer, or a block of public addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub uid: String,
    pub name: String,
    pub kind: NodeKind,
    pub address: IpBlock,
    pub placement: Option<Placement>,
    /// owning instance or load balancer
    pub owner: Option<String>,
    resource: ResourceRef,
}

impl Node {
    #[must_use]
    pub fn internal(
        uid: &str,
        name: &str,
        kind: NodeKind,
        address: IpBlock,
        placement: Placement,
        owner: Option<String>,
    ) -> Self {
        let resource_kind = match kind {
            NodeKind::LoadBalancerIp => ResourceKind::LoadBalancer,
            _ => ResourceKind::NetworkInterface,
        };
        Self {
            uid: uid.to_string(),
            name: name.to_string(),
            kind,
            address,
            placement: Some(placement),
            owner,
            resource: ResourceRef::new(resource_kind, name, uid),
        }
    }
    /// An external node for `block`, named after its address ranges
    #[must_use]
    pub fn external(block: IpBlock) -> Self {
        let name = block.to_ip_ranges();
        Self {
            uid: name.clone(),
            name: name.clone(),
            kind: NodeKind::External,
            address: block,
            placement: None,
            owner: None,
            resource: ResourceRef::new(ResourceKind::NetworkInterface, &name, &name),
        }
    }
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.kind != NodeKind::External
    }
    #[must_use]
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }
    #[must_use]
    pub fn vpc(&self) -> Option<&str> {
        self.placement.as_ref().map(|p| p.vpc.as_str())
    }
    #[must_use]
    pub fn subnet(&self) -> Option<&str> {
        self.placement.as_ref().map(|p| p.subnet.as_str())
    }
    /// The routing view of an internal node
    #[must_use]
    pub fn location(&self) -> Option<NodeLocation<'_>> {
        self.placement.as_ref().map(|p| NodeLocation {
            resource: &self.resource,
            vpc: &p.vpc,
            subnet: &p.subnet,
            address: &self.address,
        })
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.owner) {
            (NodeKind::External, _) => write!(f, "{}", self.name),
            (_, Some(owner)) => write!(f, "{}[{}]", owner, self.address),
            (_, None) => write!(f, "{}[{}]", self.name, self.address),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subnet {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub cidr: IpBlock,
    pub zone: Option<String>,
    pub nacl: String,
    pub public_gateway: Option<String>,
    pub routing_table: Option<String>,
}

impl Subnet {
    #[must_use]
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(ResourceKind::Subnet, &self.name, &self.uid)
    }
}

#[derive(Debug)]
pub struct Nacl {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub analyzer: NaclAnalyzer,
}

#[derive(Debug)]
pub struct SecurityGroup {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    /// uids of the member nodes
    pub members: BTreeSet<String>,
    pub analyzer: SgAnalyzer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub name: String,
    pub port: i64,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancer {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    /// uids of the private IP nodes
    pub nodes: Vec<String>,
    pub pools: Vec<Pool>,
}

impl LoadBalancer {
    /// What the load balancer may open towards node `member`: TCP to the member
    /// port of every pool holding it, nothing if it is in no pool
    #[must_use]
    pub fn allowed_towards(&self, member: &str) -> ConnectionSet {
        self.pools
            .iter()
            .filter(|p| p.members.iter().any(|m| m == member))
            .filter_map(|p| {
                ConnectionSet::tcp_or_udp(
                    connset::Protocol::Tcp,
                    connset::MIN_PORT,
                    connset::MAX_PORT,
                    p.port,
                    p.port,
                )
                .ok()
            })
            .fold(ConnectionSet::empty(), |acc, c| acc.union(&c))
    }
}

#[derive(Debug)]
pub struct VpcConfig {
    pub uid: String,
    pub name: String,
    pub address_range: IpBlock,
    pub subnets: BTreeMap<String, Subnet>,
    pub nacls: BTreeMap<String, Nacl>,
    pub security_groups: BTreeMap<String, SecurityGroup>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
}

/// All VPCs of a snapshot, with their nodes and the routing between them
#[derive(Debug)]
pub struct MultipleVpcConfigs {
    pub vpcs: BTreeMap<String, VpcConfig>,
    /// internal nodes first, then external ones
    pub nodes: Vec<Node>,
    pub routing: GlobalRoutingAnalyzer,
}

impl MultipleVpcConfigs {
    #[must_use]
    pub fn node(&self, uid: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.uid == uid)
    }
    pub fn internal_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_internal())
    }
    pub fn external_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_internal())
    }
    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.vpcs.values().flat_map(|v| v.subnets.values())
    }
    #[must_use]
    pub fn subnet(&self, uid: &str) -> Option<&Subnet> {
        self.vpcs.values().find_map(|v| v.subnets.get(uid))
    }
    #[must_use]
    pub fn subnet_of(&self, node: &Node) -> Option<&Subnet> {
        let placement = node.placement.as_ref()?;
        self.vpcs.get(&placement.vpc)?.subnets.get(&placement.subnet)
    }
    #[must_use]
    pub fn nacl_of(&self, subnet: &Subnet) -> Option<&Nacl> {
        self.vpcs.get(&subnet.vpc)?.nacls.get(&subnet.nacl)
    }
    /// The security groups `node` is a member of
    #[must_use]
    pub fn security_groups_of(&self, node: &Node) -> Vec<&SecurityGroup> {
        node.vpc()
            .and_then(|vpc| self.vpcs.get(vpc))
            .map(|vpc| {
                vpc.security_groups
                    .values()
                    .filter(|sg| sg.members.contains(&node.uid))
                    .collect()
            })
            .unwrap_or_default()
    }
    /// The load balancer owning `node`, if it is a load balancer private IP
    #[must_use]
    pub fn load_balancer_of(&self, node: &Node) -> Option<&LoadBalancer> {
        if node.kind != NodeKind::LoadBalancerIp {
            return None;
        }
        self.vpcs
            .get(node.vpc()?)?
            .load_balancers
            .values()
            .find(|lb| lb.nodes.contains(&node.uid))
    }
    /// The nodes of `subnet`
    pub fn nodes_in<'a>(&'a self, subnet: &'a Subnet) -> impl Iterator<Item = &'a Node> {
        self.internal_nodes()
            .filter(move |n| n.subnet() == Some(subnet.uid.as_str()))
    }
}
