// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! System-implicit routing: where traffic goes when no explicit route decides.
//! Destinations inside the VPC are reached directly; public destinations through a
//! floating IP bound to the source, else through the public gateway of the source's
//! subnet; destinations learned through an attached transit gateway through it.

use crate::path::{Path, PathElement, ResourceRef};
use crate::tgw::TransitGateway;
use lpm::{IpBlock, public_internet_block};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct PublicGateway {
    resource: ResourceRef,
    /// uids of the nodes whose traffic may use the gateway
    sources: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct SystemImplicitRt {
    vpc: String,
    address_range: IpBlock,
    public_internet: IpBlock,
    floating_ips: BTreeMap<String, ResourceRef>,
    public_gateways: Vec<PublicGateway>,
    transit_gateways: Vec<Arc<TransitGateway>>,
}

impl SystemImplicitRt {
    /// Implicit routing of VPC `vpc` with address prefixes `address_range`
    #[must_use]
    pub fn new(vpc: &str, address_range: IpBlock) -> Self {
        Self {
            vpc: vpc.to_string(),
            address_range,
            public_internet: public_internet_block(),
            floating_ips: BTreeMap::new(),
            public_gateways: Vec::new(),
            transit_gateways: Vec::new(),
        }
    }

    #[must_use]
    pub fn vpc(&self) -> &str {
        &self.vpc
    }
    #[must_use]
    pub fn address_range(&self) -> &IpBlock {
        &self.address_range
    }

    /// Bind a floating IP to node `node`. The node stops using any public gateway.
    pub fn add_floating_ip(&mut self, node: &str, fip: ResourceRef) {
        for pgw in &mut self.public_gateways {
            pgw.sources.remove(node);
        }
        self.floating_ips.insert(node.to_string(), fip);
    }

    /// Attach a public gateway serving `sources`. Nodes with a floating IP are left out.
    pub fn add_public_gateway(
        &mut self,
        pgw: ResourceRef,
        sources: impl IntoIterator<Item = String>,
    ) {
        let sources = sources
            .into_iter()
            .filter(|n| !self.floating_ips.contains_key(n))
            .collect();
        self.public_gateways.push(PublicGateway {
            resource: pgw,
            sources,
        });
    }

    /// Make the routes learned by `tgw` available, if this VPC is attached to it
    pub fn add_transit_gateway(&mut self, tgw: Arc<TransitGateway>) {
        if tgw.is_connected(&self.vpc) {
            self.transit_gateways.push(tgw);
        }
    }

    #[must_use]
    pub fn floating_ip(&self, node: &str) -> Option<&ResourceRef> {
        self.floating_ips.get(node)
    }

    #[must_use]
    pub fn public_gateway(&self, node: &str) -> Option<&ResourceRef> {
        self.public_gateways
            .iter()
            .find(|p| p.sources.contains(node))
            .map(|p| &p.resource)
    }

    /// The nodes served by the public gateway with uid `pgw`
    #[must_use]
    pub fn public_gateway_sources(&self, pgw: &str) -> Option<&BTreeSet<String>> {
        self.public_gateways
            .iter()
            .find(|p| p.resource.uid == pgw)
            .map(|p| &p.sources)
    }

    /// The transit gateway publishing `dst` to this VPC, with the uid of the VPC owning it
    #[must_use]
    pub fn transit_gateway_to(&self, dst: &IpBlock) -> Option<(&TransitGateway, &str)> {
        self.transit_gateways.iter().find_map(|tgw| {
            tgw.route_to(&self.vpc, dst)
                .map(|route| (tgw.as_ref(), route.vpc.as_str()))
        })
    }

    /// Path from `src` (a node of this VPC) to `dst`, if any
    #[must_use]
    pub fn path(&self, src: &ResourceRef, dst: &IpBlock) -> Option<Path> {
        let source = PathElement::Resource(src.clone());
        let target = PathElement::External(dst.clone());
        if dst.is_subset(&self.address_range) {
            return Some(Path::new(vec![source, target]));
        }
        if dst.is_subset(&self.public_internet) {
            if let Some(fip) = self.floating_ip(&src.uid) {
                return Some(Path::new(vec![source, PathElement::Resource(fip.clone()), target]));
            }
            if let Some(pgw) = self.public_gateway(&src.uid) {
                return Some(Path::new(vec![source, PathElement::Resource(pgw.clone()), target]));
            }
        }
        self.transit_gateway_to(dst).map(|(tgw, _)| {
            Path::new(vec![
                source,
                PathElement::Resource(tgw.resource.clone()),
                target,
            ])
        })
    }
}
