// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing across VPCs. Each VPC has its implicit routing, an optional egress
//! table per subnet and an optional ingress table for traffic entering from a
//! transit gateway. Transit gateways learn the admitted prefixes of every VPC.

use crate::implicit::SystemImplicitRt;
use crate::path::{Path, PathElement, ResourceKind, ResourceRef};
use crate::table::RoutingTable;
use crate::tgw::TransitGateway;
use lpm::IpBlock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Where a node sits, for routing purposes
#[derive(Debug, Clone, Copy)]
pub struct NodeLocation<'a> {
    pub resource: &'a ResourceRef,
    pub vpc: &'a str,
    pub subnet: &'a str,
    pub address: &'a IpBlock,
}

#[derive(Debug, Clone)]
pub struct VpcRouting {
    implicit: SystemImplicitRt,
    /// prefixes offered to transit gateways
    published: Vec<IpBlock>,
    egress: BTreeMap<String, Arc<RoutingTable>>,
    ingress: Option<Arc<RoutingTable>>,
}

impl VpcRouting {
    #[must_use]
    pub fn new(implicit: SystemImplicitRt, published: Vec<IpBlock>) -> Self {
        Self {
            implicit,
            published,
            egress: BTreeMap::new(),
            ingress: None,
        }
    }
    /// Use `table` for traffic leaving subnet `subnet` (a uid)
    pub fn set_egress_table(&mut self, subnet: &str, table: Arc<RoutingTable>) {
        self.egress.insert(subnet.to_string(), table);
    }
    /// Use `table` for traffic entering the VPC from a transit gateway. Destinations
    /// of its advertised routes are published to transit gateways.
    pub fn set_ingress_table(&mut self, table: Arc<RoutingTable>) {
        for route in table.routes().iter().filter(|r| r.advertise) {
            if !self.published.contains(&route.destination) {
                self.published.push(route.destination.clone());
            }
        }
        self.ingress = Some(table);
    }

    #[must_use]
    pub fn vpc(&self) -> &str {
        self.implicit.vpc()
    }
    #[must_use]
    pub fn implicit(&self) -> &SystemImplicitRt {
        &self.implicit
    }
    pub fn implicit_mut(&mut self) -> &mut SystemImplicitRt {
        &mut self.implicit
    }
    #[must_use]
    pub fn published(&self) -> &[IpBlock] {
        &self.published
    }
    #[must_use]
    pub fn egress_tables(&self) -> &BTreeMap<String, Arc<RoutingTable>> {
        &self.egress
    }
    #[must_use]
    pub fn egress_table(&self, subnet: &str) -> Option<&RoutingTable> {
        self.egress.get(subnet).map(AsRef::as_ref)
    }
    #[must_use]
    pub fn ingress_table(&self) -> Option<&RoutingTable> {
        self.ingress.as_deref()
    }

    /// Path of traffic leaving `src`, in subnet `subnet`, towards `dst`
    #[must_use]
    pub fn egress_path(&self, src: &ResourceRef, subnet: &str, dst: &IpBlock) -> Option<Path> {
        match self.egress_table(subnet) {
            Some(table) => table.get_path(src, dst, &self.implicit),
            None => self.implicit.path(src, dst),
        }
    }

    /// Path of traffic entering the VPC through `from` towards `dst`
    #[must_use]
    pub fn ingress_path(&self, from: &ResourceRef, dst: &IpBlock) -> Option<Path> {
        match self.ingress_table() {
            Some(table) => table.get_path(from, dst, &self.implicit),
            None => self.implicit.path(from, dst),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalRoutingAnalyzer {
    vpcs: BTreeMap<String, VpcRouting>,
    tgws: Vec<Arc<TransitGateway>>,
}

impl GlobalRoutingAnalyzer {
    /// Assemble the analyzer. Every transit gateway learns the published prefixes
    /// of the VPCs attached to it, and becomes part of their implicit routing.
    #[must_use]
    pub fn new(vpcs: Vec<VpcRouting>, tgws: Vec<TransitGateway>) -> Self {
        let mut vpcs: BTreeMap<String, VpcRouting> = vpcs
            .into_iter()
            .map(|v| (v.vpc().to_string(), v))
            .collect();
        let prefixes: BTreeMap<String, Vec<IpBlock>> = vpcs
            .iter()
            .map(|(uid, v)| (uid.clone(), v.published.clone()))
            .collect();
        let tgws: Vec<Arc<TransitGateway>> = tgws
            .into_iter()
            .map(|mut tgw| {
                tgw.learn(&prefixes);
                Arc::new(tgw)
            })
            .collect();
        for vpc in vpcs.values_mut() {
            for tgw in &tgws {
                vpc.implicit.add_transit_gateway(tgw.clone());
            }
        }
        debug!(
            "Global routing: {} VPCs, {} transit gateways",
            vpcs.len(),
            tgws.len()
        );
        Self { vpcs, tgws }
    }

    #[must_use]
    pub fn vpcs(&self) -> &BTreeMap<String, VpcRouting> {
        &self.vpcs
    }
    #[must_use]
    pub fn vpc(&self, uid: &str) -> Option<&VpcRouting> {
        self.vpcs.get(uid)
    }
    pub fn transit_gateways(&self) -> impl Iterator<Item = &TransitGateway> {
        self.tgws.iter().map(AsRef::as_ref)
    }

    /// Path between two internal nodes. Within a VPC this is the egress path of
    /// the source. Across VPCs it is the egress path of the source up to the transit
    /// gateway publishing the destination, followed by the ingress path of the
    /// destination VPC from that gateway.
    #[must_use]
    pub fn path(&self, src: &NodeLocation<'_>, dst: &NodeLocation<'_>) -> Option<Path> {
        let src_vpc = self.vpcs.get(src.vpc)?;
        let egress = src_vpc.egress_path(src.resource, src.subnet, dst.address)?;
        if src.vpc == dst.vpc {
            return Some(egress.ending_at(dst.resource));
        }
        let Some(tgw) = egress.find(ResourceKind::TransitGateway).cloned() else {
            // delivered to a next hop: the path ends there
            return egress.is_next_hop().then_some(egress);
        };
        let (_, owner) = src_vpc.implicit().transit_gateway_to(dst.address)?;
        if owner != dst.vpc {
            debug!(
                "{} is published to VPC {} by {}, not by VPC {}",
                dst.address, src.vpc, owner, dst.vpc
            );
            return None;
        }
        let ingress = self
            .vpcs
            .get(dst.vpc)?
            .ingress_path(&tgw, dst.address)?
            .ending_at(dst.resource);
        let head: Vec<PathElement> = egress
            .elements()
            .iter()
            .take_while(|e| e.resource() != Some(&tgw))
            .cloned()
            .chain(std::iter::once(PathElement::Resource(tgw.clone())))
            .collect();
        Some(Path::new(head).join(ingress))
    }

    /// Path from an internal node to an external block
    #[must_use]
    pub fn external_path(&self, src: &NodeLocation<'_>, dst: &IpBlock) -> Option<Path> {
        self.vpcs
            .get(src.vpc)?
            .egress_path(src.resource, src.subnet, dst)
    }

    /// Path from an external block to an internal node, which needs a floating IP
    #[must_use]
    pub fn inbound_path(&self, src: &IpBlock, dst: &NodeLocation<'_>) -> Option<Path> {
        let fip = self
            .vpcs
            .get(dst.vpc)?
            .implicit()
            .floating_ip(&dst.resource.uid)?;
        Some(Path::new(vec![
            PathElement::External(src.clone()),
            PathElement::Resource(fip.clone()),
            PathElement::Resource(dst.resource.clone()),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Route, RouteAction};
    use crate::table::TableKind;
    use crate::tgw::{FilterAction, PrefixFilter, TgwConnection};
    use pretty_assertions::assert_eq;

    fn block(s: &str) -> IpBlock {
        s.parse().expect("Bad test block")
    }

    struct Fixture {
        analyzer: GlobalRoutingAnalyzer,
        a1: ResourceRef,
        a2: ResourceRef,
        b1: ResourceRef,
        c1: ResourceRef,
    }

    fn fixture(ingress_b: Option<RoutingTable>) -> Fixture {
        let ni = |name: &str| ResourceRef::new(ResourceKind::NetworkInterface, name, name);
        let mut vpc_a = VpcRouting::new(
            SystemImplicitRt::new("vpc-a", block("10.10.0.0/16")),
            vec![block("10.10.0.0/24")],
        );
        vpc_a.set_egress_table(
            "subnet-a2",
            Arc::new(RoutingTable::new(
                "rt-a",
                "rt-a",
                TableKind::Egress,
                vec![
                    Route::new("fw", "10.20.0.0/16", RouteAction::Deliver, Some("10.10.0.100"), 0)
                        .expect("ok"),
                ],
            )),
        );
        let mut vpc_b = VpcRouting::new(
            SystemImplicitRt::new("vpc-b", block("10.20.0.0/16")),
            vec![block("10.20.0.0/24")],
        );
        if let Some(table) = ingress_b {
            vpc_b.set_ingress_table(Arc::new(table));
        }
        let vpc_c = VpcRouting::new(
            SystemImplicitRt::new("vpc-c", block("10.30.0.0/16")),
            vec![block("10.30.0.0/24")],
        );
        let tgw = TransitGateway::new(
            ResourceRef::new(ResourceKind::TransitGateway, "tgw", "tgw-1"),
            vec![
                TgwConnection::new("a", "vpc-a", vec![], FilterAction::Permit),
                TgwConnection::new("b", "vpc-b", vec![], FilterAction::Permit),
                TgwConnection::new(
                    "c",
                    "vpc-c",
                    vec![
                        PrefixFilter::new("10.30.0.0/16", None, Some(24), FilterAction::Deny)
                            .expect("ok"),
                    ],
                    FilterAction::Permit,
                ),
            ],
        );
        Fixture {
            analyzer: GlobalRoutingAnalyzer::new(vec![vpc_a, vpc_b, vpc_c], vec![tgw]),
            a1: ni("a1"),
            a2: ni("a2"),
            b1: ni("b1"),
            c1: ni("c1"),
        }
    }

    #[test]
    fn test_cross_vpc_path() {
        let fx = fixture(None);
        let (a_addr, b_addr) = (block("10.10.0.4"), block("10.20.0.4"));
        let src = NodeLocation {
            resource: &fx.a1,
            vpc: "vpc-a",
            subnet: "subnet-a1",
            address: &a_addr,
        };
        let dst = NodeLocation {
            resource: &fx.b1,
            vpc: "vpc-b",
            subnet: "subnet-b1",
            address: &b_addr,
        };
        let path = fx.analyzer.path(&src, &dst).expect("Through the TGW");
        assert_eq!(
            path.to_string(),
            "network interface a1 -> transit gateway tgw -> network interface b1"
        );
        let back = fx.analyzer.path(&dst, &src).expect("Symmetric");
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn test_filtered_prefix_unreachable() {
        let fx = fixture(None);
        let (a_addr, c_addr) = (block("10.10.0.4"), block("10.30.0.4"));
        let src = NodeLocation {
            resource: &fx.a1,
            vpc: "vpc-a",
            subnet: "subnet-a1",
            address: &a_addr,
        };
        let dst = NodeLocation {
            resource: &fx.c1,
            vpc: "vpc-c",
            subnet: "subnet-c1",
            address: &c_addr,
        };
        assert!(fx.analyzer.path(&src, &dst).is_none());
    }

    #[test]
    fn test_egress_table_next_hop() {
        let fx = fixture(None);
        let (a_addr, b_addr) = (block("10.10.0.5"), block("10.20.0.4"));
        let src = NodeLocation {
            resource: &fx.a2,
            vpc: "vpc-a",
            subnet: "subnet-a2",
            address: &a_addr,
        };
        let dst = NodeLocation {
            resource: &fx.b1,
            vpc: "vpc-b",
            subnet: "subnet-b1",
            address: &b_addr,
        };
        let path = fx.analyzer.path(&src, &dst).expect("Delivered");
        assert!(path.is_next_hop());
        assert!(path.find(ResourceKind::TransitGateway).is_none());
    }

    #[test]
    fn test_ingress_table_applies() {
        let ingress = RoutingTable::new(
            "ingress-b",
            "ingress-b",
            TableKind::Ingress,
            vec![
                Route::new("drop", "10.20.0.0/24", RouteAction::Drop, None, 0).expect("ok"),
                Route::new("pub", "10.20.9.0/24", RouteAction::Delegate, None, 0)
                    .expect("ok")
                    .with_advertise(true),
            ],
        );
        let fx = fixture(Some(ingress));
        let vpc_b = fx.analyzer.vpc("vpc-b").expect("Present");
        assert_eq!(vpc_b.published().len(), 2);
        let tgw = fx.analyzer.transit_gateways().next().expect("One TGW");
        assert!(
            tgw.learned_routes()
                .iter()
                .any(|r| r.prefix == block("10.20.9.0/24"))
        );

        let (a_addr, b_addr) = (block("10.10.0.4"), block("10.20.0.4"));
        let src = NodeLocation {
            resource: &fx.a1,
            vpc: "vpc-a",
            subnet: "subnet-a1",
            address: &a_addr,
        };
        let dst = NodeLocation {
            resource: &fx.b1,
            vpc: "vpc-b",
            subnet: "subnet-b1",
            address: &b_addr,
        };
        assert!(fx.analyzer.path(&src, &dst).is_none());
    }

    #[test]
    fn test_inbound_needs_floating_ip() {
        let mut vpc = VpcRouting::new(SystemImplicitRt::new("vpc", block("10.0.0.0/16")), vec![]);
        let node = ResourceRef::new(ResourceKind::NetworkInterface, "web", "ni-web");
        vpc.implicit_mut().add_floating_ip(
            "ni-web",
            ResourceRef::new(ResourceKind::FloatingIp, "fip", "fip-1"),
        );
        let analyzer = GlobalRoutingAnalyzer::new(vec![vpc], vec![]);
        let addr = block("10.0.0.4");
        let dst = NodeLocation {
            resource: &node,
            vpc: "vpc",
            subnet: "subnet",
            address: &addr,
        };
        let path = analyzer
            .inbound_path(&block("8.8.8.0/24"), &dst)
            .expect("Has a floating IP");
        assert_eq!(path.find(ResourceKind::FloatingIp).map(|r| r.uid.as_str()), Some("fip-1"));
        let other = ResourceRef::new(ResourceKind::NetworkInterface, "db", "ni-db");
        let dst = NodeLocation {
            resource: &other,
            ..dst
        };
        assert!(analyzer.inbound_path(&block("8.8.8.0/24"), &dst).is_none());
    }
}
