// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing tables. A table is compiled into a partition of the address space into
//! blocks with next hops, dropped blocks and delegated blocks.

use crate::implicit::SystemImplicitRt;
use crate::path::{Path, PathElement, ResourceRef};
use crate::route::{Route, RouteAction};
use lpm::{IpBlock, disjoint_ip_blocks};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Egress,
    Ingress,
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub name: String,
    pub uid: String,
    pub kind: TableKind,
    routes: Vec<Route>,
    next_hops: BTreeMap<IpBlock, Vec<IpBlock>>,
    dropped: IpBlock,
    delegated: IpBlock,
    /// every block of the partition, with the index of the route deciding it
    decisions: Vec<(IpBlock, Option<usize>)>,
}

impl RoutingTable {
    #[must_use]
    pub fn new(name: &str, uid: &str, kind: TableKind, routes: Vec<Route>) -> Self {
        let mut table = Self {
            name: name.to_string(),
            uid: uid.to_string(),
            kind,
            routes,
            next_hops: BTreeMap::new(),
            dropped: IpBlock::empty(),
            delegated: IpBlock::empty(),
            decisions: Vec::new(),
        };
        table.compile();
        table
    }

    fn compile(&mut self) {
        let routes = &self.routes;
        let mut order: Vec<usize> = (0..routes.len()).collect();
        order.sort_by_key(|&i| (Reverse(routes[i].prefix_length), routes[i].priority));

        let destinations: Vec<IpBlock> = routes.iter().map(|r| r.destination.clone()).collect();
        let mut delegates_vpc = false;
        for block in disjoint_ip_blocks(&[IpBlock::cidr_all()], &destinations) {
            let winner = order
                .iter()
                .copied()
                .find(|&i| block.is_subset(&routes[i].destination));
            match winner.map(|i| &routes[i]) {
                Some(route) if route.action == RouteAction::Deliver => {
                    let mut hops: Vec<IpBlock> = Vec::new();
                    for &i in &order {
                        let r = &routes[i];
                        if r.action == RouteAction::Deliver
                            && r.prefix_length == route.prefix_length
                            && r.priority == route.priority
                            && block.is_subset(&r.destination)
                            && let Some(hop) = &r.next_hop
                            && !hops.contains(hop)
                        {
                            hops.push(hop.clone());
                        }
                    }
                    self.next_hops.insert(block.clone(), hops);
                }
                Some(route) if route.action == RouteAction::Drop => self.dropped.add(&block),
                Some(route) => {
                    delegates_vpc |= route.action == RouteAction::DelegateVpc;
                    self.delegated.add(&block);
                }
                None => self.delegated.add(&block),
            }
            self.decisions.push((block, winner));
        }
        if delegates_vpc {
            warn!(
                "Routing table {}: delegate_vpc routes are handled as delegate",
                self.name
            );
        }
        debug!(
            "Routing table {} ({}): {} blocks, {} with next hops",
            self.name,
            self.kind,
            self.decisions.len(),
            self.next_hops.len()
        );
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
    #[must_use]
    pub fn next_hops(&self) -> &BTreeMap<IpBlock, Vec<IpBlock>> {
        &self.next_hops
    }
    #[must_use]
    pub fn dropped(&self) -> &IpBlock {
        &self.dropped
    }
    #[must_use]
    pub fn delegated(&self) -> &IpBlock {
        &self.delegated
    }

    /// Whether the next-hop blocks, the dropped block and the delegated block are
    /// pairwise disjoint and cover the address space
    #[must_use]
    pub fn is_partition(&self) -> bool {
        let mut covered = IpBlock::empty();
        let parts = self
            .next_hops
            .keys()
            .chain([&self.dropped, &self.delegated]);
        for part in parts {
            if covered.overlaps(part) {
                return false;
            }
            covered.add(part);
        }
        covered == IpBlock::cidr_all()
    }

    /// The route deciding the fate of `dst`, when a single explicit route does
    #[must_use]
    pub fn matching_route(&self, dst: &IpBlock) -> Option<&Route> {
        let mut matching = self
            .decisions
            .iter()
            .filter(|(block, _)| block.overlaps(dst))
            .map(|(_, route)| *route);
        let first = matching.next()??;
        if matching.all(|r| r == Some(first)) {
            self.routes.get(first)
        } else {
            None
        }
    }

    /// The next hops for `dst`, if every address of it is delivered to the same ones
    fn next_hops_for(&self, dst: &IpBlock) -> Option<&Vec<IpBlock>> {
        let mut covered = IpBlock::empty();
        let mut found: Option<&Vec<IpBlock>> = None;
        for (block, hops) in self.next_hops.iter().filter(|(b, _)| b.overlaps(dst)) {
            if found.is_some_and(|f| f != hops) {
                return None;
            }
            found = Some(hops);
            covered.add(block);
        }
        found.filter(|_| dst.is_subset(&covered))
    }

    /// Path from `src` to `dst`. Delivered destinations end in a next-hop element,
    /// dropped ones have no path and delegated ones defer to `implicit`.
    #[must_use]
    pub fn get_path(
        &self,
        src: &ResourceRef,
        dst: &IpBlock,
        implicit: &SystemImplicitRt,
    ) -> Option<Path> {
        if let Some((first, alternatives)) = self.next_hops_for(dst).and_then(|h| h.split_first()) {
            return Some(Path::new(vec![
                PathElement::Resource(src.clone()),
                PathElement::NextHop {
                    next_hop: first.clone(),
                    alternatives: alternatives.to_vec(),
                    orig_dest: dst.clone(),
                },
            ]));
        }
        if dst.is_subset(&self.dropped) {
            return None;
        }
        if dst.is_subset(&self.delegated) {
            return implicit.path(src, dst);
        }
        debug!(
            "Routing table {}: {dst} spans blocks with different routing decisions",
            self.name
        );
        None
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Egress => write!(f, "egress"),
            TableKind::Ingress => write!(f, "ingress"),
        }
    }
}
