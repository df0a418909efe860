// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Analysis of one direction between two endpoints.
//!
//! The egress side of a flow is made of the filters of the source, the ingress
//! side of those of the destination. Within a layer (the security groups of an
//! endpoint) results are united; across layers they are intersected. A flow
//! needs a routing path, and a load balancer may only open connections to its
//! pool members.

use crate::endpoint::{Endpoint, EndpointKind};
use crate::params::AnalysisParams;
use acl::FilterVerdict;
use config::MultipleVpcConfigs;
use connset::ConnectionSet;
use lpm::IpBlock;
use routing::{Path, ResourceKind};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    NetworkAcl,
    SecurityGroup,
    LoadBalancer,
}

const FILTER_LAYERS: [LayerKind; 2] = [LayerKind::NetworkAcl, LayerKind::SecurityGroup];
const ALL_LAYERS: [LayerKind; 3] = [
    LayerKind::NetworkAcl,
    LayerKind::SecurityGroup,
    LayerKind::LoadBalancer,
];

/// What one filter resource lets through on one side of a flow, and the rules
/// that decided it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTrace {
    pub kind: LayerKind,
    pub resource: String,
    pub ingress: bool,
    pub allowed: ConnectionSet,
    pub allow_rules: Vec<usize>,
    pub deny_rules: Vec<usize>,
}

impl FilterTrace {
    fn new(kind: LayerKind, resource: &str, ingress: bool, verdict: FilterVerdict) -> Self {
        Self {
            kind,
            resource: resource.to_string(),
            ingress,
            allowed: verdict.allowed,
            allow_rules: verdict.allow_rules,
            deny_rules: verdict.deny_rules,
        }
    }
}

/// Union within each of `layers`, intersection across them. Absent layers do not filter.
fn combine(traces: &[FilterTrace], layers: &[LayerKind]) -> ConnectionSet {
    layers.iter().fold(ConnectionSet::all(), |acc, kind| {
        let mut layer = traces.iter().filter(|t| t.kind == *kind).peekable();
        if layer.peek().is_none() {
            return acc;
        }
        let united = layer.fold(ConnectionSet::empty(), |u, t| u.union(&t.allowed));
        acc.intersection(&united)
    })
}

/// What keeps connections from flowing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedBy {
    Nothing,
    Routing,
    Egress,
    Ingress,
    Both,
}

/// One direction between two endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectedFlow {
    pub egress: Vec<FilterTrace>,
    pub ingress: Vec<FilterTrace>,
    /// what the filters of both sides let through
    pub filtered: ConnectionSet,
    pub path: Option<Path>,
    /// `filtered`, restricted by routing and by load balancer pools
    pub raw: ConnectionSet,
    pub note: Option<String>,
}

impl DirectedFlow {
    #[must_use]
    pub fn egress_allowed(&self) -> ConnectionSet {
        combine(&self.egress, &ALL_LAYERS)
    }
    #[must_use]
    pub fn ingress_allowed(&self) -> ConnectionSet {
        combine(&self.ingress, &ALL_LAYERS)
    }
    /// Which part of the flow blocks the connections of `query`
    #[must_use]
    pub fn blocked_by(&self, query: &ConnectionSet) -> BlockedBy {
        if self.path.is_none() {
            return BlockedBy::Routing;
        }
        let egress = self.egress_allowed().intersection(query);
        let ingress = self.ingress_allowed().intersection(query);
        match (egress.is_empty(), ingress.is_empty()) {
            (true, true) => BlockedBy::Both,
            (true, false) => BlockedBy::Egress,
            (false, true) => BlockedBy::Ingress,
            (false, false) if egress.intersection(&ingress).is_empty() => BlockedBy::Both,
            (false, false) => BlockedBy::Nothing,
        }
    }
}

pub(crate) struct FlowAnalyzer<'a> {
    config: &'a MultipleVpcConfigs,
    params: AnalysisParams,
}

impl<'a> FlowAnalyzer<'a> {
    pub(crate) fn new(config: &'a MultipleVpcConfigs, params: AnalysisParams) -> Self {
        Self { config, params }
    }

    fn nacl_trace(
        &self,
        endpoint: &Endpoint,
        peer: &IpBlock,
        ingress: bool,
    ) -> Option<FilterTrace> {
        let subnet = self.config.subnet(endpoint.subnet.as_deref()?)?;
        let nacl = self.config.nacl_of(subnet)?;
        let verdict = nacl
            .analyzer
            .verdict(&subnet.cidr, &endpoint.address, peer, ingress);
        Some(FilterTrace::new(LayerKind::NetworkAcl, &nacl.name, ingress, verdict))
    }

    fn sg_traces(&self, endpoint: &Endpoint, peer: &IpBlock, ingress: bool) -> Vec<FilterTrace> {
        if endpoint.kind == EndpointKind::Subnet {
            return Vec::new();
        }
        let Some(node) = self.config.node(&endpoint.uid) else {
            return Vec::new();
        };
        self.config
            .security_groups_of(node)
            .into_iter()
            .map(|sg| {
                let verdict = sg.analyzer.verdict(&endpoint.address, peer, ingress);
                FilterTrace::new(LayerKind::SecurityGroup, &sg.name, ingress, verdict)
            })
            .collect()
    }

    /// The filters of `endpoint` towards `peer`
    fn side(&self, endpoint: &Endpoint, peer: &IpBlock, ingress: bool) -> Vec<FilterTrace> {
        if !endpoint.is_internal() {
            return Vec::new();
        }
        self.nacl_trace(endpoint, peer, ingress)
            .into_iter()
            .chain(self.sg_traces(endpoint, peer, ingress))
            .collect()
    }

    fn load_balancer_trace(&self, src: &Endpoint, dst: &Endpoint) -> Option<FilterTrace> {
        if src.kind != EndpointKind::LoadBalancerIp {
            return None;
        }
        let node = self.config.node(&src.uid)?;
        let lb = self.config.load_balancer_of(node)?;
        Some(FilterTrace {
            kind: LayerKind::LoadBalancer,
            resource: lb.name.clone(),
            ingress: false,
            allowed: lb.allowed_towards(&dst.uid),
            allow_rules: Vec::new(),
            deny_rules: Vec::new(),
        })
    }

    /// The routing path from `src` to `dst`. External destinations are only
    /// reached through a floating IP, or a public gateway when those count.
    pub(crate) fn path(&self, src: &Endpoint, dst: &Endpoint) -> Option<Path> {
        let routing = &self.config.routing;
        match (src.location(), dst.location()) {
            (Some(s), Some(d)) => routing.path(&s, &d),
            (Some(s), None) => {
                let path = routing.external_path(&s, &dst.address)?;
                let via_fip = path.find(ResourceKind::FloatingIp).is_some();
                let via_pgw =
                    self.params.include_pgw && path.find(ResourceKind::PublicGateway).is_some();
                (via_fip || via_pgw).then_some(path)
            }
            (None, Some(d)) => routing.inbound_path(&src.address, &d),
            (None, None) => None,
        }
    }

    pub(crate) fn flow(&self, src: &Endpoint, dst: &Endpoint) -> DirectedFlow {
        let mut egress = self.side(src, &dst.address, false);
        let ingress = self.side(dst, &src.address, true);
        let filtered =
            combine(&egress, &FILTER_LAYERS).intersection(&combine(&ingress, &FILTER_LAYERS));
        let mut note = None;
        if let Some(trace) = self.load_balancer_trace(src, dst) {
            if trace.allowed.is_empty() {
                note = Some("not a pool member".to_string());
            }
            egress.push(trace);
        }
        let path = self.path(src, dst);
        let raw = if path.is_some() {
            filtered.intersection(&combine(&egress, &[LayerKind::LoadBalancer]))
        } else {
            ConnectionSet::empty()
        };
        DirectedFlow {
            egress,
            ingress,
            filtered,
            path,
            raw,
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connset::Protocol;

    fn trace(kind: LayerKind, allowed: ConnectionSet) -> FilterTrace {
        FilterTrace {
            kind,
            resource: "r".to_string(),
            ingress: false,
            allowed,
            allow_rules: Vec::new(),
            deny_rules: Vec::new(),
        }
    }

    #[test]
    fn test_combine_layers() {
        let tcp = ConnectionSet::protocol(Protocol::Tcp);
        let udp = ConnectionSet::protocol(Protocol::Udp);
        let traces = vec![
            trace(LayerKind::NetworkAcl, tcp.union(&udp)),
            trace(LayerKind::SecurityGroup, tcp.clone()),
            trace(LayerKind::SecurityGroup, ConnectionSet::icmp(8, 8, 0, 0)),
        ];
        assert_eq!(combine(&traces, &FILTER_LAYERS), tcp);
        assert_eq!(combine(&[], &ALL_LAYERS), ConnectionSet::all());
        assert_eq!(
            combine(&traces, &[LayerKind::LoadBalancer]),
            ConnectionSet::all()
        );
    }

    #[test]
    fn test_blocked_by() {
        let tcp = ConnectionSet::protocol(Protocol::Tcp);
        let udp = ConnectionSet::protocol(Protocol::Udp);
        let mut flow = DirectedFlow {
            egress: vec![trace(LayerKind::NetworkAcl, tcp.clone())],
            ingress: vec![trace(LayerKind::SecurityGroup, udp.clone())],
            filtered: ConnectionSet::empty(),
            path: Some(Path::default()),
            raw: ConnectionSet::empty(),
            note: None,
        };
        assert_eq!(flow.blocked_by(&ConnectionSet::all()), BlockedBy::Both);
        assert_eq!(flow.blocked_by(&udp), BlockedBy::Egress);
        assert_eq!(flow.blocked_by(&tcp), BlockedBy::Ingress);
        flow.ingress = vec![trace(LayerKind::SecurityGroup, tcp.clone())];
        assert_eq!(flow.blocked_by(&tcp), BlockedBy::Nothing);
        flow.path = None;
        assert_eq!(flow.blocked_by(&tcp), BlockedBy::Routing);
    }
}
