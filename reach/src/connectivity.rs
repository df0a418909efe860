// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Connectivity between every ordered pair of endpoints of a configuration

use crate::endpoint::Endpoint;
use crate::errors::ReachResult;
use crate::flow::{DirectedFlow, FlowAnalyzer};
use crate::pairmap::{DirectionalPairMap, EndpointId, PairEntry};
use crate::params::{AnalysisParams, Granularity};
use config::MultipleVpcConfigs;
use connset::{ConnectionSet, stateful_reflect};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// The connectivity of one ordered pair of endpoints
#[derive(Debug, Clone, Copy)]
pub struct PairConnectivity<'a> {
    pub src_id: EndpointId,
    pub dst_id: EndpointId,
    pub src: &'a Endpoint,
    pub dst: &'a Endpoint,
    /// what may flow from `src` to `dst`, tagged with its stateful state
    pub connection: &'a ConnectionSet,
    pub forward: &'a DirectedFlow,
    pub reverse: &'a DirectedFlow,
}

#[derive(Debug)]
pub struct ConnectivityMap {
    params: AnalysisParams,
    endpoints: Vec<Endpoint>,
    flows: DirectionalPairMap<DirectedFlow>,
    connections: BTreeMap<(EndpointId, EndpointId), ConnectionSet>,
}

impl ConnectivityMap {
    #[must_use]
    pub fn params(&self) -> AnalysisParams {
        self.params
    }
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
    #[must_use]
    pub fn endpoint_id(&self, uid: &str) -> Option<EndpointId> {
        self.endpoints.iter().position(|e| e.uid == uid)
    }
    #[must_use]
    pub fn connection(&self, src: EndpointId, dst: EndpointId) -> Option<&ConnectionSet> {
        self.connections.get(&(src, dst))
    }
    #[must_use]
    pub fn pair(&self, src: EndpointId, dst: EndpointId) -> Option<PairConnectivity<'_>> {
        let connection = self.connections.get(&(src, dst))?;
        let (forward, reverse) = self.flows.ordered_get(src, dst)?;
        Some(PairConnectivity {
            src_id: src,
            dst_id: dst,
            src: self.endpoints.get(src)?,
            dst: self.endpoints.get(dst)?,
            connection,
            forward,
            reverse,
        })
    }
    /// The connectivity from the endpoint with uid `src` to the one with uid `dst`
    #[must_use]
    pub fn get(&self, src: &str, dst: &str) -> Option<PairConnectivity<'_>> {
        self.pair(self.endpoint_id(src)?, self.endpoint_id(dst)?)
    }
    /// Every analyzed pair, ordered by source then destination
    pub fn pairs(&self) -> impl Iterator<Item = PairConnectivity<'_>> {
        self.connections
            .keys()
            .filter_map(|(src, dst)| self.pair(*src, *dst))
    }
    /// Pairs with some connectivity
    pub fn allowed(&self) -> impl Iterator<Item = PairConnectivity<'_>> {
        self.pairs().filter(|p| !p.connection.is_empty())
    }
}

fn endpoints(config: &MultipleVpcConfigs, params: &AnalysisParams) -> Vec<Endpoint> {
    match params.granularity {
        Granularity::PerEndpoint => config.nodes.iter().map(Endpoint::from_node).collect(),
        Granularity::PerSubnet => {
            let with_pgw = params.include_pgw
                && config.subnets().any(|s| s.public_gateway.is_some());
            let externals = config
                .external_nodes()
                .filter(|_| with_pgw)
                .map(Endpoint::from_node);
            config
                .subnets()
                .map(Endpoint::from_subnet)
                .chain(externals)
                .collect()
        }
    }
}

/// Compute what may flow between every ordered pair of endpoints, at least one
/// of which is internal. A TCP connection only counts if its responses pass the
/// filters of the reverse direction.
pub fn connectivity(
    config: &MultipleVpcConfigs,
    params: &AnalysisParams,
) -> ReachResult<ConnectivityMap> {
    let analyzer = FlowAnalyzer::new(config, *params);
    let endpoints = endpoints(config, params);
    let mut flows = DirectionalPairMap::new();
    let mut connections = BTreeMap::new();

    for (i, a) in endpoints.iter().enumerate() {
        for (j, b) in endpoints.iter().enumerate().skip(i + 1) {
            if !a.is_internal() && !b.is_internal() {
                continue;
            }
            let forward = analyzer.flow(a, b);
            let reverse = analyzer.flow(b, a);
            // responses face the filters of the reverse direction, not its routing
            let (a_to_b, _) = stateful_reflect(&forward.raw, &reverse.filtered);
            let (b_to_a, _) = stateful_reflect(&reverse.raw, &forward.filtered);
            flows
                .add(PairEntry::new(i, j, forward, reverse))
                .inspect_err(|e| error!("Connectivity of {a} and {b}: {e}"))?;
            connections.insert((i, j), a_to_b);
            connections.insert((j, i), b_to_a);
        }
    }
    debug!(
        "Connectivity ({params}): {} endpoints, {} pairs, {} with connections",
        endpoints.len(),
        flows.len(),
        connections.values().filter(|c| !c.is_empty()).count()
    );
    Ok(ConnectivityMap {
        params: *params,
        endpoints,
        flows,
        connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{ParsedResources, build_configs};
    use connset::{Protocol, StatefulState};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    // two interfaces in one subnet; the NACL mentions 8.8.8.8, which splits the
    // public internet in two external endpoints
    const PAIR: &str = r"
vpcs:
  - {uid: vpc-1, name: vpc, address_prefixes: [10.0.0.0/16]}
subnets:
  - {uid: sub-1, name: flat, vpc: vpc-1, cidr: 10.0.0.0/24, network_acl: acl-1}
network_acls:
  - uid: acl-1
    name: dns-only
    vpc: vpc-1
    rules:
      - {action: allow, direction: outbound, source: 0.0.0.0/0, destination: 8.8.8.8/32}
security_groups:
  - uid: sg-client
    name: client
    vpc: vpc-1
    targets: [ni-client]
    rules:
      - direction: outbound
        remote: {cidr: 10.0.0.0/24}
        connection: {protocol: tcp, dst_ports: {min: 80, max: 100}}
      - {direction: inbound, remote: {cidr: 10.0.0.0/24}}
  - uid: sg-server
    name: server
    vpc: vpc-1
    targets: [ni-server]
    rules:
      - {direction: inbound, remote: {cidr: 10.0.0.0/24}}
      - direction: outbound
        remote: {cidr: 10.0.0.0/24}
        connection: {protocol: tcp, src_ports: {min: 80, max: 80}}
instances:
  - uid: vsi-1
    name: client
    vpc: vpc-1
    network_interfaces:
      - {uid: ni-client, name: eth0, subnet: sub-1, primary_ip: 10.0.0.10}
  - uid: vsi-2
    name: server
    vpc: vpc-1
    network_interfaces:
      - {uid: ni-server, name: eth0, subnet: sub-1, primary_ip: 10.0.0.20}
";

    fn pair_map() -> ConnectivityMap {
        let parsed: ParsedResources = serde_yaml_ng::from_str(PAIR).expect("Bad test config");
        let config = build_configs(&parsed).expect("Valid configuration");
        connectivity(&config, &AnalysisParams::default()).expect("Analysis should succeed")
    }

    #[test]
    fn test_pairs_stored_in_both_directions() {
        let map = pair_map();
        let client = map.endpoint_id("ni-client").expect("Client endpoint");
        let server = map.endpoint_id("ni-server").expect("Server endpoint");

        let request = map.pair(client, server).expect("Analyzed pair");
        let response = map.pair(server, client).expect("Analyzed pair");
        assert_eq!((request.src_id, request.dst_id), (client, server));
        assert_eq!((response.src_id, response.dst_id), (server, client));
        assert_eq!(request.forward, response.reverse);
        assert_eq!(request.reverse, response.forward);

        // requests beyond port 80 get no answer from the server
        let port_80 =
            ConnectionSet::tcp_or_udp(Protocol::Tcp, 1, 65535, 80, 80).expect("TCP ports");
        assert_eq!(request.connection, &port_80);
        assert_eq!(request.connection.stateful(), StatefulState::NonStateful);
        assert_eq!(response.connection.stateful(), StatefulState::Stateful);
    }

    #[test]
    fn test_external_pairs_skipped() {
        let map = pair_map();
        let externals: Vec<EndpointId> = (0..map.endpoints().len())
            .filter(|&id| !map.endpoints()[id].is_internal())
            .collect();
        assert_eq!(externals.len(), 2);
        assert!(map.pair(externals[0], externals[1]).is_none());
        assert!(map.pair(externals[1], externals[0]).is_none());
        assert!(map.pairs().all(|p| p.src.is_internal() || p.dst.is_internal()));

        // every pair with an internal end is analyzed, in both directions
        let internals = map.endpoints().len() - externals.len();
        let expected = internals * (internals - 1) + 2 * internals * externals.len();
        assert_eq!(map.pairs().count(), expected);
    }

    #[test]
    #[traced_test]
    fn test_external_endpoints_are_not_paired() {
        let config =
            build_configs(&ParsedResources::default()).expect("Empty configuration is valid");
        let map =
            connectivity(&config, &AnalysisParams::default()).expect("Analysis should succeed");
        assert!(map.endpoints().iter().all(|e| !e.is_internal()));
        assert_eq!(map.pairs().count(), 0);
        assert!(logs_contain("0 pairs, 0 with connections"));
    }
}
