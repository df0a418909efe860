// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use vpcreach_reach as reach;

use config::resources::{ConnectionSpec, InstanceSpec, NetworkInterfaceSpec};
use config::{MultipleVpcConfigs, ParsedResources, build_configs};
use connset::{ConnectionSet, Protocol, StatefulState};
use lpm::IpBlock;
use pretty_assertions::assert_eq;
use reach::{
    AnalysisParams, AnalysisParamsBuilder, BlockedBy, EndpointKind, LayerKind, QueryError,
    ReachError, connectivity, diff, explain, resolve,
};
use routing::{FilterAction, PathElement, PrefixFilter};

fn parse(yaml: &str) -> ParsedResources {
    serde_yaml_ng::from_str(yaml).expect("Bad fixture")
}

fn load(yaml: &str) -> MultipleVpcConfigs {
    build_configs(&parse(yaml)).expect("Fixture is a valid configuration")
}

fn tcp_dst(min: i64, max: i64) -> ConnectionSet {
    ConnectionSet::tcp_or_udp(Protocol::Tcp, 1, 65535, min, max).expect("TCP takes ports")
}

fn tcp_src(min: i64, max: i64) -> ConnectionSet {
    ConnectionSet::tcp_or_udp(Protocol::Tcp, min, max, 1, 65535).expect("TCP takes ports")
}

/// uids of the resources along a path, `None` for external blocks and next hops
fn path_uids(path: &routing::Path) -> Vec<Option<&str>> {
    path.elements()
        .iter()
        .map(|e| e.resource().map(|r| r.uid.as_str()))
        .collect()
}

const NACL_DENY_ALL: &str = include_str!("fixtures/nacl_deny_all.yaml");
const STATEFUL: &str = include_str!("fixtures/stateful.yaml");
const ROUTING: &str = include_str!("fixtures/routing.yaml");
const TGW: &str = include_str!("fixtures/tgw.yaml");
const WEB: &str = include_str!("fixtures/web.yaml");

#[test]
fn test_intra_subnet_nacl_bypass() {
    let config = load(NACL_DENY_ALL);
    let map = connectivity(&config, &AnalysisParams::default()).expect("Connectivity");

    // the NACL is bypassed, the security group still applies
    let same_subnet = map.get("ni-a", "ni-b").expect("Analyzed pair");
    assert_eq!(same_subnet.connection, &ConnectionSet::tcp_all());
    assert_eq!(same_subnet.connection.stateful(), StatefulState::Stateful);

    let across = map.get("ni-a", "ni-c").expect("Analyzed pair");
    assert!(across.connection.is_empty());
    assert_eq!(map.allowed().count(), 2);

    let tree =
        explain(&config, &AnalysisParams::default(), "vm-a", "vm-c", None).expect("Explained");
    let [explanation] = tree.explanations.as_slice() else {
        panic!("Expected a single explanation");
    };
    assert_eq!(explanation.blocked_by, BlockedBy::Both);
    let nacl = explanation
        .egress
        .iter()
        .find(|t| t.kind == LayerKind::NetworkAcl)
        .expect("Egress NACL trace");
    assert_eq!(nacl.resource, "deny-all");
    assert_eq!(nacl.deny_rules, vec![1]);
    assert!(nacl.allow_rules.is_empty());
    assert!(!tree.is_allowed());
}

#[test]
fn test_stateful_asymmetry() {
    let config = load(STATEFUL);
    let map = connectivity(&config, &AnalysisParams::default()).expect("Connectivity");

    let request = map.get("ni-client", "ni-server").expect("Analyzed pair");
    assert_eq!(request.forward.filtered, tcp_dst(80, 100));
    assert_eq!(request.connection, &tcp_dst(80, 80));
    assert_eq!(request.connection.stateful(), StatefulState::NonStateful);
    assert!(request.connection.enhanced_string().ends_with(" *"));

    let response = map.get("ni-server", "ni-client").expect("Analyzed pair");
    assert_eq!(response.connection, &tcp_src(80, 80));
    assert_eq!(response.connection.stateful(), StatefulState::Stateful);

    let filter = tcp_dst(80, 80);
    let tree = explain(&config, &AnalysisParams::default(), "client", "server", Some(&filter))
        .expect("Explained");
    assert_eq!(tree.explanations.len(), 1);
    assert_eq!(tree.explanations[0].connection, filter);
    assert_eq!(tree.explanations[0].stateful, StatefulState::Stateful);
    assert_eq!(tree.explanations[0].blocked_by, BlockedBy::Nothing);
}

#[test]
fn test_response_involution() {
    let forward = ConnectionSet::tcp_or_udp(Protocol::Tcp, 1000, 2000, 443, 443).expect("TCP");
    let response = forward.response_connection();
    assert_eq!(
        response,
        ConnectionSet::tcp_or_udp(Protocol::Tcp, 443, 443, 1000, 2000).expect("TCP")
    );
    assert_eq!(response.response_connection(), forward);
}

#[test]
fn test_egress_table_longest_prefix() {
    let config = load(ROUTING);
    let params = AnalysisParams::default();

    let dropped = explain(&config, &params, "src-vm", "dropped-vm", None).expect("Explained");
    assert_eq!(dropped.explanations[0].path, None);
    assert_eq!(dropped.explanations[0].blocked_by, BlockedBy::Routing);
    assert!(dropped.explanations[0].connection.is_empty());

    for (dst, next_hop) in [("b-vm", "10.0.0.200"), ("a-vm", "10.0.0.100")] {
        let tree = explain(&config, &params, "src-vm", dst, None).expect("Explained");
        let explanation = &tree.explanations[0];
        let path = explanation.path.as_ref().expect("Delivered to a next hop");
        let Some(PathElement::NextHop { next_hop: hop, .. }) = path.last() else {
            panic!("{dst}: path should end at a next hop: {path}");
        };
        assert_eq!(hop, &next_hop.parse::<IpBlock>().expect("Address"));
        assert_eq!(path_uids(path)[0], Some("ni-src"));
        assert!(explanation.connection.is_all());
    }
}

#[test]
fn test_transit_gateway_prefix_filter() {
    // host bits of the filter prefix and of the subnets are ignored
    let filter = PrefixFilter::new("192.168.100.0/20", Some(21), Some(22), FilterAction::Permit)
        .expect("Valid filter");
    let block = |s: &str| s.parse::<IpBlock>().expect("CIDR");
    assert_eq!(filter.prefix, block("192.168.96.0/20"));
    assert!(filter.matches(&block("192.168.100.0/21")));
    assert!(!filter.matches(&block("192.168.100.0/24")));
    assert!(!filter.matches(&block("192.168.100.0/20")));

    let config = load(TGW);
    let map = connectivity(&config, &AnalysisParams::default()).expect("Connectivity");

    let admitted = map.get("ni-a", "ni-b1").expect("Analyzed pair");
    assert!(admitted.connection.is_all());
    let path = admitted.forward.path.as_ref().expect("Routed through the hub");
    assert_eq!(path_uids(path), vec![Some("ni-a"), Some("tgw-1"), Some("ni-b1")]);

    let filtered = map.get("ni-a", "ni-b2").expect("Analyzed pair");
    assert!(filtered.connection.is_empty());
    assert_eq!(filtered.forward.blocked_by(&ConnectionSet::all()), BlockedBy::Routing);
}

#[test]
fn test_floating_ip_precedence() {
    let config = load(WEB);
    let params = AnalysisParams::default();

    let sources = config
        .routing
        .vpc("vpc-1")
        .and_then(|v| v.implicit().public_gateway_sources("pgw-1"))
        .expect("Public gateway sources");
    assert!(sources.contains("ni-1"));
    assert!(!sources.contains("ni-3"));

    let tree = explain(&config, &params, "web2", "8.8.8.8", None).expect("Explained");
    let explanation = &tree.explanations[0];
    let path = explanation.path.as_ref().expect("Routed through the floating IP");
    assert_eq!(path_uids(path), vec![Some("ni-3"), Some("fip-1"), None]);
    assert!(explanation.connection.is_all());

    let tree = explain(&config, &params, "web1", "8.8.8.8", None).expect("Explained");
    let path = tree.explanations[0].path.as_ref().expect("Routed through the gateway");
    assert_eq!(path_uids(path), vec![Some("ni-1"), Some("pgw-1"), None]);
}

#[test]
fn test_public_gateway_exclusion() {
    let config = load(WEB);
    let params = AnalysisParamsBuilder::default()
        .include_pgw(false)
        .build()
        .expect("Valid params");

    let through_pgw = explain(&config, &params, "web1", "8.8.8.8", None).expect("Explained");
    assert_eq!(through_pgw.explanations[0].blocked_by, BlockedBy::Routing);
    assert!(!through_pgw.is_allowed());

    let through_fip = explain(&config, &params, "web2", "8.8.8.8", None).expect("Explained");
    assert!(through_fip.is_allowed());

    let no_gateway = explain(&config, &AnalysisParams::default(), "db1", "8.8.8.8", None)
        .expect("Explained");
    assert_eq!(no_gateway.explanations[0].blocked_by, BlockedBy::Routing);
}

#[test]
fn test_unanswered_external_traffic() {
    let config = load(WEB);
    // responses from 1.1.1.1 are not admitted by the NACL
    let tree =
        explain(&config, &AnalysisParams::default(), "web1", "1.1.1.1", None).expect("Explained");
    let explanation = &tree.explanations[0];
    assert_eq!(explanation.dst.address, "1.1.1.1".parse::<IpBlock>().expect("Address"));
    assert_eq!(
        explanation.connection,
        ConnectionSet::all().subtract(&ConnectionSet::tcp_all())
    );
    assert_eq!(explanation.stateful, StatefulState::NonStateful);
}

#[test]
fn test_security_group_reference() {
    let config = load(WEB);
    let map = connectivity(&config, &AnalysisParams::default()).expect("Connectivity");

    let to_db = map.get("ni-1", "ni-2").expect("Analyzed pair");
    assert_eq!(to_db.connection, &tcp_dst(5432, 5432));
    assert_eq!(to_db.connection.stateful(), StatefulState::Stateful);
    let sg = to_db
        .forward
        .ingress
        .iter()
        .find(|t| t.kind == LayerKind::SecurityGroup)
        .expect("Ingress SG trace");
    assert_eq!(sg.resource, "sg-db");
}

#[test]
fn test_load_balancer_pool() {
    let config = load(WEB);
    let map = connectivity(&config, &AnalysisParams::default()).expect("Connectivity");
    let lb = "lb-1/10.240.10.10";

    let to_member = map.get(lb, "ni-2").expect("Analyzed pair");
    assert_eq!(to_member.connection, &tcp_dst(5432, 5432));

    let to_other = map.get(lb, "ni-1").expect("Analyzed pair");
    assert!(to_other.connection.is_empty());
    assert_eq!(to_other.forward.note.as_deref(), Some("not a pool member"));

    // the pool does not restrict connections towards the load balancer
    let to_lb = map.get("ni-1", lb).expect("Analyzed pair");
    assert!(to_lb.connection.is_all());
}

#[test]
fn test_per_subnet_connectivity() {
    let config = load(WEB);
    let map = connectivity(&config, &AnalysisParams::per_subnet()).expect("Connectivity");
    assert!(map
        .endpoints()
        .iter()
        .any(|e| e.kind == EndpointKind::External));
    assert_eq!(
        map.endpoints()
            .iter()
            .filter(|e| e.kind == EndpointKind::Subnet)
            .count(),
        2
    );
    assert!(map.get("sub-1", "sub-2").expect("Analyzed pair").connection.is_all());
    assert!(map.get("sub-1", "8.8.8.8").expect("Analyzed pair").connection.is_all());
    assert!(map.get("sub-2", "8.8.8.8").expect("Analyzed pair").connection.is_empty());

    let params = AnalysisParamsBuilder::default()
        .granularity(reach::Granularity::PerSubnet)
        .include_pgw(false)
        .build()
        .expect("Valid params");
    let map = connectivity(&config, &params).expect("Connectivity");
    assert_eq!(map.endpoints().len(), 2);
}

#[test]
fn test_query_resolution() {
    let config = load(WEB);
    let found = resolve(&config, "web1/eth0").expect("Resolved");
    assert_eq!(found[0].uid, "ni-1");
    let found = resolve(&config, "10.240.20.4").expect("Resolved");
    assert_eq!(found[0].uid, "ni-2");
    let found = resolve(&config, "lb").expect("Resolved");
    assert_eq!(found[0].kind, EndpointKind::LoadBalancerIp);

    assert!(matches!(
        resolve(&config, "eth0"),
        Err(QueryError::Ambiguous { candidates, .. }) if candidates.len() == 3
    ));
    assert!(matches!(
        resolve(&config, "10.240.10.0/24"),
        Err(QueryError::Ambiguous { .. })
    ));
    assert_eq!(
        resolve(&config, "10.250.0.1"),
        Err(QueryError::NotFound("10.250.0.1".to_string()))
    );

    // an external block is explained per external endpoint it overlaps
    let found = resolve(&config, "8.8.8.0/24").expect("Resolved");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|e| e.kind == EndpointKind::External));
    assert!(found.iter().any(|e| e.label == "8.8.8.8"));

    assert!(matches!(
        explain(&config, &AnalysisParams::default(), "8.8.8.8", "1.1.1.1", None),
        Err(ReachError::Query(QueryError::NoInternalEndpoint { .. }))
    ));
}

#[test]
fn test_diff() {
    let before = parse(WEB);
    let mut after = before.clone();
    after.security_groups[1].rules[1].connection = ConnectionSpec::All;
    after.instances.push(InstanceSpec {
        uid: "vsi-4".to_string(),
        name: "db2".to_string(),
        vpc: "vpc-1".to_string(),
        zone: None,
        network_interfaces: vec![NetworkInterfaceSpec {
            uid: "ni-4".to_string(),
            name: "eth0".to_string(),
            subnet: "sub-2".to_string(),
            primary_ip: Some("10.240.20.5".to_string()),
        }],
    });
    let before = build_configs(&before).expect("Valid configuration");
    let after = build_configs(&after).expect("Valid configuration");
    let params = AnalysisParams::default();

    assert!(diff(&before, &before, &params).expect("Diff").is_empty());

    let report = diff(&before, &after, &params).expect("Diff");
    assert!(report.removed_endpoints.is_empty());
    let added: Vec<&str> = report.added_endpoints.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(added, vec!["ni-4"]);

    let web_to_db = report
        .changed
        .iter()
        .find(|p| p.src.uid == "ni-1" && p.dst.uid == "ni-2")
        .expect("Changed pair");
    assert!(web_to_db.removed.is_empty());
    assert_eq!(web_to_db.added, ConnectionSet::all().subtract(&tcp_dst(5432, 5432)));

    // the pool keeps the load balancer to TCP 5432
    assert!(!report
        .changed
        .iter()
        .any(|p| p.src.uid == "lb-1/10.240.10.10" && p.dst.uid == "ni-2"));
}
