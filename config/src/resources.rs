// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Provider-agnostic description of a cloud snapshot, as produced by a parser
//! front-end. Addresses are kept as strings and validated by [`crate::build_configs`].
//! Resources reference each other by uid.

use acl::{Action, Direction};
use routing::{FilterAction, RouteAction, TableKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedResources {
    pub vpcs: Vec<VpcSpec>,
    pub subnets: Vec<SubnetSpec>,
    pub network_acls: Vec<NaclSpec>,
    pub security_groups: Vec<SecurityGroupSpec>,
    pub instances: Vec<InstanceSpec>,
    pub public_gateways: Vec<PublicGatewaySpec>,
    pub floating_ips: Vec<FloatingIpSpec>,
    pub transit_gateways: Vec<TransitGatewaySpec>,
    pub routing_tables: Vec<RoutingTableSpec>,
    pub load_balancers: Vec<LoadBalancerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpcSpec {
    pub uid: String,
    pub name: String,
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub cidr: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub network_acl: String,
    #[serde(default)]
    pub public_gateway: Option<String>,
    /// egress routing table
    #[serde(default)]
    pub routing_table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaclSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub rules: Vec<NaclRuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaclRuleSpec {
    #[serde(default)]
    pub name: String,
    pub action: Action,
    pub direction: Direction,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub connection: ConnectionSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub min: i64,
    pub max: i64,
}

/// Ports of a TCP or UDP rule; an absent range means all ports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSpec {
    pub src_ports: Option<PortRange>,
    pub dst_ports: Option<PortRange>,
}

/// ICMP type and code of a rule; absent means all
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcmpSpec {
    #[serde(rename = "type")]
    pub icmp_type: Option<i64>,
    pub code: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ConnectionSpec {
    #[default]
    All,
    Tcp(PortSpec),
    Udp(PortSpec),
    Icmp(IcmpSpec),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    /// uids of the network interfaces and load balancers the group applies to
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub rules: Vec<SgRuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteSpec {
    Cidr { cidr: String },
    SecurityGroup { security_group: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgRuleSpec {
    pub direction: Direction,
    pub remote: RemoteSpec,
    /// local addresses the rule applies to, all when absent
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub connection: ConnectionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub network_interfaces: Vec<NetworkInterfaceSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    pub uid: String,
    pub name: String,
    pub subnet: String,
    #[serde(default)]
    pub primary_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicGatewaySpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpSpec {
    pub uid: String,
    pub name: String,
    pub address: String,
    /// uid of the network interface the address is bound to
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitGatewaySpec {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub connections: Vec<TgwConnectionSpec>,
}

fn permit() -> FilterAction {
    FilterAction::Permit
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TgwConnectionSpec {
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub prefix_filters: Vec<PrefixFilterSpec>,
    #[serde(default = "permit")]
    pub default_action: FilterAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixFilterSpec {
    pub prefix: String,
    #[serde(default)]
    pub ge: Option<u8>,
    #[serde(default)]
    pub le: Option<u8>,
    pub action: FilterAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTableSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub kind: TableKind,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

fn default_priority() -> u8 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub destination: String,
    pub action: RouteAction,
    #[serde(default)]
    pub next_hop: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub advertise: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub private_ips: Vec<LbPrivateIpSpec>,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbPrivateIpSpec {
    pub subnet: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    /// port the members listen on
    pub port: i64,
    /// uids of the member network interfaces
    pub members: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_spec_forms() {
        let rules: Vec<ConnectionSpec> = serde_yaml_ng::from_str(
            r"
- protocol: all
- protocol: tcp
  dst_ports: {min: 80, max: 100}
- protocol: icmp
  type: 8
- protocol: gre
",
        )
        .expect("Valid YAML");
        assert_eq!(
            rules,
            vec![
                ConnectionSpec::All,
                ConnectionSpec::Tcp(PortSpec {
                    src_ports: None,
                    dst_ports: Some(PortRange { min: 80, max: 100 }),
                }),
                ConnectionSpec::Icmp(IcmpSpec {
                    icmp_type: Some(8),
                    code: None,
                }),
                ConnectionSpec::Unsupported,
            ]
        );
    }

    #[test]
    fn test_remote_forms() {
        let remotes: Vec<RemoteSpec> = serde_yaml_ng::from_str(
            r"
- cidr: 10.0.0.0/8
- security_group: sg-app
",
        )
        .expect("Valid YAML");
        assert_eq!(
            remotes,
            vec![
                RemoteSpec::Cidr {
                    cidr: "10.0.0.0/8".to_string()
                },
                RemoteSpec::SecurityGroup {
                    security_group: "sg-app".to_string()
                },
            ]
        );
    }
}
