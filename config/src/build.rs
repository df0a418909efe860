// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Translation of [`ParsedResources`] into [`MultipleVpcConfigs`]

use crate::errors::{ConfigError, ConfigResult, address};
use crate::model::{
    LoadBalancer, MultipleVpcConfigs, Nacl, Node, NodeKind, Placement, Pool, SecurityGroup,
    Subnet, VpcConfig,
};
use crate::resources::{
    ConnectionSpec, IcmpSpec, NaclSpec, ParsedResources, PortRange, PortSpec, RemoteSpec,
    RoutingTableSpec, SecurityGroupSpec, TransitGatewaySpec,
};
use acl::{NaclAnalyzer, NaclRule, SgAnalyzer, SgRemote, SgRule};
use connset::{
    ConnectionSet, MAX_ICMP_CODE, MAX_ICMP_TYPE, MAX_PORT, MIN_ICMP_CODE, MIN_ICMP_TYPE, MIN_PORT,
    Protocol,
};
use lpm::{IpBlock, disjoint_ip_blocks, public_internet_block};
use routing::{
    GlobalRoutingAnalyzer, PrefixFilter, ResourceKind, ResourceRef, Route, RoutingTable,
    SystemImplicitRt, TableKind, TgwConnection, TransitGateway, VpcRouting,
};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, error, warn};

fn dangling(context: String, kind: &'static str, reference: &str) -> ConfigError {
    ConfigError::DanglingReference {
        context,
        kind,
        reference: reference.to_string(),
    }
}

fn unsupported(context: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::UnsupportedRule {
        context: context.to_string(),
        reason: reason.into(),
    }
}

fn port_range(context: &str, range: Option<PortRange>) -> ConfigResult<(i64, i64)> {
    match range {
        None => Ok((MIN_PORT, MAX_PORT)),
        Some(PortRange { min, max }) if MIN_PORT <= min && min <= max && max <= MAX_PORT => {
            Ok((min, max))
        }
        Some(PortRange { min, max }) => {
            Err(unsupported(context, format!("port range {min}-{max}")))
        }
    }
}

/// The connection set of a rule. Absent ports, ICMP type or ICMP code mean all.
pub(crate) fn connection(context: &str, spec: &ConnectionSpec) -> ConfigResult<ConnectionSet> {
    let ranged = |protocol: Protocol, ports: &PortSpec| -> ConfigResult<ConnectionSet> {
        let (src_min, src_max) = port_range(context, ports.src_ports)?;
        let (dst_min, dst_max) = port_range(context, ports.dst_ports)?;
        ConnectionSet::tcp_or_udp(protocol, src_min, src_max, dst_min, dst_max)
            .map_err(|e| unsupported(context, e.to_string()))
    };
    match spec {
        ConnectionSpec::All => Ok(ConnectionSet::all()),
        ConnectionSpec::Tcp(p) => ranged(Protocol::Tcp, p),
        ConnectionSpec::Udp(p) => ranged(Protocol::Udp, p),
        ConnectionSpec::Icmp(IcmpSpec { icmp_type, code }) => {
            let valid_type = |t: i64| (MIN_ICMP_TYPE..=MAX_ICMP_TYPE).contains(&t);
            let valid_code = |c: i64| (MIN_ICMP_CODE..=MAX_ICMP_CODE).contains(&c);
            match (*icmp_type, *code) {
                (None, None) => Ok(ConnectionSet::icmp(
                    MIN_ICMP_TYPE,
                    MAX_ICMP_TYPE,
                    MIN_ICMP_CODE,
                    MAX_ICMP_CODE,
                )),
                (None, Some(_)) => Err(unsupported(context, "ICMP code without type")),
                (Some(t), None) if valid_type(t) => {
                    Ok(ConnectionSet::icmp(t, t, MIN_ICMP_CODE, MAX_ICMP_CODE))
                }
                (Some(t), Some(c)) if valid_type(t) && valid_code(c) => {
                    Ok(ConnectionSet::icmp(t, t, c, c))
                }
                (Some(t), c) => Err(unsupported(
                    context,
                    format!("ICMP type {t} code {c:?} out of range"),
                )),
            }
        }
        ConnectionSpec::Unsupported => Err(unsupported(context, "unsupported protocol")),
    }
}

struct Builder<'a> {
    parsed: &'a ParsedResources,
    vpcs: BTreeMap<String, VpcConfig>,
    nodes: Vec<Node>,
}

impl<'a> Builder<'a> {
    fn new(parsed: &'a ParsedResources) -> Self {
        Self {
            parsed,
            vpcs: BTreeMap::new(),
            nodes: Vec::new(),
        }
    }

    fn check_uids(&self) -> ConfigResult {
        let p = self.parsed;
        let uids = p
            .vpcs
            .iter()
            .map(|r| &r.uid)
            .chain(p.subnets.iter().map(|r| &r.uid))
            .chain(p.network_acls.iter().map(|r| &r.uid))
            .chain(p.security_groups.iter().map(|r| &r.uid))
            .chain(p.instances.iter().map(|r| &r.uid))
            .chain(
                p.instances
                    .iter()
                    .flat_map(|i| i.network_interfaces.iter().map(|n| &n.uid)),
            )
            .chain(p.public_gateways.iter().map(|r| &r.uid))
            .chain(p.floating_ips.iter().map(|r| &r.uid))
            .chain(p.transit_gateways.iter().map(|r| &r.uid))
            .chain(p.routing_tables.iter().map(|r| &r.uid))
            .chain(p.load_balancers.iter().map(|r| &r.uid));
        let mut seen = BTreeSet::new();
        for uid in uids {
            if !seen.insert(uid.as_str()) {
                return Err(ConfigError::DuplicateUid(uid.clone()));
            }
        }
        Ok(())
    }

    fn vpc_mut(&mut self, uid: &str, context: String) -> ConfigResult<&mut VpcConfig> {
        self.vpcs
            .get_mut(uid)
            .ok_or_else(|| dangling(context, "VPC", uid))
    }

    fn build_vpcs(&mut self) -> ConfigResult {
        for spec in &self.parsed.vpcs {
            let context = format!("VPC {}", spec.uid);
            let address_range = address(&context, IpBlock::from_cidr_list(&spec.address_prefixes))?;
            self.vpcs.insert(
                spec.uid.clone(),
                VpcConfig {
                    uid: spec.uid.clone(),
                    name: spec.name.clone(),
                    address_range,
                    subnets: BTreeMap::new(),
                    nacls: BTreeMap::new(),
                    security_groups: BTreeMap::new(),
                    load_balancers: BTreeMap::new(),
                },
            );
        }
        Ok(())
    }

    fn build_subnets(&mut self) -> ConfigResult {
        let p = self.parsed;
        for spec in &p.subnets {
            let context = format!("VPC {}/Subnet {}", spec.vpc, spec.name);
            let cidr = address(&context, IpBlock::from_cidr(&spec.cidr))?;
            if !p.network_acls.iter().any(|n| n.uid == spec.network_acl) {
                return Err(dangling(context, "network ACL", &spec.network_acl));
            }
            if let Some(pgw) = &spec.public_gateway
                && !p.public_gateways.iter().any(|g| &g.uid == pgw)
            {
                return Err(dangling(context, "public gateway", pgw));
            }
            if let Some(table) = &spec.routing_table
                && !p
                    .routing_tables
                    .iter()
                    .any(|t| &t.uid == table && t.kind == TableKind::Egress)
            {
                return Err(dangling(context, "egress routing table", table));
            }
            let vpc = self.vpc_mut(&spec.vpc, context)?;
            vpc.subnets.insert(
                spec.uid.clone(),
                Subnet {
                    uid: spec.uid.clone(),
                    name: spec.name.clone(),
                    vpc: spec.vpc.clone(),
                    cidr,
                    zone: spec.zone.clone(),
                    nacl: spec.network_acl.clone(),
                    public_gateway: spec.public_gateway.clone(),
                    routing_table: spec.routing_table.clone(),
                },
            );
        }
        for vpc in self.vpcs.values().filter(|v| v.subnets.is_empty()) {
            warn!("VPC {} ({}) has no subnets", vpc.name, vpc.uid);
        }
        Ok(())
    }

    /// Parse a node address and check that it lies in `subnet`
    fn node_address(
        &self,
        context: &str,
        subnet: &str,
        raw: Option<&str>,
    ) -> ConfigResult<(IpBlock, Placement)> {
        let raw = raw.ok_or_else(|| ConfigError::MissingPrimaryIp(context.to_string()))?;
        let addr = address(context, IpBlock::from_address(raw))?;
        if addr.contains(Ipv4Addr::UNSPECIFIED) {
            return Err(ConfigError::PlaceholderAddress(context.to_string()));
        }
        let subnet = self
            .vpcs
            .values()
            .find_map(|v| v.subnets.get(subnet))
            .ok_or_else(|| dangling(context.to_string(), "subnet", subnet))?;
        if !addr.is_subset(&subnet.cidr) {
            return Err(ConfigError::AddressOutsideSubnet {
                context: context.to_string(),
                address: raw.to_string(),
                subnet: subnet.cidr.to_string(),
            });
        }
        let placement = Placement {
            vpc: subnet.vpc.clone(),
            subnet: subnet.uid.clone(),
        };
        Ok((addr, placement))
    }

    fn build_nodes(&mut self) -> ConfigResult {
        for instance in &self.parsed.instances {
            if !self.vpcs.contains_key(&instance.vpc) {
                return Err(dangling(format!("Instance {}", instance.name), "VPC", &instance.vpc));
            }
            for ni in &instance.network_interfaces {
                let context = format!(
                    "VPC {}/Instance {}/Interface {}",
                    instance.vpc, instance.name, ni.name
                );
                let (addr, placement) =
                    self.node_address(&context, &ni.subnet, ni.primary_ip.as_deref())?;
                self.nodes.push(Node::internal(
                    &ni.uid,
                    &ni.name,
                    NodeKind::NetworkInterface,
                    addr,
                    placement,
                    Some(instance.name.clone()),
                ));
            }
        }
        for lb in &self.parsed.load_balancers {
            let mut nodes = Vec::with_capacity(lb.private_ips.len());
            for ip in &lb.private_ips {
                let context = format!(
                    "VPC {}/Load balancer {}/Address {}",
                    lb.vpc, lb.name, ip.address
                );
                let (addr, placement) =
                    self.node_address(&context, &ip.subnet, Some(ip.address.as_str()))?;
                let uid = format!("{}/{}", lb.uid, ip.address);
                let name = format!("{}-{}", lb.name, ip.address);
                self.nodes.push(Node::internal(
                    &uid,
                    &name,
                    NodeKind::LoadBalancerIp,
                    addr,
                    placement,
                    Some(lb.name.clone()),
                ));
                nodes.push(uid);
            }
            let pools = lb
                .pools
                .iter()
                .map(|pool| {
                    let context =
                        format!("VPC {}/Load balancer {}/Pool {}", lb.vpc, lb.name, pool.name);
                    if let Some(missing) = pool
                        .members
                        .iter()
                        .find(|m| !self.nodes.iter().any(|n| &n.uid == *m))
                    {
                        return Err(dangling(context, "pool member", missing));
                    }
                    if !(MIN_PORT..=MAX_PORT).contains(&pool.port) {
                        return Err(unsupported(&context, format!("member port {}", pool.port)));
                    }
                    Ok(Pool {
                        name: pool.name.clone(),
                        port: pool.port,
                        members: pool.members.clone(),
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;
            let context = format!("Load balancer {}", lb.name);
            self.vpc_mut(&lb.vpc, context)?.load_balancers.insert(
                lb.uid.clone(),
                LoadBalancer {
                    uid: lb.uid.clone(),
                    name: lb.name.clone(),
                    vpc: lb.vpc.clone(),
                    nodes,
                    pools,
                },
            );
        }
        Ok(())
    }

    fn build_nacl(spec: &NaclSpec) -> ConfigResult<Nacl> {
        let rules = spec
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let context = format!("VPC {}/NACL {}/Rule index {index}", spec.vpc, spec.name);
                Ok(NaclRule {
                    index,
                    name: if rule.name.is_empty() {
                        format!("rule-{index}")
                    } else {
                        rule.name.clone()
                    },
                    src: address(&context, rule.source.parse())?,
                    dst: address(&context, rule.destination.parse())?,
                    connection: connection(&context, &rule.connection)?,
                    action: rule.action,
                    direction: rule.direction,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Nacl {
            uid: spec.uid.clone(),
            name: spec.name.clone(),
            vpc: spec.vpc.clone(),
            analyzer: NaclAnalyzer::new(&spec.name, rules),
        })
    }

    fn build_nacls(&mut self) -> ConfigResult {
        for spec in &self.parsed.network_acls {
            let nacl = Self::build_nacl(spec)?;
            let context = format!("NACL {}", spec.name);
            self.vpc_mut(&spec.vpc, context)?
                .nacls
                .insert(spec.uid.clone(), nacl);
        }
        Ok(())
    }

    /// Member node uids of a security group
    fn sg_members(&self, spec: &SecurityGroupSpec) -> ConfigResult<BTreeSet<String>> {
        let mut members = BTreeSet::new();
        for target in &spec.targets {
            let lb = self
                .vpcs
                .get(&spec.vpc)
                .and_then(|v| v.load_balancers.get(target));
            if let Some(lb) = lb {
                members.extend(lb.nodes.iter().cloned());
            } else if self.nodes.iter().any(|n| &n.uid == target) {
                members.insert(target.clone());
            } else {
                let context = format!("VPC {}/Security group {}", spec.vpc, spec.name);
                return Err(dangling(context, "security group target", target));
            }
        }
        Ok(members)
    }

    fn build_security_groups(&mut self) -> ConfigResult {
        let p = self.parsed;
        /* member addresses of every group first: rules may reference any group */
        let mut members: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        let mut addresses: BTreeMap<&str, IpBlock> = BTreeMap::new();
        for spec in &p.security_groups {
            let uids = self.sg_members(spec)?;
            let block = self
                .nodes
                .iter()
                .filter(|n| uids.contains(&n.uid))
                .fold(IpBlock::empty(), |acc, n| acc.union(&n.address));
            addresses.insert(spec.uid.as_str(), block);
            members.insert(spec.uid.as_str(), uids);
        }
        let resolve = |reference: &str| -> Option<IpBlock> {
            p.security_groups
                .iter()
                .find(|sg| sg.uid == reference || sg.name == reference)
                .and_then(|sg| addresses.get(sg.uid.as_str()).cloned())
        };
        for spec in &p.security_groups {
            let rules = spec
                .rules
                .iter()
                .enumerate()
                .map(|(index, rule)| {
                    let context = format!(
                        "VPC {}/Security group {}/Rule index {index}",
                        spec.vpc, spec.name
                    );
                    let remote = match &rule.remote {
                        RemoteSpec::Cidr { cidr } => {
                            SgRemote::Block(address(&context, cidr.parse())?)
                        }
                        RemoteSpec::SecurityGroup { security_group } => {
                            SgRemote::SecurityGroup(security_group.clone())
                        }
                    };
                    let local = match &rule.local {
                        Some(local) => address(&context, local.parse())?,
                        None => IpBlock::cidr_all(),
                    };
                    Ok(SgRule {
                        index,
                        direction: rule.direction,
                        remote,
                        local,
                        connection: connection(&context, &rule.connection)?,
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;
            let analyzer = SgAnalyzer::new(&spec.name, rules, resolve)?;
            let group = SecurityGroup {
                uid: spec.uid.clone(),
                name: spec.name.clone(),
                vpc: spec.vpc.clone(),
                members: members.remove(spec.uid.as_str()).unwrap_or_default(),
                analyzer,
            };
            let context = format!("Security group {}", spec.name);
            self.vpc_mut(&spec.vpc, context)?
                .security_groups
                .insert(spec.uid.clone(), group);
        }
        Ok(())
    }

    fn routing_table(spec: &RoutingTableSpec) -> ConfigResult<RoutingTable> {
        let routes = spec
            .routes
            .iter()
            .map(|r| {
                let route = Route::new(
                    &r.name,
                    &r.destination,
                    r.action,
                    r.next_hop.as_deref(),
                    r.priority,
                )
                .map_err(|source| ConfigError::Routing {
                    context: format!(
                        "VPC {}/Routing table {}/Route {}",
                        spec.vpc, spec.name, r.name
                    ),
                    source,
                })?;
                let route = match &r.zone {
                    Some(zone) => route.with_zone(zone),
                    None => route,
                };
                Ok(route.with_advertise(r.advertise))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(RoutingTable::new(&spec.name, &spec.uid, spec.kind, routes))
    }

    fn transit_gateway(&self, spec: &TransitGatewaySpec) -> ConfigResult<TransitGateway> {
        let connections = spec
            .connections
            .iter()
            .map(|conn| {
                let context = format!("Transit gateway {}/Connection {}", spec.name, conn.name);
                if !self.vpcs.contains_key(&conn.vpc) {
                    return Err(dangling(context, "VPC", &conn.vpc));
                }
                let filters = conn
                    .prefix_filters
                    .iter()
                    .map(|f| PrefixFilter::new(&f.prefix, f.ge, f.le, f.action))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| ConfigError::Routing { context, source })?;
                Ok(TgwConnection::new(&conn.name, &conn.vpc, filters, conn.default_action))
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(TransitGateway::new(
            ResourceRef::new(ResourceKind::TransitGateway, &spec.name, &spec.uid),
            connections,
        ))
    }

    fn build_routing(&self) -> ConfigResult<GlobalRoutingAnalyzer> {
        let p = self.parsed;
        let mut vpcs = Vec::with_capacity(self.vpcs.len());
        for vpc in self.vpcs.values() {
            let mut implicit = SystemImplicitRt::new(&vpc.uid, vpc.address_range.clone());
            for fip in &p.floating_ips {
                let context = format!("Floating IP {}", fip.name);
                address(&context, IpBlock::from_address(&fip.address))?;
                let target = self
                    .nodes
                    .iter()
                    .find(|n| n.uid == fip.target && n.kind == NodeKind::NetworkInterface)
                    .ok_or_else(|| dangling(context, "network interface", &fip.target))?;
                if target.vpc() == Some(vpc.uid.as_str()) {
                    implicit.add_floating_ip(
                        &target.uid,
                        ResourceRef::new(ResourceKind::FloatingIp, &fip.name, &fip.uid),
                    );
                }
            }
            for pgw in p.public_gateways.iter().filter(|g| g.vpc == vpc.uid) {
                /* subnets are sources too, for subnet-level analysis */
                let subnets = vpc
                    .subnets
                    .values()
                    .filter(|s| s.public_gateway.as_ref() == Some(&pgw.uid))
                    .map(|s| s.uid.clone());
                let sources = self
                    .nodes
                    .iter()
                    .filter(|n| n.kind == NodeKind::NetworkInterface)
                    .filter(|n| {
                        n.subnet()
                            .and_then(|s| vpc.subnets.get(s))
                            .is_some_and(|s| s.public_gateway.as_ref() == Some(&pgw.uid))
                    })
                    .map(|n| n.uid.clone())
                    .chain(subnets);
                implicit.add_public_gateway(
                    ResourceRef::new(ResourceKind::PublicGateway, &pgw.name, &pgw.uid),
                    sources,
                );
            }
            let published = vpc.subnets.values().map(|s| s.cidr.clone()).collect();
            let mut routing = VpcRouting::new(implicit, published);

            let mut ingress_seen = false;
            for spec in p.routing_tables.iter().filter(|t| t.vpc == vpc.uid) {
                let table = Arc::new(Self::routing_table(spec)?);
                match spec.kind {
                    TableKind::Egress => {
                        for subnet in vpc
                            .subnets
                            .values()
                            .filter(|s| s.routing_table.as_ref() == Some(&spec.uid))
                        {
                            routing.set_egress_table(&subnet.uid, table.clone());
                        }
                    }
                    TableKind::Ingress if ingress_seen => {
                        return Err(ConfigError::DuplicateIngressTable(vpc.uid.clone()));
                    }
                    TableKind::Ingress => {
                        ingress_seen = true;
                        routing.set_ingress_table(table);
                    }
                }
            }
            vpcs.push(routing);
        }
        let tgws = p
            .transit_gateways
            .iter()
            .map(|t| self.transit_gateway(t))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(GlobalRoutingAnalyzer::new(vpcs, tgws))
    }

    /// Every public block referenced by a filter rule or a route
    fn referenced_external_blocks(&self) -> Vec<IpBlock> {
        let p = self.parsed;
        let public = public_internet_block();
        let nacl_blocks = p
            .network_acls
            .iter()
            .flat_map(|n| n.rules.iter())
            .flat_map(|r| [r.source.parse::<IpBlock>().ok(), r.destination.parse().ok()]);
        let sg_blocks = p
            .security_groups
            .iter()
            .flat_map(|sg| sg.rules.iter())
            .map(|r| match &r.remote {
                RemoteSpec::Cidr { cidr } => cidr.parse().ok(),
                RemoteSpec::SecurityGroup { .. } => None,
            });
        let route_blocks = p
            .routing_tables
            .iter()
            .flat_map(|t| t.routes.iter())
            .map(|r| IpBlock::from_cidr(&r.destination).ok());
        nacl_blocks
            .chain(sg_blocks)
            .chain(route_blocks)
            .flatten()
            .map(|b| b.intersection(&public))
            .filter(|b| !b.is_empty())
            .collect()
    }

    fn build(&mut self) -> ConfigResult<GlobalRoutingAnalyzer> {
        self.check_uids()?;
        self.build_vpcs()?;
        self.build_subnets()?;
        self.build_nodes()?;
        self.build_nacls()?;
        self.build_security_groups()?;
        let routing = self.build_routing()?;
        self.build_external_nodes();
        Ok(routing)
    }

    fn build_external_nodes(&mut self) {
        let referenced = self.referenced_external_blocks();
        let parts = disjoint_ip_blocks(&[public_internet_block()], &referenced);
        debug!("Public internet split into {} external nodes", parts.len());
        self.nodes.extend(parts.into_iter().map(Node::external));
    }
}

/// Build the configuration model of a snapshot. Fails on duplicate uids,
/// references to unknown resources, missing or placeholder addresses, and rules
/// that cannot be expressed.
pub fn build_configs(parsed: &ParsedResources) -> ConfigResult<MultipleVpcConfigs> {
    let mut builder = Builder::new(parsed);
    let routing = builder
        .build()
        .inspect_err(|e| error!("Invalid configuration: {e}"))?;
    debug!(
        "Configuration built: {} VPCs, {} nodes",
        builder.vpcs.len(),
        builder.nodes.len()
    );
    Ok(MultipleVpcConfigs {
        vpcs: builder.vpcs,
        nodes: builder.nodes,
        routing,
    })
}
