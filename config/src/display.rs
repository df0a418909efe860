// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of model objects

use crate::model::{LoadBalancer, MultipleVpcConfigs, Node, Subnet, VpcConfig};
use routing::pretty_utils::{Heading, joined, line};
use std::fmt::Display;

const SEP: &str = "       ";

fn fmt_subnet(
    f: &mut std::fmt::Formatter<'_>,
    subnet: &Subnet,
    nodes: &[&Node],
) -> std::fmt::Result {
    write!(f, "  ■ {} ({}): {}, acl {}", subnet.name, subnet.uid, subnet.cidr, subnet.nacl)?;
    if let Some(pgw) = &subnet.public_gateway {
        write!(f, ", pgw {pgw}")?;
    }
    writeln!(f)?;
    for node in nodes {
        writeln!(f, "{SEP} {node}")?;
    }
    Ok(())
}

impl Display for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  ■ load balancer {}:", self.name)?;
        for pool in &self.pools {
            writeln!(
                f,
                "{SEP} pool {} port {}: {}",
                pool.name,
                pool.port,
                joined(&pool.members, " ")
            )?;
        }
        Ok(())
    }
}

fn fmt_vpc<'a>(
    f: &mut std::fmt::Formatter<'_>,
    vpc: &'a VpcConfig,
    nodes_of: impl Fn(&'a Subnet) -> Vec<&'a Node>,
) -> std::fmt::Result {
    writeln!(f, " VPC {} ({}): {}", vpc.name, vpc.uid, vpc.address_range)?;
    for subnet in vpc.subnets.values() {
        fmt_subnet(f, subnet, &nodes_of(subnet))?;
    }
    for nacl in vpc.nacls.values() {
        writeln!(f, "  ■ network ACL {}: {} rules", nacl.name, nacl.analyzer.rules().len())?;
    }
    for sg in vpc.security_groups.values() {
        writeln!(
            f,
            "  ■ security group {}: {} rules, members {}",
            sg.name,
            sg.analyzer.rules().len(),
            joined(&sg.members, " ")
        )?;
    }
    for lb in vpc.load_balancers.values() {
        lb.fmt(f)?;
    }
    Ok(())
}

impl Display for VpcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_vpc(f, self, |_| Vec::new())
    }
}

impl Display for MultipleVpcConfigs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("VPCs ({})", self.vpcs.len())).fmt(f)?;
        for vpc in self.vpcs.values() {
            fmt_vpc(f, vpc, |subnet| self.nodes_in(subnet).collect())?;
        }
        Heading(format!("External nodes ({})", self.external_nodes().count())).fmt(f)?;
        for node in self.external_nodes() {
            writeln!(f, "{SEP} {node}")?;
        }
        line(f)
    }
}
