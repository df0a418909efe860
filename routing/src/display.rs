// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Module that implements Display for routing objects

use crate::global::{GlobalRoutingAnalyzer, VpcRouting};
use crate::pretty_utils::{Heading, joined, line};
use crate::table::RoutingTable;
use crate::tgw::{TgwConnection, TransitGateway};
use std::fmt::Display;

impl Display for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("Routing table {} ({})", self.name, self.kind)).fmt(f)?;
        for route in self.routes() {
            writeln!(f, "  {route}")?;
        }
        line(f)?;
        for (block, hops) in self.next_hops() {
            writeln!(f, "  {block} -> {}", joined(hops, ", "))?;
        }
        writeln!(f, "  dropped: {}", self.dropped())?;
        writeln!(f, "  delegated: {}", self.delegated())
    }
}

impl Display for TgwConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to VPC {}", self.name, self.vpc)?;
        if !self.filters.is_empty() {
            write!(f, " filters: [{}]", joined(&self.filters, "; "))?;
        }
        write!(f, " default: {}", self.default_action)
    }
}

impl Display for TransitGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("Transit gateway {}", self.resource.name)).fmt(f)?;
        for conn in &self.connections {
            writeln!(f, "  {conn}")?;
        }
        for route in self.learned_routes() {
            writeln!(
                f,
                "  learned {} from VPC {} ({})",
                route.prefix, route.vpc, route.connection
            )?;
        }
        Ok(())
    }
}

impl Display for VpcRouting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("VPC {}", self.implicit().vpc())).fmt(f)?;
        writeln!(f, "  address range: {}", self.implicit().address_range())?;
        for (subnet, table) in self.egress_tables() {
            writeln!(f, "  subnet {subnet} uses egress table {}", table.name)?;
        }
        if let Some(table) = self.ingress_table() {
            writeln!(f, "  ingress table {}", table.name)?;
        }
        Ok(())
    }
}

impl Display for GlobalRoutingAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for vpc in self.vpcs().values() {
            vpc.fmt(f)?;
        }
        for tgw in self.transit_gateways() {
            tgw.fmt(f)?;
        }
        line(f)
    }
}
