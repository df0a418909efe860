// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of analysis results

use crate::connectivity::ConnectivityMap;
use crate::diff::DiffReport;
use crate::explain::{Explanation, ExplanationTree};
use crate::flow::{BlockedBy, FilterTrace, LayerKind};
use routing::pretty_utils::{Heading, joined, line};
use std::fmt::Display;

impl Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::NetworkAcl => write!(f, "network ACL"),
            LayerKind::SecurityGroup => write!(f, "security group"),
            LayerKind::LoadBalancer => write!(f, "load balancer"),
        }
    }
}

impl Display for BlockedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockedBy::Nothing => write!(f, "nothing"),
            BlockedBy::Routing => write!(f, "routing"),
            BlockedBy::Egress => write!(f, "egress filters"),
            BlockedBy::Ingress => write!(f, "ingress filters"),
            BlockedBy::Both => write!(f, "egress and ingress filters"),
        }
    }
}

impl Display for FilterTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = if self.ingress { "ingress" } else { "egress" };
        write!(f, "{} {} ({direction}): {}", self.kind, self.resource, self.allowed)?;
        if !self.allow_rules.is_empty() {
            write!(f, ", allowed by rules {}", joined(&self.allow_rules, " "))?;
        }
        if !self.deny_rules.is_empty() {
            write!(f, ", denied by rules {}", joined(&self.deny_rules, " "))?;
        }
        Ok(())
    }
}

impl Display for ConnectivityMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading(format!("Connectivity ({})", self.params())).fmt(f)?;
        for pair in self.allowed() {
            writeln!(f, " {} => {} : {}", pair.src, pair.dst, pair.connection.enhanced_string())?;
        }
        line(f)
    }
}

const SEP: &str = "    ";

impl Display for Explanation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  ■ {} => {} : {}", self.src, self.dst, self.connection.enhanced_string())?;
        match &self.path {
            Some(path) => writeln!(f, "{SEP}path: {path}")?,
            None => writeln!(f, "{SEP}path: none")?,
        }
        for trace in self.egress.iter().chain(&self.ingress) {
            writeln!(f, "{SEP}{trace}")?;
        }
        if self.blocked_by != BlockedBy::Nothing {
            writeln!(f, "{SEP}blocked by {}", self.blocked_by)?;
        }
        if let Some(note) = &self.note {
            writeln!(f, "{SEP}note: {note}")?;
        }
        Ok(())
    }
}

impl Display for ExplanationTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.filter {
            Some(filter) => Heading(format!(
                "Explain {} => {} ({filter})",
                self.src_query, self.dst_query
            ))
            .fmt(f)?,
            None => Heading(format!("Explain {} => {}", self.src_query, self.dst_query)).fmt(f)?,
        }
        for explanation in &self.explanations {
            explanation.fmt(f)?;
        }
        line(f)
    }
}

impl Display for DiffReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Heading("Connectivity diff".to_string()).fmt(f)?;
        for endpoint in &self.removed_endpoints {
            writeln!(f, " - endpoint {endpoint}")?;
        }
        for endpoint in &self.added_endpoints {
            writeln!(f, " + endpoint {endpoint}")?;
        }
        for pair in &self.changed {
            if !pair.removed.is_empty() {
                writeln!(f, " - {} => {} : {}", pair.src, pair.dst, pair.removed)?;
            }
            if !pair.added.is_empty() {
                writeln!(f, " + {} => {} : {}", pair.src, pair.dst, pair.added)?;
            }
        }
        line(f)
    }
}
