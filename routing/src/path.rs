// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing paths

use crate::pretty_utils::joined;
use lpm::IpBlock;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    NetworkInterface,
    LoadBalancer,
    Subnet,
    PublicGateway,
    FloatingIp,
    TransitGateway,
}

/// A named internal resource appearing in a path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub uid: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(kind: ResourceKind, name: &str, uid: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            uid: uid.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathElement {
    Resource(ResourceRef),
    External(IpBlock),
    /// A deliver route hop. `alternatives` holds the other equal-cost next hops.
    NextHop {
        next_hop: IpBlock,
        alternatives: Vec<IpBlock>,
        orig_dest: IpBlock,
    },
}

impl PathElement {
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            PathElement::Resource(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Path(Vec<PathElement>);

impl Path {
    #[must_use]
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    #[must_use]
    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }
    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }
    /// The first resource of the given kind on the path
    #[must_use]
    pub fn find(&self, kind: ResourceKind) -> Option<&ResourceRef> {
        self.0
            .iter()
            .filter_map(PathElement::resource)
            .find(|r| r.kind == kind)
    }
    /// Whether the path ends in a deliver hop
    #[must_use]
    pub fn is_next_hop(&self) -> bool {
        matches!(self.last(), Some(PathElement::NextHop { .. }))
    }
    /// Replace a trailing external destination with the resource that owns it
    #[must_use]
    pub fn ending_at(mut self, dst: &ResourceRef) -> Self {
        if matches!(self.last(), Some(PathElement::External(_))) {
            self.0.pop();
            self.0.push(PathElement::Resource(dst.clone()));
        }
        self
    }
    /// This path followed by `tail`, where the first element of `tail` repeats
    /// the last element of this path
    #[must_use]
    pub fn join(mut self, tail: Path) -> Self {
        let mut rest = tail.0.into_iter();
        if let (Some(first), Some(last)) = (rest.next(), self.0.last())
            && first != *last
        {
            self.0.push(first);
        }
        self.0.extend(rest);
        self
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::NetworkInterface => write!(f, "network interface"),
            ResourceKind::LoadBalancer => write!(f, "load balancer"),
            ResourceKind::Subnet => write!(f, "subnet"),
            ResourceKind::PublicGateway => write!(f, "public gateway"),
            ResourceKind::FloatingIp => write!(f, "floating IP"),
            ResourceKind::TransitGateway => write!(f, "transit gateway"),
        }
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathElement::Resource(r) => write!(f, "{r}"),
            PathElement::External(block) => write!(f, "{block}"),
            PathElement::NextHop {
                next_hop,
                alternatives,
                orig_dest,
            } => {
                write!(f, "next hop {next_hop} (dest {orig_dest})")?;
                if !alternatives.is_empty() {
                    write!(f, " [ECMP: {}]", joined(alternatives, ", "))?;
                }
                Ok(())
            }
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (n, element) in self.0.iter().enumerate() {
            if n > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}
