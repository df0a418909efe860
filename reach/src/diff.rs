// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Semantic difference of the connectivity of two configurations.
//!
//! Endpoints of both configurations are matched by name when the name is unique
//! on both sides, and by uid otherwise. For every pair of matched endpoints the
//! report holds the connections only allowed in the first configuration
//! (`removed`) and those only allowed in the second (`added`).

use crate::connectivity::{ConnectivityMap, connectivity};
use crate::endpoint::Endpoint;
use crate::errors::ReachResult;
use crate::pairmap::EndpointId;
use crate::params::AnalysisParams;
use config::MultipleVpcConfigs;
use connset::ConnectionSet;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairDiff {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub removed: ConnectionSet,
    pub added: ConnectionSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub added_endpoints: Vec<Endpoint>,
    pub removed_endpoints: Vec<Endpoint>,
    pub changed: Vec<PairDiff>,
}

impl DiffReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_endpoints.is_empty()
            && self.removed_endpoints.is_empty()
            && self.changed.is_empty()
    }
}

fn names(endpoints: &[Endpoint]) -> BTreeMap<&str, Vec<EndpointId>> {
    let mut names: BTreeMap<&str, Vec<EndpointId>> = BTreeMap::new();
    for (id, endpoint) in endpoints.iter().enumerate() {
        names.entry(endpoint.name.as_str()).or_default().push(id);
    }
    names
}

/// Map the endpoints of `a` to those of `b`
fn match_endpoints(a: &[Endpoint], b: &[Endpoint]) -> BTreeMap<EndpointId, EndpointId> {
    let names_a = names(a);
    let names_b = names(b);
    let mut matched = BTreeMap::new();
    let mut used = BTreeSet::new();
    for (id, endpoint) in a.iter().enumerate() {
        let unique_name = names_a.get(endpoint.name.as_str()).is_some_and(|ids| ids.len() == 1);
        let by_name = match names_b.get(endpoint.name.as_str()).map(Vec::as_slice) {
            Some([other]) if unique_name => Some(*other),
            _ => None,
        };
        let other = by_name.or_else(|| b.iter().position(|e| e.uid == endpoint.uid));
        if let Some(other) = other
            && used.insert(other)
        {
            matched.insert(id, other);
        }
    }
    matched
}

/// Compare two connectivity maps
#[must_use]
pub fn diff_maps(a: &ConnectivityMap, b: &ConnectivityMap) -> DiffReport {
    let matched = match_endpoints(a.endpoints(), b.endpoints());
    let reverse: BTreeMap<EndpointId, EndpointId> = matched.iter().map(|(x, y)| (*y, *x)).collect();
    let empty = ConnectionSet::empty();

    let removed_endpoints = a
        .endpoints()
        .iter()
        .enumerate()
        .filter(|(id, _)| !matched.contains_key(id))
        .map(|(_, e)| e.clone())
        .collect();
    let added_endpoints = b
        .endpoints()
        .iter()
        .enumerate()
        .filter(|(id, _)| !reverse.contains_key(id))
        .map(|(_, e)| e.clone())
        .collect();

    let mut changed = Vec::new();
    let mut seen = BTreeSet::new();
    for pair in a.pairs() {
        let (Some(other_src), Some(other_dst)) =
            (matched.get(&pair.src_id), matched.get(&pair.dst_id))
        else {
            continue;
        };
        seen.insert((*other_src, *other_dst));
        let other = b.connection(*other_src, *other_dst).unwrap_or(&empty);
        let removed = pair.connection.subtract(other);
        let added = other.subtract(pair.connection);
        if !removed.is_empty() || !added.is_empty() {
            changed.push(PairDiff {
                src: pair.src.clone(),
                dst: pair.dst.clone(),
                removed,
                added,
            });
        }
    }
    for pair in b.pairs() {
        if seen.contains(&(pair.src_id, pair.dst_id)) || pair.connection.is_empty() {
            continue;
        }
        if reverse.contains_key(&pair.src_id) && reverse.contains_key(&pair.dst_id) {
            changed.push(PairDiff {
                src: pair.src.clone(),
                dst: pair.dst.clone(),
                removed: ConnectionSet::empty(),
                added: pair.connection.clone(),
            });
        }
    }

    let report = DiffReport {
        added_endpoints,
        removed_endpoints,
        changed,
    };
    debug!(
        "Diff: {} endpoints added, {} removed, {} pairs changed",
        report.added_endpoints.len(),
        report.removed_endpoints.len(),
        report.changed.len()
    );
    report
}

/// Compare the connectivity of two configurations
pub fn diff(
    a: &MultipleVpcConfigs,
    b: &MultipleVpcConfigs,
    params: &AnalysisParams,
) -> ReachResult<DiffReport> {
    let map_a = connectivity(a, params)?;
    let map_b = connectivity(b, params)?;
    Ok(diff_maps(&map_a, &map_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointKind;
    use lpm::IpBlock;
    use pretty_assertions::assert_eq;
    use routing::{ResourceKind, ResourceRef};

    fn endpoint(uid: &str, name: &str) -> Endpoint {
        Endpoint {
            uid: uid.to_string(),
            name: name.to_string(),
            label: name.to_string(),
            kind: EndpointKind::NetworkInterface,
            address: IpBlock::empty(),
            vpc: None,
            subnet: None,
            resource: ResourceRef::new(ResourceKind::NetworkInterface, name, uid),
        }
    }

    #[test]
    fn test_match_by_name_then_uid() {
        let a = vec![
            endpoint("a-1", "web/eth0"),
            endpoint("a-2", "twin"),
            endpoint("a-3", "twin"),
            endpoint("shared", "db/eth0"),
            endpoint("gone", "old/eth0"),
        ];
        let b = vec![
            endpoint("b-3", "twin"),
            endpoint("b-1", "web/eth0"),
            endpoint("shared", "db/eth1"),
            endpoint("a-2", "twin"),
        ];
        let matched = match_endpoints(&a, &b);
        assert_eq!(
            matched.into_iter().collect::<Vec<_>>(),
            vec![(0, 1), (1, 3), (3, 2)]
        );
    }
}
