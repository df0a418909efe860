// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-filter connectivity results

use connset::ConnectionSet;
use lpm::IpBlock;
use std::collections::BTreeMap;

/// What a filter allows and denies towards each of a disjoint set of peer blocks.
/// All four maps share the same keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectivityResult {
    pub is_ingress: bool,
    pub allowed: BTreeMap<IpBlock, ConnectionSet>,
    pub denied: BTreeMap<IpBlock, ConnectionSet>,
    pub allow_rules: BTreeMap<IpBlock, Vec<usize>>,
    pub deny_rules: BTreeMap<IpBlock, Vec<usize>>,
}

impl ConnectivityResult {
    /// A result with nothing allowed or denied towards each of `peers`
    #[must_use]
    pub fn new(is_ingress: bool, peers: &[IpBlock]) -> Self {
        let mut result = Self {
            is_ingress,
            ..Default::default()
        };
        for peer in peers {
            result.allowed.insert(peer.clone(), ConnectionSet::empty());
            result.denied.insert(peer.clone(), ConnectionSet::empty());
            result.allow_rules.insert(peer.clone(), Vec::new());
            result.deny_rules.insert(peer.clone(), Vec::new());
        }
        result
    }

    pub fn peers(&self) -> impl Iterator<Item = &IpBlock> {
        self.allowed.keys()
    }

    /// The verdict towards `peer`: what is allowed for every address of `peer`,
    /// and the rules that contributed for any of them
    #[must_use]
    pub fn verdict(&self, peer: &IpBlock) -> FilterVerdict {
        let mut verdict: Option<FilterVerdict> = None;
        for (block, allowed) in self.allowed.iter().filter(|(b, _)| b.overlaps(peer)) {
            let part = FilterVerdict {
                allowed: allowed.clone(),
                allow_rules: self.allow_rules.get(block).cloned().unwrap_or_default(),
                deny_rules: self.deny_rules.get(block).cloned().unwrap_or_default(),
            };
            verdict = Some(match verdict {
                None => part,
                Some(v) => v.intersect(&part),
            });
        }
        verdict.unwrap_or_else(FilterVerdict::none)
    }
}

/// The outcome of one filter for one (local, peer) pair
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterVerdict {
    pub allowed: ConnectionSet,
    pub allow_rules: Vec<usize>,
    pub deny_rules: Vec<usize>,
}

fn merge_indices(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged: Vec<usize> = a.iter().chain(b.iter()).copied().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}

impl FilterVerdict {
    /// Nothing allowed, no contributing rules
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
    /// Everything allowed, no contributing rules
    #[must_use]
    pub fn all() -> Self {
        Self {
            allowed: ConnectionSet::all(),
            ..Default::default()
        }
    }
    /// Combine two verdicts that must both pass
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            allowed: self.allowed.intersection(&other.allowed),
            allow_rules: merge_indices(&self.allow_rules, &other.allow_rules),
            deny_rules: merge_indices(&self.deny_rules, &other.deny_rules),
        }
    }
    /// Combine two verdicts of which either may pass
    #[must_use]
    pub fn unite(&self, other: &Self) -> Self {
        Self {
            allowed: self.allowed.union(&other.allowed),
            allow_rules: merge_indices(&self.allow_rules, &other.allow_rules),
            deny_rules: merge_indices(&self.deny_rules, &other.deny_rules),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connset::Protocol;

    #[test]
    fn test_verdict_intersects_overlapping_peers() {
        let a: IpBlock = "10.0.0.0/25".parse().expect("ok");
        let b: IpBlock = "10.0.0.128/25".parse().expect("ok");
        let mut result = ConnectivityResult::new(true, &[a.clone(), b.clone()]);
        result.allowed.insert(a.clone(), ConnectionSet::all());
        result.allow_rules.insert(a.clone(), vec![0]);
        result
            .allowed
            .insert(b.clone(), ConnectionSet::protocol(Protocol::Udp));
        result.allow_rules.insert(b.clone(), vec![1]);

        let single = result.verdict(&"10.0.0.1".parse().expect("ok"));
        assert!(single.allowed.is_all());
        assert_eq!(single.allow_rules, vec![0]);

        let both = result.verdict(&"10.0.0.0/24".parse().expect("ok"));
        assert_eq!(both.allowed, ConnectionSet::protocol(Protocol::Udp));
        assert_eq!(both.allow_rules, vec![0, 1]);

        let outside = result.verdict(&"192.168.0.1".parse().expect("ok"));
        assert!(outside.allowed.is_empty());
    }
}
