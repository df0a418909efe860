// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Security group analyzer. Security groups are allow-only: whatever any rule
//! matching a (local, remote) pair allows is allowed.

use crate::errors::AclError;
use crate::result::{ConnectivityResult, FilterVerdict};
use crate::rules::{SgRemote, SgRule};
use lpm::{IpBlock, disjoint_ip_blocks};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Per-direction analysis of a security group. Local parts with identical
/// results share the same result.
#[derive(Debug, Clone)]
pub struct SgDirectionAnalysis {
    pub is_ingress: bool,
    pub locals: Vec<(IpBlock, Arc<ConnectivityResult>)>,
}

impl SgDirectionAnalysis {
    /// What every address of `local` may exchange with every address of `remote`.
    /// Addresses outside the group's local parts get nothing.
    #[must_use]
    pub fn verdict(&self, local: &IpBlock, remote: &IpBlock) -> FilterVerdict {
        let mut verdict: Option<FilterVerdict> = None;
        let mut covered = IpBlock::empty();
        for (part, result) in self.locals.iter().filter(|(p, _)| p.overlaps(local)) {
            covered = covered.union(part);
            let v = result.verdict(remote);
            verdict = Some(match verdict {
                None => v,
                Some(acc) => acc.intersect(&v),
            });
        }
        if !local.is_subset(&covered) {
            return FilterVerdict::none();
        }
        verdict.unwrap_or_else(FilterVerdict::none)
    }

    /// Number of distinct results shared by the local parts
    #[must_use]
    pub fn distinct_results(&self) -> usize {
        let mut seen: Vec<&Arc<ConnectivityResult>> = Vec::new();
        for (_, result) in &self.locals {
            if !seen.iter().any(|s| Arc::ptr_eq(s, result)) {
                seen.push(result);
            }
        }
        seen.len()
    }
}

#[derive(Debug)]
pub struct SgAnalyzer {
    name: String,
    rules: Vec<SgRule>,
    /// remote of each rule, with security group references resolved
    remotes: Vec<IpBlock>,
    cache: Mutex<BTreeMap<bool, Arc<SgDirectionAnalysis>>>,
}

impl SgAnalyzer {
    /// Build an analyzer for the group `name`. Remotes that reference security
    /// groups are resolved to their member addresses with `resolve`.
    ///
    /// # Errors
    ///
    /// Fails if a referenced security group cannot be resolved.
    pub fn new(
        name: &str,
        rules: Vec<SgRule>,
        resolve: impl Fn(&str) -> Option<IpBlock>,
    ) -> Result<Self, AclError> {
        let remotes = rules
            .iter()
            .map(|rule| match &rule.remote {
                SgRemote::Block(block) => Ok(block.clone()),
                SgRemote::SecurityGroup(remote) => {
                    resolve(remote).ok_or_else(|| AclError::UnknownSecurityGroup {
                        group: name.to_string(),
                        index: rule.index,
                        remote: remote.clone(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            rules,
            remotes,
            cache: Mutex::new(BTreeMap::new()),
        })
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn rules(&self) -> &[SgRule] {
        &self.rules
    }
    #[must_use]
    pub fn rule(&self, index: usize) -> Option<&SgRule> {
        self.rules.iter().find(|r| r.index == index)
    }

    #[must_use]
    pub fn analyze(&self, ingress: bool) -> Arc<SgDirectionAnalysis> {
        let mut cache = self.cache.lock();
        cache
            .entry(ingress)
            .or_insert_with(|| Arc::new(self.build(ingress)))
            .clone()
    }

    #[must_use]
    pub fn verdict(&self, local: &IpBlock, remote: &IpBlock, ingress: bool) -> FilterVerdict {
        self.analyze(ingress).verdict(local, remote)
    }

    fn build(&self, ingress: bool) -> SgDirectionAnalysis {
        let rules: Vec<(&SgRule, &IpBlock)> = self
            .rules
            .iter()
            .zip(self.remotes.iter())
            .filter(|(r, _)| r.direction.is_ingress() == ingress)
            .collect();
        let locals: Vec<IpBlock> = rules.iter().map(|(r, _)| r.local.clone()).collect();
        let remotes: Vec<IpBlock> = rules.iter().map(|(_, b)| (*b).clone()).collect();
        let local_parts = disjoint_ip_blocks(&[IpBlock::cidr_all()], &locals);
        let remote_parts = disjoint_ip_blocks(&[IpBlock::cidr_all()], &remotes);

        let mut shared: Vec<Arc<ConnectivityResult>> = Vec::new();
        let mut analyzed = Vec::with_capacity(local_parts.len());
        for part in local_parts {
            let mut result = ConnectivityResult::new(ingress, &remote_parts);
            for (rule, remote) in &rules {
                if !part.is_subset(&rule.local) {
                    continue;
                }
                for peer in remote_parts.iter().filter(|p| p.is_subset(remote)) {
                    if let Some(allowed) = result.allowed.get_mut(peer) {
                        *allowed = allowed.union(&rule.connection);
                    }
                    if let Some(indices) = result.allow_rules.get_mut(peer) {
                        indices.push(rule.index);
                    }
                }
            }
            let result = match shared.iter().find(|s| ***s == result) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = Arc::new(result);
                    shared.push(fresh.clone());
                    fresh
                }
            };
            analyzed.push((part, result));
        }
        debug!(
            "Security group {}: {} local parts, {} distinct results ({})",
            self.name,
            analyzed.len(),
            shared.len(),
            if ingress { "ingress" } else { "egress" }
        );
        SgDirectionAnalysis {
            is_ingress: ingress,
            locals: analyzed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Direction;
    use connset::{ConnectionSet, Protocol};
    use pretty_assertions::assert_eq;

    fn block(s: &str) -> IpBlock {
        s.parse().expect("Bad test block")
    }

    fn anywhere() -> SgRemote {
        SgRemote::Block(block("0.0.0.0/0"))
    }

    fn sg_rule(
        index: usize,
        direction: Direction,
        remote: SgRemote,
        conn: ConnectionSet,
    ) -> SgRule {
        SgRule {
            index,
            direction,
            remote,
            local: block("10.0.0.4/30"),
            connection: conn,
        }
    }

    fn tcp_dst(port: i64) -> ConnectionSet {
        ConnectionSet::tcp_or_udp(Protocol::Tcp, 1, 65535, port, port).expect("TCP takes ports")
    }

    #[test]
    fn test_union_of_matching_rules() {
        let sg = SgAnalyzer::new(
            "web",
            vec![
                sg_rule(0, Direction::Inbound, SgRemote::Block(block("0.0.0.0/0")), tcp_dst(443)),
                sg_rule(1, Direction::Inbound, SgRemote::Block(block("10.0.0.0/8")), tcp_dst(22)),
                sg_rule(2, Direction::Outbound, anywhere(), ConnectionSet::all()),
            ],
            |_| None,
        )
        .expect("No group references");

        let v = sg.verdict(&block("10.0.0.5"), &block("10.1.1.1"), true);
        assert_eq!(v.allowed, tcp_dst(443).union(&tcp_dst(22)));
        assert_eq!(v.allow_rules, vec![0, 1]);
        assert!(v.deny_rules.is_empty());

        let v = sg.verdict(&block("10.0.0.5"), &block("8.8.8.8"), true);
        assert_eq!(v.allowed, tcp_dst(443));
        assert_eq!(v.allow_rules, vec![0]);

        let v = sg.verdict(&block("10.0.0.5"), &block("8.8.8.8"), false);
        assert!(v.allowed.is_all());

        // not a member
        let v = sg.verdict(&block("10.0.1.5"), &block("8.8.8.8"), true);
        assert!(v.allowed.is_empty());
    }

    #[test]
    fn test_group_reference() {
        let members = block("10.0.0.8/30");
        let sg = SgAnalyzer::new(
            "db",
            vec![sg_rule(
                0,
                Direction::Inbound,
                SgRemote::SecurityGroup("app".to_string()),
                tcp_dst(5432),
            )],
            |name| (name == "app").then(|| members.clone()),
        )
        .expect("app is resolvable");
        assert_eq!(
            sg.verdict(&block("10.0.0.5"), &block("10.0.0.9"), true).allowed,
            tcp_dst(5432)
        );
        assert!(
            sg.verdict(&block("10.0.0.5"), &block("10.0.0.13"), true)
                .allowed
                .is_empty()
        );

        let err = SgAnalyzer::new(
            "db",
            vec![sg_rule(
                0,
                Direction::Inbound,
                SgRemote::SecurityGroup("gone".to_string()),
                tcp_dst(1),
            )],
            |_| None,
        )
        .expect_err("Reference must not resolve");
        assert!(matches!(err, AclError::UnknownSecurityGroup { index: 0, .. }));
    }

    #[test]
    fn test_results_are_shared() {
        let sg = SgAnalyzer::new(
            "split",
            vec![
                SgRule {
                    index: 0,
                    direction: Direction::Inbound,
                    remote: SgRemote::Block(block("0.0.0.0/0")),
                    local: block("10.0.0.0/25"),
                    connection: tcp_dst(80),
                },
                SgRule {
                    index: 1,
                    direction: Direction::Inbound,
                    remote: SgRemote::Block(block("0.0.0.0/0")),
                    local: block("10.0.0.128/25"),
                    connection: tcp_dst(80),
                },
            ],
            |_| None,
        )
        .expect("No group references");
        let analysis = sg.analyze(true);
        // two /25 parts with different rule indices, plus everything outside the /24
        assert_eq!(analysis.locals.len(), 3);
        assert_eq!(analysis.distinct_results(), 3);
        assert!(Arc::ptr_eq(&analysis, &sg.analyze(true)));
        assert_eq!(
            sg.verdict(&block("10.0.0.0/24"), &block("1.2.3.4"), true).allowed,
            tcp_dst(80)
        );
    }

    #[test]
    fn test_identical_parts_deduplicated() {
        let sg = SgAnalyzer::new(
            "outbound-only",
            vec![sg_rule(0, Direction::Outbound, anywhere(), ConnectionSet::all())],
            |_| None,
        )
        .expect("No group references");
        // inbound has no rules: the member part and the rest share one empty result
        let analysis = sg.analyze(false);
        assert_eq!(analysis.distinct_results(), 2);
        let ingress = sg.analyze(true);
        assert_eq!(ingress.locals.len(), 1);
        assert_eq!(ingress.distinct_results(), 1);
    }
}
