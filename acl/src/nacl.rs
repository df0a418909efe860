// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Network ACL analyzer.
//!
//! For a subnet and a direction, the subnet is split into the disjoint targets
//! induced by the subnet-side blocks of the rules, and the address space into the
//! disjoint peers induced by the peer-side blocks. Each (target, peer) pair is
//! evaluated by walking the rules in order, first match wins per connection.

use crate::result::{ConnectivityResult, FilterVerdict};
use crate::rules::{Action, NaclRule};
use connset::ConnectionSet;
use lpm::{IpBlock, disjoint_ip_blocks};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// The analysis of one ACL for one subnet and direction
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetAnalysis {
    pub subnet: IpBlock,
    pub is_ingress: bool,
    /// Disjoint parts of the subnet, with the connectivity of each towards all peers
    pub targets: Vec<(IpBlock, ConnectivityResult)>,
}

impl SubnetAnalysis {
    /// What every address of `local` may exchange with every address of `peer`
    #[must_use]
    pub fn verdict(&self, local: &IpBlock, peer: &IpBlock) -> FilterVerdict {
        self.targets
            .iter()
            .filter(|(target, _)| target.overlaps(local))
            .map(|(_, result)| result.verdict(peer))
            .reduce(|acc, v| acc.intersect(&v))
            .unwrap_or_else(FilterVerdict::none)
    }
}

#[derive(Debug)]
pub struct NaclAnalyzer {
    name: String,
    rules: Vec<NaclRule>,
    cache: Mutex<BTreeMap<(IpBlock, bool), Arc<SubnetAnalysis>>>,
}

impl NaclAnalyzer {
    #[must_use]
    pub fn new(name: &str, rules: Vec<NaclRule>) -> Self {
        Self {
            name: name.to_string(),
            rules,
            cache: Mutex::new(BTreeMap::new()),
        }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn rules(&self) -> &[NaclRule] {
        &self.rules
    }
    #[must_use]
    pub fn rule(&self, index: usize) -> Option<&NaclRule> {
        self.rules.iter().find(|r| r.index == index)
    }

    /// Analysis of the ACL for `subnet` in one direction. Results are memoized per
    /// (subnet, direction) and shared.
    #[must_use]
    pub fn analyze(&self, subnet: &IpBlock, ingress: bool) -> Arc<SubnetAnalysis> {
        let mut cache = self.cache.lock();
        cache
            .entry((subnet.clone(), ingress))
            .or_insert_with(|| Arc::new(self.build(subnet, ingress)))
            .clone()
    }

    /// What the ACL allows between `local`, inside `subnet`, and `peer`
    #[must_use]
    pub fn verdict(
        &self,
        subnet: &IpBlock,
        local: &IpBlock,
        peer: &IpBlock,
        ingress: bool,
    ) -> FilterVerdict {
        self.analyze(subnet, ingress).verdict(local, peer)
    }

    fn build(&self, subnet: &IpBlock, ingress: bool) -> SubnetAnalysis {
        let rules: Vec<&NaclRule> = self
            .rules
            .iter()
            .filter(|r| r.direction.is_ingress() == ingress)
            .collect();
        let (locals, remotes): (Vec<IpBlock>, Vec<IpBlock>) = rules
            .iter()
            .map(|r| {
                let (local, remote) = r.sides();
                (local.clone(), remote.clone())
            })
            .unzip();

        let targets: Vec<IpBlock> = disjoint_ip_blocks(std::slice::from_ref(subnet), &locals)
            .into_iter()
            .filter(|b| b.is_subset(subnet))
            .collect();
        let peers = disjoint_ip_blocks(&[IpBlock::cidr_all(), subnet.clone()], &remotes);

        let targets = targets
            .into_iter()
            .map(|target| {
                let result = Self::analyze_target(&rules, subnet, &target, &peers, ingress);
                (target, result)
            })
            .collect::<Vec<_>>();
        debug!(
            "ACL {}: analyzed subnet {subnet} ({}): {} targets x {} peers",
            self.name,
            if ingress { "ingress" } else { "egress" },
            targets.len(),
            peers.len()
        );
        SubnetAnalysis {
            subnet: subnet.clone(),
            is_ingress: ingress,
            targets,
        }
    }

    fn analyze_target(
        rules: &[&NaclRule],
        subnet: &IpBlock,
        target: &IpBlock,
        peers: &[IpBlock],
        ingress: bool,
    ) -> ConnectivityResult {
        let mut result = ConnectivityResult::new(ingress, peers);
        for peer in peers {
            // traffic within the subnet does not cross the ACL
            if peer.is_subset(subnet) {
                result.allowed.insert(peer.clone(), ConnectionSet::all());
                continue;
            }
            let mut allowed = ConnectionSet::empty();
            let mut denied = ConnectionSet::empty();
            let mut allow_rules = Vec::new();
            let mut deny_rules = Vec::new();
            for rule in rules {
                let (local, remote) = rule.sides();
                if !target.is_subset(local) || !peer.is_subset(remote) {
                    continue;
                }
                match rule.action {
                    Action::Allow => {
                        let added = rule.connection.subtract(&denied);
                        if !added.subtract(&allowed).is_empty() {
                            allowed = allowed.union(&added);
                            allow_rules.push(rule.index);
                        }
                    }
                    Action::Deny => {
                        let added = rule.connection.subtract(&allowed);
                        if !added.subtract(&denied).is_empty() {
                            denied = denied.union(&added);
                            deny_rules.push(rule.index);
                        }
                    }
                }
            }
            result.allowed.insert(peer.clone(), allowed);
            result.denied.insert(peer.clone(), denied);
            result.allow_rules.insert(peer.clone(), allow_rules);
            result.deny_rules.insert(peer.clone(), deny_rules);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Direction;
    use connset::Protocol;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const ANY: &str = "0.0.0.0/0";

    fn block(s: &str) -> IpBlock {
        s.parse().expect("Bad test block")
    }

    fn rule(
        index: usize,
        action: Action,
        direction: Direction,
        src: &str,
        dst: &str,
        connection: ConnectionSet,
    ) -> NaclRule {
        NaclRule {
            index,
            name: format!("rule-{index}"),
            src: block(src),
            dst: block(dst),
            connection,
            action,
            direction,
        }
    }

    fn tcp_dst(port: i64) -> ConnectionSet {
        ConnectionSet::tcp_or_udp(Protocol::Tcp, 1, 65535, port, port).expect("TCP takes ports")
    }

    #[test]
    fn test_intra_subnet_bypass() {
        let subnet = block("10.0.0.0/24");
        let acl = NaclAnalyzer::new(
            "deny-all",
            vec![
                rule(0, Action::Deny, Direction::Inbound, ANY, ANY, ConnectionSet::all()),
                rule(1, Action::Deny, Direction::Outbound, ANY, ANY, ConnectionSet::all()),
            ],
        );
        let inside = acl.verdict(&subnet, &block("10.0.0.6"), &block("10.0.0.5"), true);
        assert!(inside.allowed.is_all());
        assert!(inside.deny_rules.is_empty());

        let outside = acl.verdict(&subnet, &block("10.0.0.6"), &block("10.0.1.5"), true);
        assert!(outside.allowed.is_empty());
        assert_eq!(outside.deny_rules, vec![0]);
    }

    #[test]
    fn test_first_match_and_shadowing() {
        let subnet = block("10.0.0.0/24");
        let acl = NaclAnalyzer::new(
            "web",
            vec![
                rule(
                    0,
                    Action::Allow,
                    Direction::Inbound,
                    ANY,
                    "10.0.0.0/24",
                    ConnectionSet::tcp_all(),
                ),
                // fully shadowed by rule 0
                rule(1, Action::Deny, Direction::Inbound, ANY, "10.0.0.0/24", tcp_dst(22)),
                rule(2, Action::Deny, Direction::Inbound, ANY, ANY, ConnectionSet::all()),
            ],
        );
        let analysis = acl.analyze(&subnet, true);
        assert_eq!(analysis.targets.len(), 1);
        let (_, result) = &analysis.targets[0];
        let peer = result
            .peers()
            .find(|p| p.contains("8.8.8.8".parse().expect("ok")))
            .expect("Peers cover the address space")
            .clone();
        assert_eq!(result.allowed[&peer], ConnectionSet::tcp_all());
        assert_eq!(
            result.denied[&peer],
            ConnectionSet::all().subtract(&ConnectionSet::tcp_all())
        );
        assert_eq!(result.allow_rules[&peer], vec![0]);
        assert_eq!(result.deny_rules[&peer], vec![2]);
    }

    #[test]
    fn test_deny_before_allow() {
        let subnet = block("10.0.0.0/24");
        let acl = NaclAnalyzer::new(
            "no-ssh",
            vec![
                rule(
                    0,
                    Action::Deny,
                    Direction::Outbound,
                    "10.0.0.0/24",
                    "192.168.0.0/16",
                    tcp_dst(22),
                ),
                rule(1, Action::Allow, Direction::Outbound, ANY, ANY, ConnectionSet::all()),
            ],
        );
        let v = acl.verdict(&subnet, &block("10.0.0.1"), &block("192.168.1.1"), false);
        assert_eq!(v.allowed, ConnectionSet::all().subtract(&tcp_dst(22)));
        assert_eq!(v.allow_rules, vec![1]);
        assert_eq!(v.deny_rules, vec![0]);

        let v = acl.verdict(&subnet, &block("10.0.0.1"), &block("172.16.1.1"), false);
        assert!(v.allowed.is_all());
        assert!(v.deny_rules.is_empty());
    }

    #[test]
    fn test_targets_split_subnet() {
        let subnet = block("10.0.0.0/24");
        let acl = NaclAnalyzer::new(
            "half",
            vec![rule(
                0,
                Action::Allow,
                Direction::Inbound,
                ANY,
                "10.0.0.0/25",
                ConnectionSet::all(),
            )],
        );
        let analysis = acl.analyze(&subnet, true);
        assert_eq!(analysis.targets.len(), 2);
        let peer = block("1.1.1.1");
        assert!(analysis.verdict(&block("10.0.0.1"), &peer).allowed.is_all());
        assert!(analysis.verdict(&block("10.0.0.200"), &peer).allowed.is_empty());
        // a block spanning both targets only gets what both get
        assert!(analysis.verdict(&subnet, &peer).allowed.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_analysis_is_cached() {
        let subnet = block("10.0.0.0/24");
        let acl = NaclAnalyzer::new(
            "cached",
            vec![rule(0, Action::Allow, Direction::Inbound, ANY, ANY, ConnectionSet::all())],
        );
        let first = acl.analyze(&subnet, true);
        let second = acl.analyze(&subnet, true);
        assert!(Arc::ptr_eq(&first, &second));
        let egress = acl.analyze(&subnet, false);
        assert!(!Arc::ptr_eq(&first, &egress));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|l| l.contains("ACL cached: analyzed subnet") && l.contains("(ingress)"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("ingress analysis built {n} times")),
            }
        });
    }
}
