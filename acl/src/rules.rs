// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Filter rule records

use connset::ConnectionSet;
use lpm::IpBlock;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    #[must_use]
    pub fn is_ingress(self) -> bool {
        self == Direction::Inbound
    }
    #[must_use]
    pub fn from_ingress(ingress: bool) -> Self {
        if ingress {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }
}

/// A network ACL rule. `index` is the position of the rule in its ACL.
#[derive(Debug, Clone, PartialEq)]
pub struct NaclRule {
    pub index: usize,
    pub name: String,
    pub src: IpBlock,
    pub dst: IpBlock,
    pub connection: ConnectionSet,
    pub action: Action,
    pub direction: Direction,
}

impl NaclRule {
    /// The (subnet side, peer side) blocks of the rule
    #[must_use]
    pub fn sides(&self) -> (&IpBlock, &IpBlock) {
        match self.direction {
            Direction::Inbound => (&self.dst, &self.src),
            Direction::Outbound => (&self.src, &self.dst),
        }
    }
}

/// Remote side of a security group rule
#[derive(Debug, Clone, PartialEq)]
pub enum SgRemote {
    Block(IpBlock),
    /// The member addresses of another security group, by name
    SecurityGroup(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SgRule {
    pub index: usize,
    pub direction: Direction,
    pub remote: SgRemote,
    pub local: IpBlock,
    pub connection: ConnectionSet,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Allow => write!(f, "allow"),
            Action::Deny => write!(f, "deny"),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

impl Display for SgRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SgRemote::Block(block) => write!(f, "{block}"),
            SgRemote::SecurityGroup(name) => write!(f, "security group {name}"),
        }
    }
}

impl Display for NaclRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index: {}, direction: {}, name: {}, action: {}, source: {}, destination: {}, {}",
            self.index, self.direction, self.name, self.action, self.src, self.dst, self.connection
        )
    }
}

impl Display for SgRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "index: {}, direction: {}, remote: {}, local: {}, {}",
            self.index, self.direction, self.remote, self.local, self.connection
        )
    }
}
