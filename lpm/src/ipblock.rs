// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 address blocks: arbitrary sets of addresses over [`IntervalSet`].

use crate::interval::{Interval, IntervalSet};
use ipnet::Ipv4Net;
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Highest IPv4 address as an integer
pub const MAX_IPV4: i64 = 0xFFFF_FFFF;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpBlockError {
    #[error("Invalid IP address '{0}'")]
    InvalidAddress(String),
    #[error("Invalid CIDR '{0}'")]
    InvalidCidr(String),
    #[error("Invalid IP range '{0}'")]
    InvalidRange(String),
    #[error("Block {0} is not a single CIDR")]
    NotSingleCidr(String),
    #[error("Empty IP block")]
    EmptyBlock,
}

/// A set of IPv4 addresses. Blocks are totally ordered so that they can key ordered maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpBlock(IntervalSet);

impl IpBlock {
    /// The empty block
    #[must_use]
    pub const fn empty() -> Self {
        Self(IntervalSet::new())
    }
    /// The whole address space, `0.0.0.0/0`
    #[must_use]
    pub fn cidr_all() -> Self {
        Self(IntervalSet::from_interval(Interval::point(0).span_to(MAX_IPV4)))
    }
    #[must_use]
    pub fn from_ip(addr: Ipv4Addr) -> Self {
        Self(IntervalSet::from_interval(Interval::point(i64::from(
            u32::from(addr),
        ))))
    }
    #[must_use]
    pub fn from_net(net: Ipv4Net) -> Self {
        let first = i64::from(u32::from(net.network()));
        let last = i64::from(u32::from(net.broadcast()));
        Self(IntervalSet::from_interval(Interval::point(first).span_to(last)))
    }
    /// Parse a dotted-quad address
    pub fn from_address(input: &str) -> Result<Self, IpBlockError> {
        Ipv4Addr::from_str(input.trim())
            .map(Self::from_ip)
            .map_err(|_| IpBlockError::InvalidAddress(input.to_string()))
    }
    /// Parse `a.b.c.d/p`. Host bits are masked out.
    pub fn from_cidr(input: &str) -> Result<Self, IpBlockError> {
        Ipv4Net::from_str(input.trim())
            .map(Self::from_net)
            .map_err(|_| IpBlockError::InvalidCidr(input.to_string()))
    }
    /// Parse `a.b.c.d-e.f.g.h`
    pub fn from_range(input: &str) -> Result<Self, IpBlockError> {
        let bad = || IpBlockError::InvalidRange(input.to_string());
        let (start, end) = input.split_once('-').ok_or_else(bad)?;
        let start = Ipv4Addr::from_str(start.trim()).map_err(|_| bad())?;
        let end = Ipv4Addr::from_str(end.trim()).map_err(|_| bad())?;
        let interval = Interval::new(i64::from(u32::from(start)), i64::from(u32::from(end)))
            .map_err(|_| bad())?;
        Ok(Self(IntervalSet::from_interval(interval)))
    }
    /// Parse a list of CIDRs and build their union
    pub fn from_cidr_list<I, S>(cidrs: I) -> Result<Self, IpBlockError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut block = Self::empty();
        for cidr in cidrs {
            block.add(&Self::from_cidr(cidr.as_ref())?);
        }
        Ok(block)
    }

    #[must_use]
    pub fn intervals(&self) -> &IntervalSet {
        &self.0
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Number of addresses in the block
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.0.size()).unwrap_or(u64::MAX)
    }
    #[must_use]
    pub fn is_single_ip(&self) -> bool {
        self.0.is_single_point()
    }
    #[must_use]
    pub fn first_address(&self) -> Option<Ipv4Addr> {
        IntervalSet::min(&self.0).and_then(to_addr)
    }
    pub fn add(&mut self, other: &IpBlock) {
        self.0.add(&other.0);
    }
    #[must_use]
    pub fn union(&self, other: &IpBlock) -> IpBlock {
        Self(self.0.union(&other.0))
    }
    #[must_use]
    pub fn intersection(&self, other: &IpBlock) -> IpBlock {
        Self(self.0.intersection(&other.0))
    }
    #[must_use]
    pub fn subtract(&self, other: &IpBlock) -> IpBlock {
        Self(self.0.subtract(&other.0))
    }
    /// Tell if this block is contained in `other`
    #[must_use]
    pub fn is_subset(&self, other: &IpBlock) -> bool {
        self.0.is_subset(&other.0)
    }
    #[must_use]
    pub fn overlaps(&self, other: &IpBlock) -> bool {
        self.0.overlaps(&other.0)
    }
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.0.contains(i64::from(u32::from(addr)))
    }

    /// Minimal list of CIDRs covering exactly this block. At every step the longest
    /// aligned prefix starting at the cursor that stays inside the current interval
    /// is emitted, so the list is a function of the block alone.
    #[must_use]
    pub fn to_cidr_list(&self) -> Vec<Ipv4Net> {
        let mut cidrs = Vec::new();
        for interval in &self.0 {
            let mut cursor = interval.start();
            while cursor <= interval.end() {
                let alignment = if cursor == 0 {
                    32
                } else {
                    cursor.trailing_zeros().min(32)
                };
                let span = interval.end() - cursor + 1;
                let fit = 63 - span.leading_zeros();
                let bits = alignment.min(fit);
                let len = u8::try_from(32 - bits).unwrap_or(32);
                if let Some(net) = to_addr(cursor).and_then(|a| Ipv4Net::new(a, len).ok()) {
                    cidrs.push(net);
                }
                cursor += 1_i64 << bits;
            }
        }
        cidrs
    }

    /// Prefix length of the block, defined only when it is exactly one CIDR
    pub fn prefix_length(&self) -> Result<u8, IpBlockError> {
        match self.to_cidr_list().as_slice() {
            [] => Err(IpBlockError::EmptyBlock),
            [net] => Ok(net.prefix_len()),
            _ => Err(IpBlockError::NotSingleCidr(self.to_string())),
        }
    }

    /// The block as comma-separated address ranges, e.g. `10.0.0.0-10.0.0.9,10.0.1.1`
    #[must_use]
    pub fn to_ip_ranges(&self) -> String {
        self.0
            .iter()
            .filter_map(|i| {
                let start = to_addr(i.start())?;
                let end = to_addr(i.end())?;
                Some(if start == end {
                    start.to_string()
                } else {
                    format!("{start}-{end}")
                })
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Split the block into its contiguous runs
    #[must_use]
    pub fn split(&self) -> Vec<IpBlock> {
        self.0.split().into_iter().map(IpBlock).collect()
    }
}

fn to_addr(value: i64) -> Option<Ipv4Addr> {
    u32::try_from(value).ok().map(Ipv4Addr::from)
}

impl FromStr for IpBlock {
    type Err = IpBlockError;
    /// Accept an address, a CIDR, an `a-b` range or a comma-separated list of those
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.contains(',') {
            let mut block = Self::empty();
            for item in input.split(',') {
                block.add(&item.parse()?);
            }
            Ok(block)
        } else if input.contains('/') {
            Self::from_cidr(input)
        } else if input.contains('-') {
            Self::from_range(input)
        } else {
            Self::from_address(input)
        }
    }
}

impl From<Ipv4Addr> for IpBlock {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_ip(addr)
    }
}

impl From<Ipv4Net> for IpBlock {
    fn from(net: Ipv4Net) -> Self {
        Self::from_net(net)
    }
}

impl Display for IpBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cidrs = self.to_cidr_list();
        if cidrs.is_empty() {
            return write!(f, "(empty)");
        }
        for (n, cidr) in cidrs.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{cidr}")?;
        }
        Ok(())
    }
}

impl Serialize for IpBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The RFC 1918 private address space
#[must_use]
pub fn private_ip_block() -> IpBlock {
    [([10, 0, 0, 0], 8), ([172, 16, 0, 0], 12), ([192, 168, 0, 0], 16)]
        .iter()
        .fold(IpBlock::empty(), |acc, (addr, len)| {
            acc.union(&prefix_block(*addr, *len))
        })
}

/// The publicly routable address space: everything except special-purpose ranges
#[must_use]
pub fn public_internet_block() -> IpBlock {
    const SPECIAL: [([u8; 4], u8); 13] = [
        ([10, 0, 0, 0], 8),
        ([100, 64, 0, 0], 10),
        ([127, 0, 0, 0], 8),
        ([169, 254, 0, 0], 16),
        ([172, 16, 0, 0], 12),
        ([192, 0, 0, 0], 24),
        ([192, 0, 2, 0], 24),
        ([192, 88, 99, 0], 24),
        ([192, 168, 0, 0], 16),
        ([198, 18, 0, 0], 15),
        ([198, 51, 100, 0], 24),
        ([203, 0, 113, 0], 24),
        ([224, 0, 0, 0], 3),
    ];
    SPECIAL.iter().fold(IpBlock::cidr_all(), |acc, (addr, len)| {
        acc.subtract(&prefix_block(*addr, *len))
    })
}

fn prefix_block(addr: [u8; 4], len: u8) -> IpBlock {
    let base = i64::from(u32::from(Ipv4Addr::from(addr)));
    let host_bits = 32 - u32::from(len.min(32));
    let size = 1_i64 << host_bits;
    let first = base & !(size - 1);
    IpBlock(IntervalSet::from_interval(
        Interval::point(first).span_to(first + size - 1),
    ))
}
