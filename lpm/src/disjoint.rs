// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Disjoint decomposition of collections of IP blocks.

use crate::ipblock::IpBlock;
use tracing::debug;

/// Refine a disjoint partition with one more block. Every partition member that
/// overlaps `block` is split into its intersection with `block` and the leftover;
/// whatever part of `block` is not covered by the partition is appended as one
/// member, however many runs it spans.
fn add_block_to_partition(partition: &mut Vec<IpBlock>, block: &IpBlock) {
    let mut remaining = block.clone();
    let mut refined = Vec::with_capacity(partition.len() + 1);
    for member in partition.drain(..) {
        let common = member.intersection(block);
        if common.is_empty() {
            refined.push(member);
            continue;
        }
        let leftover = member.subtract(&common);
        remaining = remaining.subtract(&common);
        refined.push(common);
        if !leftover.is_empty() {
            refined.push(leftover);
        }
    }
    if !remaining.is_empty() {
        refined.push(remaining);
    }
    *partition = refined;
}

/// Compute the coarsest partition of the union of `first` and `second` such that
/// every output block is either fully inside or fully outside each input block.
/// Two addresses share a block exactly when they belong to the same inputs, so
/// blocks need not be contiguous.
/// Inputs are processed from smallest to largest; the sort is stable, so the output
/// does not depend on the relative order of equally sized inputs in a list.
/// If all inputs are empty the result is the whole address space.
#[must_use]
pub fn disjoint_ip_blocks(first: &[IpBlock], second: &[IpBlock]) -> Vec<IpBlock> {
    let mut blocks: Vec<&IpBlock> = first
        .iter()
        .chain(second.iter())
        .filter(|b| !b.is_empty())
        .collect();
    blocks.sort_by_key(|b| b.size());

    let mut partition = Vec::new();
    for block in blocks {
        add_block_to_partition(&mut partition, block);
    }
    if partition.is_empty() {
        partition.push(IpBlock::cidr_all());
    }
    debug!(
        "Disjoint decomposition of {} blocks yields {} parts",
        first.len() + second.len(),
        partition.len()
    );
    partition
}
