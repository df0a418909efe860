// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("Security group {group}: rule {index} references unknown security group '{remote}'")]
    UnknownSecurityGroup {
        group: String,
        index: usize,
        remote: String,
    },
}
