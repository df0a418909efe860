// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures.
//! Any failure of [`crate::build_configs`] is a `ConfigError`. Variants carry the
//! path of the offending object, e.g. `VPC vpc-1/Subnet web/Rule index 3`.

use acl::AclError;
use lpm::IpBlockError;
use routing::RoutingError;
use thiserror::Error;

/// The reasons why we may reject a configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{context}: reference to unknown {kind} '{reference}'")]
    DanglingReference {
        context: String,
        kind: &'static str,
        reference: String,
    },
    #[error("{0}: network interface has no primary IP")]
    MissingPrimaryIp(String),
    #[error("{0}: placeholder address 0.0.0.0")]
    PlaceholderAddress(String),
    #[error("{context}: unsupported rule: {reason}")]
    UnsupportedRule { context: String, reason: String },
    #[error("Duplicate uid '{0}'")]
    DuplicateUid(String),
    #[error("{context}: address {address} is outside subnet {subnet}")]
    AddressOutsideSubnet {
        context: String,
        address: String,
        subnet: String,
    },
    #[error("{context}: {source}")]
    InvalidAddress {
        context: String,
        #[source]
        source: IpBlockError,
    },
    #[error("{context}: {source}")]
    Routing {
        context: String,
        #[source]
        source: RoutingError,
    },
    #[error("VPC {0}: more than one ingress routing table")]
    DuplicateIngressTable(String),
    #[error(transparent)]
    Acl(#[from] AclError),
}

/// Result-like type for configurations
pub type ConfigResult<T = ()> = Result<T, ConfigError>;

#[must_use]
pub fn stringify<T>(conf_result: &ConfigResult<T>) -> String {
    match conf_result {
        Ok(_) => "Ok".to_string(),
        Err(e) => format!("FAILED: {e}"),
    }
}

/// Attach `context` to a failed address parse
pub(crate) fn address<T>(context: &str, result: Result<T, IpBlockError>) -> ConfigResult<T> {
    result.map_err(|source| ConfigError::InvalidAddress {
        context: context.to_string(),
        source,
    })
}
