// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Static routes

use crate::errors::RoutingError;
use lpm::IpBlock;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lowest route priority value; 0 is the highest priority
pub const MAX_PRIORITY: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    Deliver,
    Delegate,
    Drop,
    DelegateVpc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub name: String,
    pub destination: IpBlock,
    pub prefix_length: u8,
    pub priority: u8,
    pub action: RouteAction,
    pub next_hop: Option<IpBlock>,
    pub zone: Option<String>,
    pub advertise: bool,
}

impl Route {
    /// Build a route towards `destination`, which must be a single CIDR.
    /// A next hop is required by, and only allowed with, [`RouteAction::Deliver`].
    pub fn new(
        name: &str,
        destination: &str,
        action: RouteAction,
        next_hop: Option<&str>,
        priority: u8,
    ) -> Result<Self, RoutingError> {
        let destination = IpBlock::from_cidr(destination)?;
        let prefix_length = destination.prefix_length()?;
        if priority > MAX_PRIORITY {
            return Err(RoutingError::InvalidPriority {
                route: name.to_string(),
                priority,
            });
        }
        let next_hop = match (action, next_hop) {
            (RouteAction::Deliver, None) => {
                return Err(RoutingError::MissingNextHop(name.to_string()));
            }
            (RouteAction::Deliver, Some(hop)) => Some(IpBlock::from_address(hop)?),
            (_, Some(_)) => return Err(RoutingError::UnexpectedNextHop(name.to_string())),
            (_, None) => None,
        };
        Ok(Self {
            name: name.to_string(),
            destination,
            prefix_length,
            priority,
            action,
            next_hop,
            zone: None,
            advertise: false,
        })
    }
    #[must_use]
    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone = Some(zone.to_string());
        self
    }
    #[must_use]
    pub fn with_advertise(mut self, advertise: bool) -> Self {
        self.advertise = advertise;
        self
    }
}

impl Display for RouteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteAction::Deliver => write!(f, "deliver"),
            RouteAction::Delegate => write!(f, "delegate"),
            RouteAction::Drop => write!(f, "drop"),
            RouteAction::DelegateVpc => write!(f, "delegate_vpc"),
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} {} prio {}",
            self.name, self.destination, self.action, self.priority
        )?;
        if let Some(hop) = &self.next_hop {
            write!(f, " via {hop}")?;
        }
        if let Some(zone) = &self.zone {
            write!(f, " zone {zone}")?;
        }
        if self.advertise {
            write!(f, " (advertised)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_validation() {
        let route = Route::new("r1", "10.1.0.0/16", RouteAction::Deliver, Some("10.0.0.4"), 2)
            .expect("Valid route");
        assert_eq!(route.prefix_length, 16);
        assert_eq!(route.next_hop, Some("10.0.0.4".parse().expect("ok")));
        assert_eq!(route.to_string(), "r1: 10.1.0.0/16 deliver prio 2 via 10.0.0.4/32");

        assert_eq!(
            Route::new("r2", "10.1.0.0/16", RouteAction::Deliver, None, 2),
            Err(RoutingError::MissingNextHop("r2".to_string()))
        );
        assert_eq!(
            Route::new("r3", "10.1.0.0/16", RouteAction::Drop, Some("10.0.0.4"), 2),
            Err(RoutingError::UnexpectedNextHop("r3".to_string()))
        );
        assert!(matches!(
            Route::new("r4", "10.1.0.0/16", RouteAction::Drop, None, 5),
            Err(RoutingError::InvalidPriority { priority: 5, .. })
        ));
        assert!(matches!(
            Route::new("r5", "10.1.0/16", RouteAction::Drop, None, 0),
            Err(RoutingError::Parse(_))
        ));
    }
}
