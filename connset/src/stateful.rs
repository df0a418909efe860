// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Stateful TCP reflection

use crate::connection::ConnectionSet;
use serde::Serialize;
use std::fmt::Display;

/// Whether every TCP connection of a set has a return path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatefulState {
    #[default]
    Unknown,
    Stateful,
    NonStateful,
}

impl Display for StatefulState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatefulState::Unknown => write!(f, "unknown"),
            StatefulState::Stateful => write!(f, "stateful"),
            StatefulState::NonStateful => write!(f, "non-stateful"),
        }
    }
}

/// Given the connections allowed from A to B (`forward`) and from B to A (`reverse`),
/// keep the TCP part of `forward` whose responses are allowed by `reverse`. UDP and
/// ICMP are kept as they are. The returned set carries the resulting tag.
#[must_use]
pub fn stateful_reflect(
    forward: &ConnectionSet,
    reverse: &ConnectionSet,
) -> (ConnectionSet, StatefulState) {
    let tcp = ConnectionSet::tcp_all();
    let forward_tcp = forward.intersection(&tcp);
    if forward_tcp.is_empty() {
        let state = StatefulState::Stateful;
        return (forward.clone().with_stateful(state), state);
    }
    let reverse_tcp = reverse.intersection(&tcp).response_connection();
    let stateful_tcp = forward_tcp.intersection(&reverse_tcp);
    let state = if stateful_tcp == forward_tcp {
        StatefulState::Stateful
    } else {
        StatefulState::NonStateful
    };
    let result = forward.subtract(&forward_tcp).union(&stateful_tcp);
    (result.with_stateful(state), state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Protocol;

    fn tcp(src: (i64, i64), dst: (i64, i64)) -> ConnectionSet {
        ConnectionSet::tcp_or_udp(Protocol::Tcp, src.0, src.1, dst.0, dst.1)
            .expect("TCP takes ports")
    }

    #[test]
    fn test_asymmetric_rules() {
        // forward to ports 80-100, responses only allowed from port 80
        let forward = tcp((1, 65535), (80, 100));
        let reverse = tcp((80, 80), (1, 65535));
        let (result, state) = stateful_reflect(&forward, &reverse);
        assert_eq!(state, StatefulState::NonStateful);
        assert_eq!(result, tcp((1, 65535), (80, 80)));
        assert_eq!(result.stateful(), StatefulState::NonStateful);
        assert_eq!(result.enhanced_string(), "protocol: TCP dst-ports: 80 *");
    }

    #[test]
    fn test_non_tcp_is_stateful() {
        let udp = ConnectionSet::protocol(Protocol::Udp);
        let (result, state) = stateful_reflect(&udp, &ConnectionSet::empty());
        assert_eq!(state, StatefulState::Stateful);
        assert_eq!(result, udp);

        let mixed = udp.union(&tcp((1, 65535), (22, 22)));
        let (result, state) = stateful_reflect(&mixed, &ConnectionSet::empty());
        assert_eq!(state, StatefulState::NonStateful);
        assert_eq!(result, udp);
    }

    #[test]
    fn test_reflecting_own_response_is_stateful() {
        let forward = tcp((1000, 2000), (443, 443)).union(&ConnectionSet::icmp(8, 8, 0, 254));
        let (result, state) = stateful_reflect(&forward, &forward.response_connection());
        assert_eq!(state, StatefulState::Stateful);
        assert_eq!(result, forward);

        let (result, state) = stateful_reflect(&ConnectionSet::all(), &ConnectionSet::all());
        assert_eq!(state, StatefulState::Stateful);
        assert!(result.is_all());
    }
}
