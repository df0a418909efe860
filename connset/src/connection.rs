// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Connection sets: five-dimensional hypercube sets over protocol, source port,
//! destination port, ICMP type and ICMP code, with an `all` short-circuit.

use crate::errors::AnalysisError;
use crate::hypercube::HypercubeSet;
use crate::stateful::StatefulState;
use lpm::IntervalSet;
use serde::{Serialize, Serializer};
use std::fmt::Display;

pub const MIN_PORT: i64 = 1;
pub const MAX_PORT: i64 = 65535;
pub const MIN_ICMP_TYPE: i64 = 0;
pub const MAX_ICMP_TYPE: i64 = 255;
pub const MIN_ICMP_CODE: i64 = 0;
pub const MAX_ICMP_CODE: i64 = 254;

const DIMENSIONS: usize = 5;
const PROTOCOL_AXIS: usize = 0;
const SRC_PORT_AXIS: usize = 1;
const DST_PORT_AXIS: usize = 2;
const ICMP_TYPE_AXIS: usize = 3;
const ICMP_CODE_AXIS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp = 0,
    Udp = 1,
    Icmp = 2,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Icmp];

    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn domain(axis: usize) -> IntervalSet {
    match axis {
        PROTOCOL_AXIS => IntervalSet::from_bounds(Protocol::Tcp.code(), Protocol::Icmp.code()),
        SRC_PORT_AXIS | DST_PORT_AXIS => IntervalSet::from_bounds(MIN_PORT, MAX_PORT),
        ICMP_TYPE_AXIS => IntervalSet::from_bounds(MIN_ICMP_TYPE, MAX_ICMP_TYPE),
        ICMP_CODE_AXIS => IntervalSet::from_bounds(MIN_ICMP_CODE, MAX_ICMP_CODE),
        _ => IntervalSet::new(),
    }
}

fn full_axes() -> Vec<IntervalSet> {
    (0..DIMENSIONS).map(domain).collect()
}

fn full_cube() -> HypercubeSet {
    HypercubeSet::from_cube(&full_axes())
}

fn protocols_in(axis: &IntervalSet) -> Vec<Protocol> {
    Protocol::ALL
        .into_iter()
        .filter(|p| axis.contains(p.code()))
        .collect()
}

/// A set of connections. The `all` form carries an empty cube; any producer whose
/// cube would equal the full domain product switches to it. The stateful tag is
/// an annotation and does not take part in equality.
#[derive(Debug, Clone)]
pub struct ConnectionSet {
    allow_all: bool,
    cube: HypercubeSet,
    stateful: StatefulState,
}

impl PartialEq for ConnectionSet {
    fn eq(&self, other: &Self) -> bool {
        self.allow_all == other.allow_all && self.cube == other.cube
    }
}
impl Eq for ConnectionSet {}

/// Serialized as its sorted list of [`ConnectionItem`]s
impl Serialize for ConnectionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_items().serialize(serializer)
    }
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// One printable/serializable component of a connection set. `None` means the
/// whole domain of that field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConnectionItem {
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<String>,
}

impl ConnectionSet {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allow_all: false,
            cube: HypercubeSet::new(DIMENSIONS),
            stateful: StatefulState::Unknown,
        }
    }
    #[must_use]
    pub fn all() -> Self {
        Self {
            allow_all: true,
            cube: HypercubeSet::new(DIMENSIONS),
            stateful: StatefulState::Unknown,
        }
    }
    fn from_hypercube(cube: HypercubeSet) -> Self {
        if cube == full_cube() {
            Self::all()
        } else {
            Self {
                allow_all: false,
                cube,
                stateful: StatefulState::Unknown,
            }
        }
    }
    /// Build the set of a single cube, one interval set per axis. Axes are clipped
    /// to their domains.
    pub fn from_cube(cube: &[IntervalSet]) -> Result<Self, AnalysisError> {
        if cube.len() != DIMENSIONS {
            return Err(AnalysisError::InvalidCube(format!(
                "expected {DIMENSIONS} axes, got {}",
                cube.len()
            )));
        }
        let clipped: Vec<IntervalSet> = cube
            .iter()
            .enumerate()
            .map(|(axis, values)| values.intersection(&domain(axis)))
            .collect();
        Ok(Self::from_hypercube(HypercubeSet::from_cube(&clipped)))
    }
    /// All connections of one protocol
    #[must_use]
    pub fn protocol(protocol: Protocol) -> Self {
        let mut axes = full_axes();
        axes[PROTOCOL_AXIS] = IntervalSet::from_bounds(protocol.code(), protocol.code());
        Self::from_hypercube(HypercubeSet::from_cube(&axes))
    }
    #[must_use]
    pub fn tcp_all() -> Self {
        Self::protocol(Protocol::Tcp)
    }
    /// TCP or UDP connections within the given port ranges. Ranges are clipped to
    /// `[1, 65535]`; an inverted range yields the empty set.
    pub fn tcp_or_udp(
        protocol: Protocol,
        src_min: i64,
        src_max: i64,
        dst_min: i64,
        dst_max: i64,
    ) -> Result<Self, AnalysisError> {
        if protocol == Protocol::Icmp {
            return Err(AnalysisError::InvalidCube(
                "port ranges do not apply to ICMP".to_string(),
            ));
        }
        let mut axes = full_axes();
        axes[PROTOCOL_AXIS] = IntervalSet::from_bounds(protocol.code(), protocol.code());
        axes[SRC_PORT_AXIS] = IntervalSet::from_bounds(src_min, src_max);
        axes[DST_PORT_AXIS] = IntervalSet::from_bounds(dst_min, dst_max);
        Self::from_cube(&axes)
    }
    /// ICMP connections within the given type and code ranges
    #[must_use]
    pub fn icmp(type_min: i64, type_max: i64, code_min: i64, code_max: i64) -> Self {
        let mut axes = full_axes();
        axes[PROTOCOL_AXIS] =
            IntervalSet::from_bounds(Protocol::Icmp.code(), Protocol::Icmp.code());
        axes[ICMP_TYPE_AXIS] =
            IntervalSet::from_bounds(type_min, type_max).intersection(&domain(ICMP_TYPE_AXIS));
        axes[ICMP_CODE_AXIS] =
            IntervalSet::from_bounds(code_min, code_max).intersection(&domain(ICMP_CODE_AXIS));
        Self::from_hypercube(HypercubeSet::from_cube(&axes))
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.allow_all
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.allow_all && self.cube.is_empty()
    }
    #[must_use]
    pub fn stateful(&self) -> StatefulState {
        self.stateful
    }
    #[must_use]
    pub fn with_stateful(mut self, stateful: StatefulState) -> Self {
        self.stateful = stateful;
        self
    }
    fn materialized(&self) -> HypercubeSet {
        if self.allow_all {
            full_cube()
        } else {
            self.cube.clone()
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.allow_all || other.allow_all {
            return Self::all();
        }
        Self::from_hypercube(self.cube.union_unchecked(&other.cube))
    }
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        match (self.allow_all, other.allow_all) {
            (true, true) => Self::all(),
            (true, false) => other.clone().with_stateful(StatefulState::Unknown),
            (false, true) => self.clone().with_stateful(StatefulState::Unknown),
            (false, false) => Self::from_hypercube(self.cube.intersection_unchecked(&other.cube)),
        }
    }
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        if other.allow_all {
            return Self::empty();
        }
        if other.is_empty() {
            return self.clone().with_stateful(StatefulState::Unknown);
        }
        Self::from_hypercube(self.materialized().subtract_unchecked(&other.cube))
    }
    /// Tell if this set is contained in `other`
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        if other.allow_all {
            return true;
        }
        if self.allow_all {
            return false;
        }
        self.cube.is_subset_unchecked(&other.cube)
    }
    /// Tell if a single connection `(protocol, src port, dst port, icmp type, icmp code)`
    /// is in the set
    #[must_use]
    pub fn contains(&self, point: &[i64; DIMENSIONS]) -> bool {
        if self.allow_all {
            return full_cube().contains(point);
        }
        self.cube.contains(point)
    }

    /// The cubes of the set, each as five per-axis interval sets
    #[must_use]
    pub fn cubes(&self) -> Vec<Vec<IntervalSet>> {
        self.materialized().cubes()
    }

    /// The connection set seen from the responder: source and destination ports
    /// are swapped on every cube. Cubes whose two port axes are both the full range
    /// are kept as they are.
    #[must_use]
    pub fn response_connection(&self) -> Self {
        if self.allow_all || self.is_empty() {
            return self.clone();
        }
        let ports = domain(SRC_PORT_AXIS);
        let mut result = HypercubeSet::new(DIMENSIONS);
        for mut cube in self.cube.cubes() {
            if !(cube[SRC_PORT_AXIS] == ports && cube[DST_PORT_AXIS] == ports) {
                cube.swap(SRC_PORT_AXIS, DST_PORT_AXIS);
            }
            result = result.union_unchecked(&HypercubeSet::from_cube(&cube));
        }
        Self::from_hypercube(result)
    }

    /// Per-protocol items describing the set, sorted
    #[must_use]
    pub fn to_items(&self) -> Vec<ConnectionItem> {
        let full = full_axes();
        let restricted = |cube: &[IntervalSet], axis: usize| -> Option<String> {
            (cube[axis] != full[axis]).then(|| cube[axis].to_string())
        };
        let mut items = Vec::new();
        for cube in self.cubes() {
            for protocol in protocols_in(&cube[PROTOCOL_AXIS]) {
                let item = if protocol == Protocol::Icmp {
                    ConnectionItem {
                        protocol,
                        src_ports: None,
                        dst_ports: None,
                        icmp_type: restricted(&cube, ICMP_TYPE_AXIS),
                        icmp_code: restricted(&cube, ICMP_CODE_AXIS),
                    }
                } else {
                    ConnectionItem {
                        protocol,
                        src_ports: restricted(&cube, SRC_PORT_AXIS),
                        dst_ports: restricted(&cube, DST_PORT_AXIS),
                        icmp_type: None,
                        icmp_code: None,
                    }
                };
                items.push(item);
            }
        }
        items.sort();
        items
    }

    /// The display string, with a trailing ` *` when the set is known not to be
    /// fully stateful
    #[must_use]
    pub fn enhanced_string(&self) -> String {
        if self.stateful == StatefulState::NonStateful {
            format!("{self} *")
        } else {
            self.to_string()
        }
    }
}

fn cube_string(cube: &[IntervalSet]) -> String {
    let protocols = protocols_in(&cube[PROTOCOL_AXIS]);
    let names: Vec<&str> = protocols.iter().map(|p| p.name()).collect();
    let has_icmp = protocols.contains(&Protocol::Icmp);
    let has_ports = protocols.len() > usize::from(has_icmp);

    let mut out = format!("protocol: {}", names.join(","));
    if has_ports && !has_icmp {
        if cube[SRC_PORT_AXIS] != domain(SRC_PORT_AXIS) {
            out += &format!(" src-ports: {}", cube[SRC_PORT_AXIS]);
        }
        if cube[DST_PORT_AXIS] != domain(DST_PORT_AXIS) {
            out += &format!(" dst-ports: {}", cube[DST_PORT_AXIS]);
        }
    } else if has_icmp && !has_ports {
        let full_type = cube[ICMP_TYPE_AXIS] == domain(ICMP_TYPE_AXIS);
        let full_code = cube[ICMP_CODE_AXIS] == domain(ICMP_CODE_AXIS);
        if !full_type || !full_code {
            out += &format!(" icmp-type: {}", cube[ICMP_TYPE_AXIS]);
        }
        if !full_code {
            out += &format!(" icmp-code: {}", cube[ICMP_CODE_AXIS]);
        }
    }
    out
}

impl Display for ConnectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.allow_all {
            return write!(f, "All Connections");
        }
        if self.is_empty() {
            return write!(f, "No Connections");
        }
        let mut parts: Vec<String> = self.cube.cubes().iter().map(|c| cube_string(c)).collect();
        parts.sort();
        write!(f, "{}", parts.join("; "))
    }
}
