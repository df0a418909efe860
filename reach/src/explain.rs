// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Explain what may flow between two queried endpoints, and why.
//!
//! A query names an internal endpoint (by uid, name or owner), an internal
//! address, or an external address block. External blocks are split along the
//! external endpoints they overlap, and each part is explained on its own.

use crate::endpoint::Endpoint;
use crate::errors::{QueryError, ReachResult};
use crate::flow::{BlockedBy, FilterTrace, FlowAnalyzer};
use crate::params::AnalysisParams;
use config::MultipleVpcConfigs;
use connset::{ConnectionSet, StatefulState, stateful_reflect};
use lpm::IpBlock;
use routing::Path;
use serde::Serialize;
use tracing::debug;

/// The analysis of one (src, dst) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub path: Option<Path>,
    pub egress: Vec<FilterTrace>,
    pub ingress: Vec<FilterTrace>,
    /// what may flow from `src` to `dst`, within the queried connections
    pub connection: ConnectionSet,
    pub stateful: StatefulState,
    pub blocked_by: BlockedBy,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationTree {
    pub src_query: String,
    pub dst_query: String,
    pub filter: Option<ConnectionSet>,
    pub explanations: Vec<Explanation>,
}

impl ExplanationTree {
    /// Whether some of the queried connections may flow for some resolved pair
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.explanations.iter().any(|e| !e.connection.is_empty())
    }
}

fn single(query: &str, found: Vec<Endpoint>) -> Result<Vec<Endpoint>, QueryError> {
    match found.len() {
        0 => Err(QueryError::NotFound(query.to_string())),
        1 => Ok(found),
        _ => Err(QueryError::Ambiguous {
            query: query.to_string(),
            candidates: found.iter().map(|e| e.name.clone()).collect(),
        }),
    }
}

/// Find the endpoints a query refers to
pub fn resolve(config: &MultipleVpcConfigs, query: &str) -> Result<Vec<Endpoint>, QueryError> {
    let by_name: Vec<Endpoint> = config
        .internal_nodes()
        .map(Endpoint::from_node)
        .filter(|e| {
            e.uid == query
                || e.name == query
                || config
                    .node(&e.uid)
                    .is_some_and(|n| n.name == query || n.owner.as_deref() == Some(query))
        })
        .collect();
    if !by_name.is_empty() {
        return single(query, by_name);
    }

    let Ok(block) = query.parse::<IpBlock>() else {
        return Err(QueryError::NotFound(query.to_string()));
    };
    let internal: Vec<Endpoint> = config
        .internal_nodes()
        .filter(|n| n.address.overlaps(&block))
        .map(Endpoint::from_node)
        .collect();
    if !internal.is_empty() {
        return single(query, internal);
    }

    let external: Vec<Endpoint> = config
        .external_nodes()
        .filter(|n| n.address.overlaps(&block))
        .map(|n| Endpoint::from_node(n).restricted_to(&block))
        .collect();
    if external.is_empty() {
        return Err(QueryError::NotFound(query.to_string()));
    }
    Ok(external)
}

/// Explain the connections from `src` to `dst`, optionally restricted to `filter`
pub fn explain(
    config: &MultipleVpcConfigs,
    params: &AnalysisParams,
    src: &str,
    dst: &str,
    filter: Option<&ConnectionSet>,
) -> ReachResult<ExplanationTree> {
    if let Some(filter) = filter
        && filter.is_empty()
    {
        return Err(QueryError::InvalidConnectionFilter(filter.to_string()).into());
    }
    let query = filter.cloned().unwrap_or_else(ConnectionSet::all);
    let sources = resolve(config, src)?;
    let destinations = resolve(config, dst)?;
    let analyzer = FlowAnalyzer::new(config, *params);

    let mut explanations = Vec::new();
    for s in &sources {
        for d in &destinations {
            if s.uid == d.uid || (!s.is_internal() && !d.is_internal()) {
                continue;
            }
            let forward = analyzer.flow(s, d);
            let reverse = analyzer.flow(d, s);
            // as in `connectivity`, responses only face the reverse filters
            let (connection, stateful) =
                stateful_reflect(&forward.raw.intersection(&query), &reverse.filtered);
            let blocked_by = forward.blocked_by(&query);
            debug!("Explained {s} => {d}: {connection} (blocked by {blocked_by})");
            explanations.push(Explanation {
                src: s.clone(),
                dst: d.clone(),
                path: forward.path,
                egress: forward.egress,
                ingress: forward.ingress,
                connection,
                stateful,
                blocked_by,
                note: forward.note,
            });
        }
    }
    if explanations.is_empty() {
        return Err(QueryError::NoInternalEndpoint {
            src: src.to_string(),
            dst: dst.to_string(),
        }
        .into());
    }
    Ok(ExplanationTree {
        src_query: src.to_string(),
        dst_query: dst.to_string(),
        filter: filter.cloned(),
        explanations,
    })
}
