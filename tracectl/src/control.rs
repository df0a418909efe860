// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing configuration: per-target levels, tag-based overrides and subscriber setup.

use ordermap::OrderMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::LevelFilter;
use crate::targets::TRACING_TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

#[derive(Debug, Error, PartialEq)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': expected tag=level")]
    InvalidSyntax(String),
    #[error("Invalid level '{level}' for '{tag}'")]
    InvalidLevel { tag: String, level: String },
    #[error("Invalid filter directive '{0}'")]
    InvalidDirective(String),
    #[error("Tracing subscriber could not be installed: {0}")]
    AlreadyInitialized(String),
}

/// Configuration of a single registered target
#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}
impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        // a target can always be addressed by its own name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

/// The set of tracing targets known at link time, with their current levels
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    pub(crate) default: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
}

impl TargetRegistry {
    /// Build a registry from the targets collected at link time
    #[must_use]
    pub fn from_static(default: LevelFilter) -> Self {
        let mut registry = Self {
            default,
            targets: OrderMap::new(),
        };
        for target in TRACING_TARGETS {
            registry.targets.insert(
                target.target,
                TargetCfg::new(target.target, target.name, target.level, target.tags),
            );
        }
        registry
    }
    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.default
    }
    pub fn targets(&self) -> impl Iterator<Item = &TargetCfg> {
        self.targets.values()
    }
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&TargetCfg> {
        self.targets.get(target)
    }
    /// Targets that carry `tag` (including the targets named `tag`)
    pub fn tagged(&self, tag: &str) -> impl Iterator<Item = &TargetCfg> {
        self.targets.values().filter(move |t| t.tags.contains(&tag))
    }
    /// Set the level of every target carrying `tag`. Returns the number of targets changed.
    pub fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> usize {
        let mut changed = 0;
        for target in self.targets.values_mut() {
            if target.tags.contains(&tag) && target.level != level {
                target.level = level;
                changed += 1;
            }
        }
        changed
    }

    /// Parse a string made of comma-separated tag=level items, where level is one
    /// of off, error, warn, info, debug or trace.
    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
        let mut result = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((tag, level)) = item.split_once('=') else {
                return Err(TraceCtlError::InvalidSyntax(item.to_string()));
            };
            let level =
                LevelFilter::from_str(level.trim()).map_err(|_| TraceCtlError::InvalidLevel {
                    tag: tag.trim().to_string(),
                    level: level.trim().to_string(),
                })?;
            result.insert(tag.trim().to_string(), level);
        }
        Ok(result)
    }

    /// Apply a configuration string. `default=<level>` sets the level of events from
    /// unregistered targets; `all=<level>` sets every registered target; any other
    /// key is a tag. Tags are applied after `all`, so `all=warn,reach=debug` works.
    pub fn apply_config(&mut self, input: &str) -> Result<(), TraceCtlError> {
        let config = Self::parse_config(input)?;
        if let Some(level) = config.get("default") {
            self.default = *level;
        }
        if let Some(level) = config.get("all") {
            for target in self.targets.values_mut() {
                target.level = *level;
            }
        }
        for (tag, level) in config.iter().filter(|(k, _)| *k != "default" && *k != "all") {
            let changed = self.set_tag_level(tag, *level);
            debug!("Set level {level} for tag '{tag}': {changed} targets changed");
        }
        Ok(())
    }

    /// Build the `EnvFilter` equivalent to the current registry state
    pub fn env_filter(&self) -> Result<EnvFilter, TraceCtlError> {
        let mut filter = EnvFilter::new(self.default.to_string());
        for target in self.targets.values() {
            let directive = format!("{}={}", target.target, target.level);
            let parsed = directive
                .parse()
                .map_err(|_| TraceCtlError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    /// Render the registry as a configuration string accepted by [`Self::apply_config`]
    #[must_use]
    pub fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.default);
        for target in self.targets.values() {
            out += format!(",{}={}", target.name, target.level).as_str();
        }
        out
    }
}

/// Install a global `fmt` subscriber. `RUST_LOG` takes precedence; otherwise the
/// filter is built from the link-time registry, adjusted by `config` if given.
pub fn init_tracing(default: LevelFilter, config: Option<&str>) -> Result<(), TraceCtlError> {
    let mut registry = TargetRegistry::from_static(default);
    if let Some(config) = config {
        registry.apply_config(config)?;
    }
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => registry.env_filter()?,
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(true)
        .with_thread_names(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TraceCtlError::AlreadyInitialized(e.to_string()))?;
    debug!("Tracing initialized: {}", registry.as_config_string());
    Ok(())
}
