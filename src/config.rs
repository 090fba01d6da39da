use crate::data::{DEFAULT_MAX_LEAVES, DEFAULT_TIME_LIMIT_MS, SearchBudget};
use std::net::SocketAddr;
use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "TIMETABLE_BIND_ADDR";
pub const TIME_LIMIT_VAR: &str = "TIMETABLE_TIME_LIMIT_MS";
pub const MAX_LEAVES_VAR: &str = "TIMETABLE_MAX_LEAVES";
pub const PARALLEL_VAR: &str = "TIMETABLE_PARALLEL";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Server settings, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound for any request's time limit.
    pub time_limit_ms: u64,
    /// Upper bound for any request's leaf cap.
    pub max_leaves: usize,
    pub parallel: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            max_leaves: DEFAULT_MAX_LEAVES,
            parallel: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parse_var(&lookup, BIND_ADDR_VAR, |v| v.parse().ok())?
                .unwrap_or(defaults.bind_addr),
            time_limit_ms: parse_var(&lookup, TIME_LIMIT_VAR, |v| v.parse().ok())?
                .unwrap_or(defaults.time_limit_ms),
            max_leaves: parse_var(&lookup, MAX_LEAVES_VAR, |v| v.parse().ok())?
                .unwrap_or(defaults.max_leaves),
            parallel: parse_var(&lookup, PARALLEL_VAR, parse_bool)?.unwrap_or(defaults.parallel),
        })
    }

    pub fn default_budget(&self) -> SearchBudget {
        SearchBudget {
            time_limit_ms: self.time_limit_ms,
            max_leaves: self.max_leaves,
            max_nodes: None,
            parallel: self.parallel,
        }
    }

    /// The request's budget capped by the configured limits, or the default one.
    pub fn effective_budget(&self, requested: Option<SearchBudget>) -> SearchBudget {
        match requested {
            Some(budget) => SearchBudget {
                time_limit_ms: budget.time_limit_ms.min(self.time_limit_ms),
                max_leaves: budget.max_leaves.min(self.max_leaves),
                ..budget
            },
            None => self.default_budget(),
        }
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => parse(value.trim())
            .map(Some)
            .ok_or(ConfigError::Invalid { key, value }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
