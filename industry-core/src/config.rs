//! Cache configuration types
//!
//! Configuration arrives untyped (a TOML `[cache]` table or `INDUSTRY_CACHE_*`
//! environment variables) as [`RawCacheConfig`] and is validated into a
//! [`CacheConfig`]. Only a validated `CacheConfig` reaches the store or the
//! orchestrator.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default directory for the LMDB environment.
pub const DEFAULT_STORAGE_PATH: &str = "industry_cache";

/// Default LMDB map size in megabytes.
pub const DEFAULT_MAP_SIZE_MB: usize = 256;

/// Default ceiling on generator calls during one lazy-load top-up.
pub const DEFAULT_MAX_TOP_UP_ROUNDS: u32 = 32;

// ============================================================================
// CACHE STRATEGY
// ============================================================================

/// Refill strategy applied when the cache holds fewer items than requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Once anything is cached, never generate more. Short results are returned as-is.
    #[default]
    Recycle,
    /// Generate the shortfall on demand, optionally up to `lazy_load_until`.
    LazyLoad,
}

impl CacheStrategy {
    /// Configuration string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Recycle => "recycle",
            CacheStrategy::LazyLoad => "lazy_load",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "recycle" => Ok(CacheStrategy::Recycle),
            "lazy_load" => Ok(CacheStrategy::LazyLoad),
            _ => Err(ConfigError::InvalidStrategy {
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// VALIDATED CONFIG
// ============================================================================

/// Validated cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// When false, callers bypass the store and always generate.
    pub enabled: bool,
    pub strategy: CacheStrategy,
    /// Ceiling on stored items for lazy-load top-ups. `None` means "up to `count`".
    pub lazy_load_until: Option<u64>,
    /// Directory holding the LMDB environment. Created if absent.
    pub storage_path: PathBuf,
    pub map_size_mb: usize,
    /// Maximum generator calls per top-up. `None` loops until satisfied.
    pub max_top_up_rounds: Option<u32>,
    /// How long a per-fingerprint generation claim stays valid.
    pub claim_lease: Duration,
    /// How often a waiting caller re-checks a held claim.
    pub claim_poll_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: CacheStrategy::Recycle,
            lazy_load_until: None,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            max_top_up_rounds: Some(DEFAULT_MAX_TOP_UP_ROUNDS),
            claim_lease: Duration::from_secs(120),
            claim_poll_interval: Duration::from_millis(25),
        }
    }
}

impl CacheConfig {
    /// Build a config from a strategy name and an optional limit.
    ///
    /// This is the narrow constructor mirroring the `cache.strategy` /
    /// `cache.lazy_load_until` pair; everything else takes its default.
    pub fn new(strategy: &str, lazy_load_until: Option<i64>) -> Result<Self, ConfigError> {
        let strategy = strategy.parse()?;
        let lazy_load_until = lazy_load_until
            .map(|limit| {
                u64::try_from(limit).map_err(|_| ConfigError::InvalidLazyLoadUntil {
                    value: limit.to_string(),
                })
            })
            .transpose()?;

        let config = Self {
            strategy,
            lazy_load_until,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the strategy.
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the lazy-load ceiling.
    pub fn with_lazy_load_until(mut self, limit: Option<u64>) -> Self {
        self.lazy_load_until = limit;
        self
    }

    /// Set the storage directory.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the top-up round ceiling.
    pub fn with_max_top_up_rounds(mut self, rounds: Option<u32>) -> Self {
        self.max_top_up_rounds = rounds;
        self
    }

    /// Set the claim lease and poll interval.
    pub fn with_claim_timing(mut self, lease: Duration, poll_interval: Duration) -> Self {
        self.claim_lease = lease;
        self.claim_poll_interval = poll_interval;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - map_size_mb > 0
    /// - max_top_up_rounds is not Some(0)
    /// - claim_lease and claim_poll_interval are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.max_top_up_rounds == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_top_up_rounds".to_string(),
                value: "0".to_string(),
                reason: "must allow at least one round".to_string(),
            });
        }

        if self.claim_lease.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "claim_lease".to_string(),
                value: format!("{:?}", self.claim_lease),
                reason: "must be positive".to_string(),
            });
        }

        if self.claim_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "claim_poll_interval".to_string(),
                value: format!("{:?}", self.claim_poll_interval),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// RAW CONFIG
// ============================================================================

/// Untyped cache configuration as it appears in a file or the environment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawCacheConfig {
    pub enabled: Option<bool>,
    pub strategy: Option<String>,
    /// Kept as a raw TOML value so that non-integer input can be reported.
    pub lazy_load_until: Option<toml::Value>,
    pub storage_path: Option<PathBuf>,
    pub map_size_mb: Option<usize>,
    pub max_top_up_rounds: Option<u32>,
    pub unbounded_top_up: Option<bool>,
    pub claim_lease_ms: Option<u64>,
    pub claim_poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    cache: RawCacheConfig,
}

impl RawCacheConfig {
    /// Parse the `[cache]` table of a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: RawConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        Ok(file.cache)
    }

    /// Read the cache configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INDUSTRY_CACHE_ENABLED`: true/false, 1/0, yes/no or on/off (default: true)
    /// - `INDUSTRY_CACHE_STRATEGY`: "recycle" or "lazy_load" (default: recycle)
    /// - `INDUSTRY_CACHE_LAZY_LOAD_UNTIL`: non-negative integer (default: unset)
    /// - `INDUSTRY_CACHE_STORAGE_PATH`: LMDB directory (default: industry_cache)
    /// - `INDUSTRY_CACHE_MAP_SIZE_MB`: LMDB map size (default: 256)
    /// - `INDUSTRY_CACHE_MAX_TOP_UP_ROUNDS`: integer, or "unbounded" (default: 32)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the cache configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let enabled = get("INDUSTRY_CACHE_ENABLED")
            .map(|s| match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    field: "enabled".to_string(),
                    value: s.clone(),
                    reason: "must be a boolean".to_string(),
                }),
            })
            .transpose()?;

        let lazy_load_until = get("INDUSTRY_CACHE_LAZY_LOAD_UNTIL").map(|s| match s.parse::<i64>() {
            Ok(n) => toml::Value::Integer(n),
            Err(_) => toml::Value::String(s),
        });

        let map_size_mb = get("INDUSTRY_CACHE_MAP_SIZE_MB")
            .map(|s| {
                s.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                    field: "map_size_mb".to_string(),
                    value: s.clone(),
                    reason: "must be a positive integer".to_string(),
                })
            })
            .transpose()?;

        let (max_top_up_rounds, unbounded_top_up) = match get("INDUSTRY_CACHE_MAX_TOP_UP_ROUNDS") {
            None => (None, None),
            Some(s) if s.eq_ignore_ascii_case("unbounded") => (None, Some(true)),
            Some(s) => {
                let rounds = s.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                    field: "max_top_up_rounds".to_string(),
                    value: s.clone(),
                    reason: "must be a positive integer or \"unbounded\"".to_string(),
                })?;
                (Some(rounds), Some(false))
            }
        };

        Ok(Self {
            enabled,
            strategy: get("INDUSTRY_CACHE_STRATEGY"),
            lazy_load_until,
            storage_path: get("INDUSTRY_CACHE_STORAGE_PATH").map(PathBuf::from),
            map_size_mb,
            max_top_up_rounds,
            unbounded_top_up,
            claim_lease_ms: None,
            claim_poll_interval_ms: None,
        })
    }

    /// Layer `top` over `self`; values set in `top` win.
    ///
    /// `max_top_up_rounds` and `unbounded_top_up` travel as a pair: a layer
    /// that sets either one replaces both.
    pub fn overlay(self, top: RawCacheConfig) -> RawCacheConfig {
        let (max_top_up_rounds, unbounded_top_up) =
            if top.max_top_up_rounds.is_some() || top.unbounded_top_up.is_some() {
                (top.max_top_up_rounds, top.unbounded_top_up)
            } else {
                (self.max_top_up_rounds, self.unbounded_top_up)
            };

        RawCacheConfig {
            enabled: top.enabled.or(self.enabled),
            strategy: top.strategy.or(self.strategy),
            lazy_load_until: top.lazy_load_until.or(self.lazy_load_until),
            storage_path: top.storage_path.or(self.storage_path),
            map_size_mb: top.map_size_mb.or(self.map_size_mb),
            max_top_up_rounds,
            unbounded_top_up,
            claim_lease_ms: top.claim_lease_ms.or(self.claim_lease_ms),
            claim_poll_interval_ms: top.claim_poll_interval_ms.or(self.claim_poll_interval_ms),
        }
    }

    /// Validate into a typed [`CacheConfig`].
    pub fn into_config(self) -> Result<CacheConfig, ConfigError> {
        let defaults = CacheConfig::default();

        let strategy = match self.strategy {
            Some(s) => s.parse()?,
            None => defaults.strategy,
        };

        let lazy_load_until = match self.lazy_load_until {
            None => None,
            Some(toml::Value::Integer(n)) if n >= 0 => Some(n as u64),
            Some(other) => {
                return Err(ConfigError::InvalidLazyLoadUntil {
                    value: other.to_string(),
                })
            }
        };

        let max_top_up_rounds = if self.unbounded_top_up.unwrap_or(false) {
            None
        } else {
            self.max_top_up_rounds
                .map(Some)
                .unwrap_or(defaults.max_top_up_rounds)
        };

        let config = CacheConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            strategy,
            lazy_load_until,
            storage_path: self.storage_path.unwrap_or(defaults.storage_path),
            map_size_mb: self.map_size_mb.unwrap_or(defaults.map_size_mb),
            max_top_up_rounds,
            claim_lease: self
                .claim_lease_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.claim_lease),
            claim_poll_interval: self
                .claim_poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.claim_poll_interval),
        };

        config.validate()?;
        Ok(config)
    }
}
