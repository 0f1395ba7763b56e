//! Ledger configuration loaded from environment variables.

use inventory_store::ReleasePolicy;
use serde::{Deserialize, Serialize};

/// Default low-stock threshold.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Ledger behaviour switches.
///
/// Reads from environment variables:
/// - `INVENTORY_RELEASE_POLICY`: `lenient` or `strict` (default: `lenient`)
/// - `INVENTORY_LOW_STOCK_THRESHOLD`: stock level below which an alert is sent (default: `5`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub release_policy: ReleasePolicy,
    pub low_stock_threshold: i64,
}

impl LedgerConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let release_policy = match lookup("INVENTORY_RELEASE_POLICY") {
            Some(value) => parse_release_policy(&value).unwrap_or_else(|| {
                tracing::warn!(%value, "unknown INVENTORY_RELEASE_POLICY, using lenient");
                defaults.release_policy
            }),
            None => defaults.release_policy,
        };

        let low_stock_threshold = match lookup("INVENTORY_LOW_STOCK_THRESHOLD") {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(%value, "invalid INVENTORY_LOW_STOCK_THRESHOLD, using default");
                defaults.low_stock_threshold
            }),
            None => defaults.low_stock_threshold,
        };

        Self {
            release_policy,
            low_stock_threshold,
        }
    }

    pub fn with_release_policy(mut self, release_policy: ReleasePolicy) -> Self {
        self.release_policy = release_policy;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::Lenient,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

fn parse_release_policy(value: &str) -> Option<ReleasePolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lenient" => Some(ReleasePolicy::Lenient),
        "strict" => Some(ReleasePolicy::Strict),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = LedgerConfig::default();
        assert_eq!(config.release_policy, ReleasePolicy::Lenient);
        assert_eq!(config.low_stock_threshold, 5);
    }

    #[test]
    fn test_reads_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("INVENTORY_RELEASE_POLICY", "Strict"),
            ("INVENTORY_LOW_STOCK_THRESHOLD", "12"),
        ]));
        assert_eq!(config.release_policy, ReleasePolicy::Strict);
        assert_eq!(config.low_stock_threshold, 12);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("INVENTORY_RELEASE_POLICY", "sometimes"),
            ("INVENTORY_LOW_STOCK_THRESHOLD", "lots"),
        ]));
        assert_eq!(config, LedgerConfig::default());
    }
}
