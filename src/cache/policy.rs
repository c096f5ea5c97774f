//! TTL Policy Module
//!
//! Maps operation identifiers to a lifetime based on how quickly the data
//! behind them changes.

use std::collections::HashMap;
use std::time::Duration;

/// TTL used for operations missing from the table.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

// == Volatility Tier ==
/// How fast the inputs of an operation go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolatilityTier {
    /// Changes with every commit
    Fast,
    /// Changes over a working session
    Moderate,
    /// Changes over days
    Slow,
}

impl VolatilityTier {
    pub fn ttl(self) -> Duration {
        match self {
            VolatilityTier::Fast => Duration::from_secs(5 * 60),
            VolatilityTier::Moderate => Duration::from_secs(30 * 60),
            VolatilityTier::Slow => Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Built-in operation table.
const BUILTIN_TIERS: &[(&str, VolatilityTier)] = &[
    // Reference and call-graph queries follow every edit
    ("findReferences", VolatilityTier::Fast),
    ("callers", VolatilityTier::Fast),
    ("impactAnalysis", VolatilityTier::Fast),
    ("unusedExports", VolatilityTier::Fast),
    // Whole-tree scans, stable within a session
    ("securityAudit", VolatilityTier::Moderate),
    ("complexityReport", VolatilityTier::Moderate),
    ("duplicateCode", VolatilityTier::Moderate),
    ("todoScan", VolatilityTier::Moderate),
    // Slow-moving artifacts
    ("i18nCoverage", VolatilityTier::Slow),
    ("dependencyGraph", VolatilityTier::Slow),
    ("licenseReport", VolatilityTier::Slow),
];

// == TTL Policy ==
/// Resolves the TTL for an insert.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: HashMap<String, Duration>,
    default_ttl: Duration,
}

impl TtlPolicy {
    /// Creates the built-in policy with the given fallback TTL.
    pub fn new(default_ttl: Duration) -> Self {
        let table = BUILTIN_TIERS
            .iter()
            .map(|(operation, tier)| (operation.to_string(), tier.ttl()))
            .collect();

        Self { table, default_ttl }
    }

    /// Adds or replaces the TTL of one operation.
    pub fn with_override(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.table.insert(operation.into(), ttl);
        self
    }

    /// Returns `custom`, else the table entry, else the default.
    pub fn resolve(&self, operation: &str, custom: Option<Duration>) -> Duration {
        custom
            .or_else(|| self.table.get(operation).copied())
            .unwrap_or(self.default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_durations() {
        assert_eq!(VolatilityTier::Fast.ttl(), Duration::from_secs(300));
        assert_eq!(VolatilityTier::Moderate.ttl(), Duration::from_secs(1800));
        assert_eq!(VolatilityTier::Slow.ttl(), Duration::from_secs(7200));
    }

    #[test]
    fn test_resolution_order() {
        let policy = TtlPolicy::default();
        let custom = Duration::from_secs(1);

        assert_eq!(policy.resolve("callers", Some(custom)), custom);
        assert_eq!(policy.resolve("callers", None), VolatilityTier::Fast.ttl());
        assert_eq!(policy.resolve("i18nCoverage", None), VolatilityTier::Slow.ttl());
        assert_eq!(policy.resolve("somethingElse", None), DEFAULT_TTL);
    }

    #[test]
    fn test_fast_operations_expire_before_slow_ones() {
        let policy = TtlPolicy::default();
        assert!(policy.resolve("findReferences", None) < policy.resolve("licenseReport", None));
    }

    #[test]
    fn test_override() {
        let policy = TtlPolicy::new(Duration::from_secs(60))
            .with_override("securityAudit", Duration::from_secs(10))
            .with_override("custom", Duration::from_secs(20));

        assert_eq!(policy.resolve("securityAudit", None), Duration::from_secs(10));
        assert_eq!(policy.resolve("custom", None), Duration::from_secs(20));
        assert_eq!(policy.resolve("unknown", None), Duration::from_secs(60));
        assert_eq!(policy.default_ttl(), Duration::from_secs(60));
    }
}
