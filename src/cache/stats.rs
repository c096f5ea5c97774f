//! Cache Statistics Module
//!
//! Lifetime hit/miss/eviction counters and the report built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// == Hit Rate ==
/// Returns hits / (hits + misses), or 0.0 if no requests have been made.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// == Operation Counters ==
/// Lookup counters for a single operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounters {
    pub hits: u64,
    pub misses: u64,
}

// == Cache Counters ==
/// Process-lifetime counters. Persisted in their own file so that clearing
/// the entries never resets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCounters {
    /// Number of successful lookups
    pub total_hits: u64,
    /// Number of lookups that found nothing or an expired entry
    pub total_misses: u64,
    /// Number of entries removed by the count or size bound
    #[serde(default)]
    pub evictions: u64,
    /// Per-operation breakdown of hits and misses
    #[serde(default)]
    pub operations: BTreeMap<String, OperationCounters>,
}

impl CacheCounters {
    // == Constructor ==
    /// Creates a new CacheCounters with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the hit counters.
    pub fn record_hit(&mut self, operation: &str) {
        self.total_hits += 1;
        self.operations.entry(operation.to_string()).or_default().hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counters.
    pub fn record_miss(&mut self, operation: &str) {
        self.total_misses += 1;
        self.operations.entry(operation.to_string()).or_default().misses += 1;
    }

    // == Record Eviction ==
    /// Adds to the eviction counter.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    // == Hit Rate ==
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.total_hits, self.total_misses)
    }
}

// == Operation Stats ==
/// Per-operation slice of the statistics report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    /// Live entries produced by this operation
    pub entries: usize,
    /// Total serialized size of those entries
    pub size_bytes: u64,
    /// Lifetime hits for this operation
    pub hits: u64,
    /// Lifetime misses for this operation
    pub misses: u64,
    /// hits / (hits + misses), 0.0 without requests
    pub hit_rate: f64,
}

// == Cache Stats ==
/// Snapshot of cache state, computed over live entries only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of live entries
    pub total_entries: usize,
    /// Sum of `size_bytes` over live entries
    pub total_size_bytes: u64,
    /// Lifetime hits
    pub total_hits: u64,
    /// Lifetime misses
    pub total_misses: u64,
    /// Lifetime evictions caused by the count or size bound
    pub evictions: u64,
    /// totalHits / (totalHits + totalMisses), 0.0 without requests
    pub hit_rate: f64,
    /// Breakdown keyed by operation
    pub operations: BTreeMap<String, OperationStats>,
}

impl CacheStats {
    /// Builds the report from per-entry (operation, size) pairs and the
    /// lifetime counters.
    ///
    /// Operations that only ever missed still show up, with zero entries.
    pub fn build<'a>(
        live_entries: impl IntoIterator<Item = (&'a str, u64)>,
        counters: &CacheCounters,
    ) -> Self {
        let mut operations: BTreeMap<String, OperationStats> = BTreeMap::new();
        let mut total_entries = 0;
        let mut total_size_bytes = 0;

        for (operation, size_bytes) in live_entries {
            let op = operations.entry(operation.to_string()).or_default();
            op.entries += 1;
            op.size_bytes += size_bytes;
            total_entries += 1;
            total_size_bytes += size_bytes;
        }

        for (operation, op_counters) in &counters.operations {
            let op = operations.entry(operation.clone()).or_default();
            op.hits = op_counters.hits;
            op.misses = op_counters.misses;
            op.hit_rate = hit_rate(op_counters.hits, op_counters.misses);
        }

        Self {
            total_entries,
            total_size_bytes,
            total_hits: counters.total_hits,
            total_misses: counters.total_misses,
            evictions: counters.evictions,
            hit_rate: counters.hit_rate(),
            operations,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let counters = CacheCounters::new();
        assert_eq!(counters.total_hits, 0);
        assert_eq!(counters.total_misses, 0);
        assert_eq!(counters.evictions, 0);
        assert!(counters.operations.is_empty());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheCounters::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut counters = CacheCounters::new();
        counters.record_hit("a");
        counters.record_hit("a");
        counters.record_hit("b");
        assert_eq!(counters.hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut counters = CacheCounters::new();
        counters.record_hit("a");
        counters.record_miss("a");
        counters.record_miss("b");
        counters.record_miss("b");

        assert_eq!(counters.hit_rate(), 0.25);
        assert_eq!(counters.operations["a"], OperationCounters { hits: 1, misses: 1 });
        assert_eq!(counters.operations["b"], OperationCounters { hits: 0, misses: 2 });
    }

    #[test]
    fn test_record_evictions() {
        let mut counters = CacheCounters::new();
        counters.record_evictions(2);
        counters.record_evictions(3);
        assert_eq!(counters.evictions, 5);
    }

    #[test]
    fn test_counters_file_format() {
        let mut counters = CacheCounters::new();
        counters.record_hit("op");
        let encoded = serde_json::to_value(&counters).unwrap();
        assert_eq!(encoded["totalHits"], 1);
        assert_eq!(encoded["totalMisses"], 0);

        // Older files carry only the two totals
        let decoded: CacheCounters =
            serde_json::from_str(r#"{"totalHits":3,"totalMisses":4}"#).unwrap();
        assert_eq!(decoded.total_hits, 3);
        assert_eq!(decoded.total_misses, 4);
        assert!(decoded.operations.is_empty());
    }

    #[test]
    fn test_build_report() {
        let mut counters = CacheCounters::new();
        counters.record_hit("callers");
        counters.record_miss("callers");
        counters.record_miss("coverage");
        counters.record_evictions(1);

        let stats = CacheStats::build(
            vec![("callers", 10), ("callers", 20), ("scan", 5)],
            &counters,
        );

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size_bytes, 35);
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 2);
        assert_eq!(stats.evictions, 1);

        let callers = &stats.operations["callers"];
        assert_eq!(callers.entries, 2);
        assert_eq!(callers.size_bytes, 30);
        assert_eq!(callers.hit_rate, 0.5);

        let coverage = &stats.operations["coverage"];
        assert_eq!(coverage.entries, 0);
        assert_eq!(coverage.misses, 1);
        assert_eq!(coverage.hit_rate, 0.0);

        assert_eq!(stats.operations["scan"].hits, 0);
    }
}
