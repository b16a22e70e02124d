//! Process-lifetime query counters.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub cache_hits: u64,
    /// Running mean over executed (not cached) queries
    pub average_execution_time_ms: f64,
}

impl Metrics {
    pub fn record_cache_hit(&mut self) {
        self.total_queries += 1;
        self.cache_hits += 1;
    }

    pub fn record_execution(&mut self, success: bool, execution_time_ms: u64) {
        self.total_queries += 1;
        if success {
            self.successful_queries += 1;
        } else {
            self.failed_queries += 1;
        }
        let executed = (self.successful_queries + self.failed_queries) as f64;
        self.average_execution_time_ms +=
            (execution_time_ms as f64 - self.average_execution_time_ms) / executed;
    }

    pub fn success_rate(&self) -> f64 {
        let executed = self.successful_queries + self.failed_queries;
        if executed == 0 {
            0.0
        } else {
            self.successful_queries as f64 / executed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average() {
        let mut m = Metrics::default();
        m.record_execution(true, 10);
        m.record_execution(false, 30);
        m.record_cache_hit();
        assert_eq!(m.total_queries, 3);
        assert_eq!(m.cache_hits, 1);
        assert!((m.average_execution_time_ms - 20.0).abs() < f64::EPSILON);
        assert!((m.success_rate() - 0.5).abs() < f64::EPSILON);
    }
}
