//! Metric names and recording helpers for import and campaign activity.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, so library users opt in by installing an exporter.

use std::fmt;
use std::time::Instant;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Import metrics
    ImportRows,
    ImportRowsSkipped,
    ImportRecordsCreated,
    ImportDuplicatesSkipped,
    ImportFailures,
    ImportHeaderCollisions,
    ImportParseDuration,

    // Campaign metrics
    CampaignEvaluationsGenerated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ImportRows => "rh_eval_import_rows_total",
            MetricName::ImportRowsSkipped => "rh_eval_import_rows_skipped_total",
            MetricName::ImportRecordsCreated => "rh_eval_import_records_created_total",
            MetricName::ImportDuplicatesSkipped => "rh_eval_import_duplicates_skipped_total",
            MetricName::ImportFailures => "rh_eval_import_failures_total",
            MetricName::ImportHeaderCollisions => "rh_eval_header_collisions_total",
            MetricName::ImportParseDuration => "rh_eval_import_parse_duration_seconds",
            MetricName::CampaignEvaluationsGenerated => {
                "rh_eval_campaign_evaluations_generated_total"
            }
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn increment(name: MetricName, by: u64) {
    ::metrics::counter!(name.as_str()).increment(by);
}

pub mod import {
    use super::*;

    pub fn rows_read(count: usize) {
        increment(MetricName::ImportRows, count as u64);
    }

    pub fn rows_skipped(count: usize) {
        increment(MetricName::ImportRowsSkipped, count as u64);
    }

    pub fn record_created() {
        increment(MetricName::ImportRecordsCreated, 1);
    }

    pub fn duplicate_skipped() {
        increment(MetricName::ImportDuplicatesSkipped, 1);
    }

    pub fn failed() {
        increment(MetricName::ImportFailures, 1);
    }

    pub fn header_collisions(count: usize) {
        increment(MetricName::ImportHeaderCollisions, count as u64);
    }

    /// Starts timing a file parse; duration is recorded when the guard drops.
    pub fn time_parse() -> TimingGuard {
        TimingGuard::new(MetricName::ImportParseDuration)
    }
}

pub mod campaign {
    use super::*;

    pub fn evaluations_generated(count: usize) {
        increment(MetricName::CampaignEvaluationsGenerated, count as u64);
    }
}

/// Records elapsed time to a histogram when dropped
pub struct TimingGuard {
    start: Instant,
    name: MetricName,
}

impl TimingGuard {
    pub fn new(name: MetricName) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        ::metrics::histogram!(self.name.as_str()).record(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_follow_prometheus_conventions() {
        let all = [
            MetricName::ImportRows,
            MetricName::ImportRowsSkipped,
            MetricName::ImportRecordsCreated,
            MetricName::ImportDuplicatesSkipped,
            MetricName::ImportFailures,
            MetricName::ImportHeaderCollisions,
            MetricName::CampaignEvaluationsGenerated,
        ];
        for name in all {
            assert!(name.as_str().starts_with("rh_eval_"));
            assert!(name.as_str().ends_with("_total"));
        }
        assert!(MetricName::ImportParseDuration.to_string().ends_with("_seconds"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        import::rows_read(3);
        import::record_created();
        let _timing = import::time_parse();
    }
}
