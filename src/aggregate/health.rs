use crate::hosting::ErrorKind;
use strum::IntoStaticStr;

const LOG_TARGET: &str = "    health";

/// Rate-limit buckets with fewer remaining calls than this are reported as running low.
pub const LOW_QUOTA_THRESHOLD: i64 = 10;

/// The part of a pass a failure came from, reported through the `component` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Component {
    Projects,
    Repositories,
    Members,
    Users,
    PullRequests,
    Commits,
    RepositoryInfo,
    LastCommit,
    Issues,
    Tags,
    Branches,
    Webhooks,
    BranchRestrictions,
    RateLimits,
    Pass,
}

impl Component {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// One classified failure observed during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Failure {
    pub kind: ErrorKind,
    pub component: Component,
}

/// Remaining quota of one named rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitReading {
    pub bucket: String,
    pub remaining: i64,
    pub reset_seconds: i64,
}

/// Outcome of the health tracking for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub up: bool,
    pub failures: Vec<Failure>,
}

/// Folds per-call outcomes of a single pass into a liveness value.
///
/// A fresh tracker is created for every pass, so nothing carries over between scrapes.
#[derive(Debug, Default)]
pub struct HealthTracker {
    degraded: bool,
    failures: Vec<Failure>,
}

impl HealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure that degrades liveness.
    pub fn record_failure(&mut self, kind: ErrorKind, component: Component) {
        self.degraded = true;
        self.failures.push(Failure { kind, component });
    }

    /// Record a failure that is counted but leaves liveness untouched.
    pub fn record_soft_failure(&mut self, kind: ErrorKind, component: Component) {
        self.failures.push(Failure { kind, component });
    }

    /// Inspect rate-limit readings, warning about buckets that are nearly exhausted.
    pub fn observe_rate_limits(&self, readings: &[RateLimitReading]) {
        for reading in readings.iter().filter(|r| r.remaining < LOW_QUOTA_THRESHOLD) {
            log::warn!(
                target: LOG_TARGET,
                "Rate limit bucket '{}' is running low: {} call(s) remaining, resets in {}s",
                reading.bucket,
                reading.remaining,
                reading.reset_seconds
            );
        }
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn finish(self) -> HealthReport {
        HealthReport {
            up: !self.degraded,
            failures: self.failures,
        }
    }
}
