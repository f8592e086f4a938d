//! Cross-resource aggregation: one pass over the API, folded into intermediate aggregates.

mod aggregates;
mod aggregator;
mod health;

pub use aggregates::{
    CloudAggregates, PassOutput, ProjectInfo, RepoAggregates, RepoRef, RestrictionCounts, ServerAggregates, WorkspaceAggregates,
    count_restrictions,
};
pub use aggregator::{Aggregator, PassError};
pub use health::{Component, Failure, HealthReport, HealthTracker, LOW_QUOTA_THRESHOLD, RateLimitReading};
