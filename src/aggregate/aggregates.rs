//! Intermediate aggregates produced by one pass, before they are flattened into metric records.

use super::health::{HealthReport, RateLimitReading};
use crate::hosting::CommitTally;
use std::collections::BTreeMap;

/// A project from the projects listing, along with how many of the listed repositories belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub key: String,
    pub name: String,
    pub uuid: String,
    pub kind: String,
    pub is_private: bool,
    pub has_publicly_visible_repos: bool,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub repo_count: u64,
}

/// Identity of a repository within its project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoRef {
    pub project_key: String,
    pub project_name: String,
    pub slug: String,
    pub name: String,
}

impl RepoRef {
    /// Values of the repository identity labels, in label order.
    #[must_use]
    pub fn labels(&self) -> [&str; 4] {
        [&self.project_key, &self.project_name, &self.slug, &self.name]
    }
}

/// Branch restriction counts keyed by (branch pattern, restriction kind).
pub type RestrictionCounts = BTreeMap<(String, String), u64>;

/// Everything collected for one repository. `None` marks a sub-resource that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAggregates {
    pub repo: RepoRef,
    pub open_prs: Option<u64>,
    pub commits: Option<CommitTally>,
    pub size_bytes: Option<u64>,
    pub last_commit: Option<String>,
    pub open_issues: Option<u64>,
    pub tags: Option<u64>,
    pub branches: Option<u64>,
    pub webhooks: Option<u64>,
    pub branch_restrictions: Option<RestrictionCounts>,
}

impl RepoAggregates {
    #[must_use]
    pub const fn new(repo: RepoRef) -> Self {
        Self {
            repo,
            open_prs: None,
            commits: None,
            size_bytes: None,
            last_commit: None,
            open_issues: None,
            tags: None,
            branches: None,
            webhooks: None,
            branch_restrictions: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudAggregates {
    /// Sorted by project key.
    pub projects: Vec<ProjectInfo>,
    /// Sorted by (project key, slug).
    pub repos: Vec<RepoAggregates>,
    pub user_count: Option<u64>,
    /// Sum over all repositories; absent unless every repository's count was fetched.
    pub open_pull_requests: Option<u64>,
    pub rate_limits: Vec<RateLimitReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerAggregates {
    pub repository_count: u64,
    pub project_count: u64,
    pub user_count: Option<u64>,
    pub open_pull_requests: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceAggregates {
    Cloud(CloudAggregates),
    Server(ServerAggregates),
}

/// Result of a pass that got past enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutput {
    pub aggregates: WorkspaceAggregates,
    pub health: HealthReport,
}

/// Count branch restrictions per (pattern, kind).
///
/// Missing fields are counted under an empty pattern or kind.
pub fn count_restrictions<'a>(restrictions: impl IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>) -> RestrictionCounts {
    let mut counts = RestrictionCounts::new();
    for (pattern, kind) in restrictions {
        let key = (pattern.unwrap_or_default().to_string(), kind.unwrap_or_default().to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}
