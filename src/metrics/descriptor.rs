use std::collections::BTreeMap;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// Default metric name prefix.
pub const DEFAULT_NAMESPACE: &str = "bitbucket";

const REPO_LABELS: &[&str] = &["project_key", "project_name", "repo_slug", "repo_name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

/// Every metric the exporter can emit. The snake-case variant name is the metric name without its namespace.
///
/// Variant order is the order in which metrics appear in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MetricId {
    ProjectCount,
    RepositoryCount,
    UserCount,
    OpenPullRequests,
    ProjectRepos,
    ProjectCreatedTimestamp,
    ProjectUpdatedTimestamp,
    RepoOpenPrs,
    RepoCommits,
    RepoSizeBytes,
    RepoLastCommitTimestamp,
    TagsTotal,
    RepoBranchesTotal,
    WebhooksTotal,
    /// One series per committer identity. Cardinality grows with the number of distinct
    /// committers across all repositories and is not capped.
    UserCommits,
    IssuesTotal,
    BranchRestrictionsTotal,
    ApiRateLimitRemaining,
    ApiRateLimitResetSeconds,
    ExporterUp,
    ExporterErrorsTotal,
    ExporterScrapeDurationSeconds,
}

impl MetricId {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        self.into()
    }

    const fn help(self) -> &'static str {
        match self {
            Self::ProjectCount => "Number of projects",
            Self::RepositoryCount => "Number of repositories",
            Self::UserCount => "Number of users",
            Self::OpenPullRequests => "Number of open pull requests",
            Self::ProjectRepos => "Number of repositories per project",
            Self::ProjectCreatedTimestamp => "Project creation time in seconds since the Unix epoch",
            Self::ProjectUpdatedTimestamp => "Project last update time in seconds since the Unix epoch",
            Self::RepoOpenPrs => "Number of open pull requests per repository",
            Self::RepoCommits => "Number of commits per repository",
            Self::RepoSizeBytes => "Repository size in bytes",
            Self::RepoLastCommitTimestamp => "Time of the most recent commit in seconds since the Unix epoch",
            Self::TagsTotal => "Number of tags per repository",
            Self::RepoBranchesTotal => "Number of branches per repository",
            Self::WebhooksTotal => "Number of webhooks per repository",
            Self::UserCommits => "Number of commits per user per repository",
            Self::IssuesTotal => "Number of issues per repository by status",
            Self::BranchRestrictionsTotal => "Number of branch restrictions per repository by branch pattern and kind",
            Self::ApiRateLimitRemaining => "Remaining API calls in the rate limit bucket",
            Self::ApiRateLimitResetSeconds => "Seconds until the rate limit bucket resets",
            Self::ExporterUp => "Whether the last scrape of the Bitbucket API succeeded (1) or was degraded (0)",
            Self::ExporterErrorsTotal => "Total number of errors encountered while scraping, by error type and component",
            Self::ExporterScrapeDurationSeconds => "Duration of the last scrape in seconds",
        }
    }

    const fn kind(self) -> MetricKind {
        match self {
            Self::ExporterErrorsTotal => MetricKind::Counter,
            _ => MetricKind::Gauge,
        }
    }

    const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::ProjectCount
            | Self::RepositoryCount
            | Self::UserCount
            | Self::OpenPullRequests
            | Self::ExporterUp
            | Self::ExporterScrapeDurationSeconds => &[],
            Self::ProjectRepos => &[
                "project_key",
                "project_name",
                "project_uuid",
                "project_type",
                "project_is_private",
                "project_has_publicly_visible_repos",
            ],
            Self::ProjectCreatedTimestamp | Self::ProjectUpdatedTimestamp => &["project_key"],
            Self::RepoOpenPrs
            | Self::RepoCommits
            | Self::RepoSizeBytes
            | Self::RepoLastCommitTimestamp
            | Self::TagsTotal
            | Self::RepoBranchesTotal
            | Self::WebhooksTotal => REPO_LABELS,
            Self::UserCommits => &["project_key", "project_name", "repo_slug", "repo_name", "user"],
            Self::IssuesTotal => &["project_key", "project_name", "repo_slug", "repo_name", "status"],
            Self::BranchRestrictionsTotal => &[
                "project_key",
                "project_name",
                "repo_slug",
                "repo_name",
                "branch_name",
                "restriction_type",
            ],
            Self::ApiRateLimitRemaining | Self::ApiRateLimitResetSeconds => &["bucket"],
            Self::ExporterErrorsTotal => &["error_type", "component"],
        }
    }
}

/// Name, help text, type and ordered label names of one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

/// Descriptors for every [`MetricId`], built once at startup.
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    descriptors: BTreeMap<MetricId, MetricDescriptor>,
}

impl DescriptorTable {
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        let descriptors = MetricId::iter()
            .map(|id| {
                let name = if namespace.is_empty() {
                    id.suffix().to_string()
                } else {
                    format!("{namespace}_{}", id.suffix())
                };

                (
                    id,
                    MetricDescriptor {
                        name,
                        help: id.help(),
                        kind: id.kind(),
                        labels: id.labels(),
                    },
                )
            })
            .collect();

        Self { descriptors }
    }

    #[must_use]
    pub fn get(&self, id: MetricId) -> Option<&MetricDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, &MetricDescriptor)> {
        self.descriptors.iter().map(|(id, d)| (*id, d))
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
