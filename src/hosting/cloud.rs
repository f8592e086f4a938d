//! Bitbucket Cloud 2.0 endpoints.

use super::paginator::{CloudPage, Paginator};
use super::FetchError;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Default API root for Bitbucket Cloud.
pub const DEFAULT_CLOUD_API_ROOT: &str = "https://api.bitbucket.org/2.0";

const PAGE_LEN: &str = "100";

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub has_publicly_visible_repos: bool,
}

/// Project reference embedded in a repository listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

/// Repository metadata from the single-repository endpoint; only the fields we need.
#[derive(Debug, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub date: Option<String>,
}

impl Commit {
    /// The committer identity string used to tally commits.
    #[must_use]
    pub fn author_identity(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|a| a.raw.as_deref())
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
pub struct BranchRestriction {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitBucket {
    #[serde(default)]
    pub remaining: i64,
    #[serde(default)]
    pub reset: i64,
}

#[derive(Debug, Deserialize)]
struct RateLimits {
    #[serde(default)]
    limits: HashMap<String, RateLimitBucket>,
}

/// Per-committer commit counts for one repository.
///
/// The total is derived from the histogram, so the two always agree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitTally {
    by_author: BTreeMap<String, u64>,
}

impl CommitTally {
    pub fn record(&mut self, author: &str) {
        *self.by_author.entry(author.to_string()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.by_author.values().sum()
    }

    #[must_use]
    pub const fn by_author(&self) -> &BTreeMap<String, u64> {
        &self.by_author
    }
}

/// Bitbucket Cloud API scoped to one workspace.
#[derive(Debug, Clone)]
pub struct CloudApi {
    paginator: Paginator,
    api_root: Url,
    workspace: String,
}

impl CloudApi {
    #[must_use]
    pub const fn new(paginator: Paginator, api_root: Url, workspace: String) -> Self {
        Self {
            paginator,
            api_root,
            workspace,
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Build an address under the API root from path segments and query pairs.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.api_root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let _ = url.query_pairs_mut().extend_pairs(query);
        }
        url.into()
    }

    fn repo_url(&self, slug: &str, suffix: &[&str], query: &[(&str, &str)]) -> String {
        let mut segments = vec!["repositories", self.workspace.as_str(), slug];
        segments.extend_from_slice(suffix);
        self.url(&segments, query)
    }

    pub async fn projects(&self) -> Result<Vec<Project>, FetchError> {
        let url = self.url(&["workspaces", &self.workspace, "projects"], &[("pagelen", PAGE_LEN)]);
        self.paginator.collect_all::<CloudPage<Project>>(&url).await
    }

    pub async fn repositories(&self) -> Result<Vec<Repository>, FetchError> {
        let url = self.url(&["repositories", &self.workspace], &[("pagelen", PAGE_LEN)]);
        self.paginator.collect_all::<CloudPage<Repository>>(&url).await
    }

    pub async fn member_count(&self) -> Result<u64, FetchError> {
        let url = self.url(&["workspaces", &self.workspace, "members"], &[("pagelen", "1")]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    pub async fn open_pull_request_count(&self, slug: &str) -> Result<u64, FetchError> {
        let url = self.repo_url(slug, &["pullrequests"], &[("state", "OPEN"), ("pagelen", "1")]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    /// Walk every commit of a repository and tally them per author.
    pub async fn commit_tally(&self, slug: &str) -> Result<CommitTally, FetchError> {
        let url = self.repo_url(slug, &["commits"], &[("pagelen", PAGE_LEN)]);
        self.paginator
            .walk::<CloudPage<Commit>>(&url)
            .try_fold(CommitTally::default(), |mut tally, commit| async move {
                tally.record(commit.author_identity());
                Ok(tally)
            })
            .await
    }

    pub async fn repository_info(&self, slug: &str) -> Result<RepositoryInfo, FetchError> {
        let url = self.repo_url(slug, &[], &[]);
        self.paginator.client().get_json(&url).await
    }

    /// Raw date of the most recent commit, or `None` for an empty repository.
    pub async fn last_commit_date(&self, slug: &str) -> Result<Option<String>, FetchError> {
        let url = self.repo_url(slug, &["commits"], &[("pagelen", "1")]);
        let page: CloudPage<Commit> = self.paginator.first_page(&url).await?;
        Ok(page.values.into_iter().next().and_then(|commit| commit.date))
    }

    pub async fn open_issue_count(&self, slug: &str) -> Result<u64, FetchError> {
        let url = self.repo_url(slug, &["issues"], &[("state", "open")]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    pub async fn tag_count(&self, slug: &str) -> Result<u64, FetchError> {
        let url = self.repo_url(slug, &["refs", "tags"], &[("pagelen", PAGE_LEN)]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    pub async fn branch_count(&self, slug: &str) -> Result<u64, FetchError> {
        let url = self.repo_url(slug, &["refs", "branches"], &[("pagelen", PAGE_LEN)]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    pub async fn webhook_count(&self, slug: &str) -> Result<u64, FetchError> {
        let url = self.repo_url(slug, &["hooks"], &[("pagelen", PAGE_LEN)]);
        self.paginator.count::<CloudPage<serde_json::Value>>(&url).await
    }

    pub async fn branch_restrictions(&self, slug: &str) -> Result<Vec<BranchRestriction>, FetchError> {
        let url = self.repo_url(slug, &["branch-restrictions"], &[("pagelen", PAGE_LEN)]);
        self.paginator.collect_all::<CloudPage<BranchRestriction>>(&url).await
    }

    /// Rate-limit buckets, sorted by name.
    pub async fn rate_limits(&self) -> Result<Vec<(String, RateLimitBucket)>, FetchError> {
        let url = self.url(&["workspaces", &self.workspace, "rate-limits", ""], &[]);
        let limits: RateLimits = self.paginator.client().get_json(&url).await?;
        let mut buckets: Vec<_> = limits.limits.into_iter().collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(buckets)
    }
}
