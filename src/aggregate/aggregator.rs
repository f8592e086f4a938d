use super::aggregates::{
    CloudAggregates, PassOutput, ProjectInfo, RepoAggregates, RepoRef, ServerAggregates, WorkspaceAggregates, count_restrictions,
};
use super::health::{Component, Failure, HealthTracker, RateLimitReading};
use crate::hosting::{CloudApi, ErrorKind, FetchError, Project, Repository, ServerApi};
use core::time::Duration;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "aggregator";

/// Failure of a whole pass. The exporter turns every variant into a degraded snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// Listing projects or repositories failed, so nothing downstream can be trusted.
    #[error("could not enumerate {}", .component.as_str())]
    Enumeration {
        component: Component,
        #[source]
        source: FetchError,
    },

    /// The pass task panicked or was cancelled.
    #[error("aggregation pass failed: {0}")]
    RuntimeFault(String),

    #[error("aggregation pass exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl PassError {
    /// Classification used for the error counter.
    #[must_use]
    pub const fn failure(&self) -> Failure {
        match self {
            Self::Enumeration { component, source } => Failure {
                kind: source.kind(),
                component: *component,
            },
            Self::RuntimeFault(_) => Failure {
                kind: ErrorKind::RuntimeFault,
                component: Component::Pass,
            },
            Self::DeadlineExceeded(_) => Failure {
                kind: ErrorKind::Deadline,
                component: Component::Pass,
            },
        }
    }
}

#[derive(Debug)]
enum Backend {
    Cloud(CloudApi),
    Server(ServerApi),
}

/// Runs one aggregation pass over the configured API dialect.
#[derive(Debug)]
pub struct Aggregator {
    backend: Backend,
}

impl Aggregator {
    #[must_use]
    pub const fn cloud(api: CloudApi) -> Self {
        Self {
            backend: Backend::Cloud(api),
        }
    }

    #[must_use]
    pub const fn server(api: ServerApi) -> Self {
        Self {
            backend: Backend::Server(api),
        }
    }

    /// Walk the resource hierarchy once and collect every aggregate.
    ///
    /// Fetches are issued sequentially. Only enumeration failures abort the pass; every other
    /// failure is recorded in the returned health report.
    pub async fn run(&self) -> Result<PassOutput, PassError> {
        match &self.backend {
            Backend::Cloud(api) => run_cloud(api).await,
            Backend::Server(api) => run_server(api).await,
        }
    }
}

async fn run_cloud(api: &CloudApi) -> Result<PassOutput, PassError> {
    let mut health = HealthTracker::new();

    let projects = api.projects().await.map_err(|source| enumeration_failed(Component::Projects, source))?;
    log::info!(target: LOG_TARGET, "Found {} project(s) in workspace '{}'", projects.len(), api.workspace());

    let repositories = api
        .repositories()
        .await
        .map_err(|source| enumeration_failed(Component::Repositories, source))?;
    log::info!(target: LOG_TARGET, "Found {} repositor(ies) in workspace '{}'", repositories.len(), api.workspace());

    let (projects, repo_refs) = pair_repositories(projects, repositories);

    let user_count = leaf(&mut health, api.workspace(), Component::Members, api.member_count().await);

    let mut repos = Vec::with_capacity(repo_refs.len());
    for repo in repo_refs {
        repos.push(collect_repository(api, repo, &mut health).await);
    }

    let open_pull_requests = repos.iter().map(|r| r.open_prs).sum::<Option<u64>>();

    let rate_limits = match api.rate_limits().await {
        Ok(buckets) => buckets
            .into_iter()
            .map(|(bucket, limit)| RateLimitReading {
                bucket,
                remaining: limit.remaining,
                reset_seconds: limit.reset,
            })
            .collect(),
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Could not read rate limits: {e}");
            health.record_soft_failure(e.kind(), Component::RateLimits);
            Vec::new()
        }
    };
    health.observe_rate_limits(&rate_limits);

    Ok(PassOutput {
        aggregates: WorkspaceAggregates::Cloud(CloudAggregates {
            projects,
            repos,
            user_count,
            open_pull_requests,
            rate_limits,
        }),
        health: health.finish(),
    })
}

/// Join repositories to their projects, dropping repositories whose project is not listed.
fn pair_repositories(projects: Vec<Project>, repositories: Vec<Repository>) -> (Vec<ProjectInfo>, Vec<RepoRef>) {
    let mut index: BTreeMap<String, ProjectInfo> = projects
        .into_iter()
        .filter(|p| !p.key.is_empty())
        .map(|p| {
            (
                p.key.clone(),
                ProjectInfo {
                    key: p.key,
                    name: p.name,
                    uuid: p.uuid,
                    kind: p.kind,
                    is_private: p.is_private,
                    has_publicly_visible_repos: p.has_publicly_visible_repos,
                    created_on: p.created_on,
                    updated_on: p.updated_on,
                    repo_count: 0,
                },
            )
        })
        .collect();

    let mut repo_refs = Vec::with_capacity(repositories.len());
    for repo in repositories {
        let Some(project_key) = repo.project.as_ref().map(|p| p.key.as_str()).filter(|key| !key.is_empty()) else {
            log::warn!(target: LOG_TARGET, "Skipping repository '{}': it has no project", repo.slug);
            continue;
        };

        let Some(project) = index.get(project_key) else {
            log::warn!(target: LOG_TARGET, "Skipping repository '{}': project '{project_key}' is not listed", repo.slug);
            continue;
        };

        let name = if repo.name.is_empty() { repo.slug.clone() } else { repo.name };
        repo_refs.push(RepoRef {
            project_key: project.key.clone(),
            project_name: project.name.clone(),
            slug: repo.slug,
            name,
        });
    }

    repo_refs.sort();
    repo_refs.dedup();

    for repo in &repo_refs {
        if let Some(project) = index.get_mut(&repo.project_key) {
            project.repo_count += 1;
        }
    }

    (index.into_values().collect(), repo_refs)
}

async fn collect_repository(api: &CloudApi, repo: RepoRef, health: &mut HealthTracker) -> RepoAggregates {
    log::debug!(target: LOG_TARGET, "Collecting repository '{}/{}'", repo.project_key, repo.slug);

    let slug = repo.slug.as_str();
    let scope = format!("{}/{slug}", api.workspace());
    let mut aggregates = RepoAggregates::new(repo.clone());

    aggregates.open_prs = leaf(health, &scope, Component::PullRequests, api.open_pull_request_count(slug).await);
    aggregates.commits = leaf(health, &scope, Component::Commits, api.commit_tally(slug).await);
    aggregates.size_bytes = leaf(health, &scope, Component::RepositoryInfo, api.repository_info(slug).await).and_then(|info| info.size);
    aggregates.last_commit = leaf(health, &scope, Component::LastCommit, api.last_commit_date(slug).await).flatten();

    aggregates.open_issues = match api.open_issue_count(slug).await {
        Err(e) if e.status() == Some(404) => {
            log::debug!(target: LOG_TARGET, "Issue tracker is disabled for '{scope}'");
            None
        }
        result => leaf(health, &scope, Component::Issues, result),
    };

    aggregates.tags = leaf(health, &scope, Component::Tags, api.tag_count(slug).await);
    aggregates.branches = leaf(health, &scope, Component::Branches, api.branch_count(slug).await);
    aggregates.webhooks = leaf(health, &scope, Component::Webhooks, api.webhook_count(slug).await);
    aggregates.branch_restrictions = leaf(health, &scope, Component::BranchRestrictions, api.branch_restrictions(slug).await)
        .map(|restrictions| count_restrictions(restrictions.iter().map(|r| (r.pattern.as_deref(), r.kind.as_deref()))));

    aggregates
}

async fn run_server(api: &ServerApi) -> Result<PassOutput, PassError> {
    let mut health = HealthTracker::new();

    let repository_count = api
        .repository_total()
        .await
        .map_err(|source| enumeration_failed(Component::Repositories, source))?;
    let project_count = api
        .project_total()
        .await
        .map_err(|source| enumeration_failed(Component::Projects, source))?;
    log::info!(target: LOG_TARGET, "Found {project_count} project(s) and {repository_count} repositor(ies)");

    let user_count = leaf(&mut health, "instance", Component::Users, api.user_total().await);
    let open_pull_requests = leaf(&mut health, "instance", Component::PullRequests, api.open_pull_request_total().await);

    Ok(PassOutput {
        aggregates: WorkspaceAggregates::Server(ServerAggregates {
            repository_count,
            project_count,
            user_count,
            open_pull_requests,
        }),
        health: health.finish(),
    })
}

fn enumeration_failed(component: Component, source: FetchError) -> PassError {
    log::error!(target: LOG_TARGET, "Could not enumerate {}: {source}", component.as_str());
    PassError::Enumeration { component, source }
}

/// Keep a successful leaf value, or log and record the failure and omit the value.
fn leaf<T>(health: &mut HealthTracker, scope: &str, component: Component, result: Result<T, FetchError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Could not fetch {} for '{scope}': {e}", component.as_str());
            health.record_failure(e.kind(), component);
            None
        }
    }
}
