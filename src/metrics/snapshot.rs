//! Flattening of pass aggregates into metric records.

use super::descriptor::{DescriptorTable, MetricId};
use crate::aggregate::{CloudAggregates, Component, PassOutput, ServerAggregates, WorkspaceAggregates};
use crate::hosting::{CommitTally, ErrorKind};
use chrono::DateTime;
use core::time::Duration;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "  snapshot";

/// One labeled sample. Label values are in the descriptor's label order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub id: MetricId,
    pub labels: Vec<String>,
    pub value: f64,
}

/// The complete set of records produced for one scrape, sorted by (metric, label values).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<MetricRecord>,
}

impl Snapshot {
    #[must_use]
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Value of the record with exactly these label values, if present.
    #[must_use]
    pub fn get(&self, id: MetricId, labels: &[&str]) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.id == id && r.labels.iter().map(String::as_str).eq(labels.iter().copied()))
            .map(|r| r.value)
    }

    /// All records of one metric.
    pub fn series(&self, id: MetricId) -> impl Iterator<Item = &MetricRecord> {
        self.records.iter().filter(move |r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records against a [`DescriptorTable`].
///
/// Records are keyed by (metric, label values), so pushing the same series twice keeps the last value.
#[derive(Debug)]
pub struct SnapshotBuilder<'a> {
    table: &'a DescriptorTable,
    records: BTreeMap<(MetricId, Vec<String>), f64>,
}

impl<'a> SnapshotBuilder<'a> {
    #[must_use]
    pub const fn new(table: &'a DescriptorTable) -> Self {
        Self {
            table,
            records: BTreeMap::new(),
        }
    }

    /// Add one record. Records whose label count does not match the descriptor are dropped.
    pub fn push(&mut self, id: MetricId, labels: &[&str], value: f64) {
        let Some(descriptor) = self.table.get(id) else {
            log::error!(target: LOG_TARGET, "No descriptor for metric {id:?}");
            return;
        };

        if descriptor.labels.len() != labels.len() {
            log::error!(
                target: LOG_TARGET,
                "Metric '{}' expects {} label(s) but got {}",
                descriptor.name,
                descriptor.labels.len(),
                labels.len()
            );
            return;
        }

        let _ = self.records.insert((id, labels.iter().map(ToString::to_string).collect()), value);
    }

    pub fn push_count(&mut self, id: MetricId, labels: &[&str], count: u64) {
        self.push(id, labels, as_gauge(count));
    }

    /// Add an RFC 3339 timestamp as Unix epoch seconds; unparseable values are skipped.
    pub fn push_timestamp(&mut self, id: MetricId, labels: &[&str], raw: &str) {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => self.push(id, labels, as_signed_gauge(ts.timestamp())),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping {} for {labels:?}: invalid timestamp '{raw}': {e}", id.suffix());
            }
        }
    }

    pub fn add_liveness(&mut self, up: bool) {
        self.push(MetricId::ExporterUp, &[], if up { 1.0 } else { 0.0 });
    }

    /// Add every record derived from a completed pass, including its liveness.
    pub fn add_pass(&mut self, output: &PassOutput) {
        match &output.aggregates {
            WorkspaceAggregates::Cloud(cloud) => self.add_cloud(cloud),
            WorkspaceAggregates::Server(server) => self.add_server(server),
        }
        self.add_liveness(output.health.up);
    }

    fn add_cloud(&mut self, cloud: &CloudAggregates) {
        self.push_count(MetricId::ProjectCount, &[], cloud.projects.len() as u64);
        self.push_count(MetricId::RepositoryCount, &[], cloud.repos.len() as u64);
        if let Some(users) = cloud.user_count {
            self.push_count(MetricId::UserCount, &[], users);
        }
        if let Some(open) = cloud.open_pull_requests {
            self.push_count(MetricId::OpenPullRequests, &[], open);
        }

        for project in &cloud.projects {
            self.push_count(
                MetricId::ProjectRepos,
                &[
                    project.key.as_str(),
                    project.name.as_str(),
                    project.uuid.as_str(),
                    project.kind.as_str(),
                    bool_label(project.is_private),
                    bool_label(project.has_publicly_visible_repos),
                ],
                project.repo_count,
            );
            if let Some(created) = &project.created_on {
                self.push_timestamp(MetricId::ProjectCreatedTimestamp, &[project.key.as_str()], created);
            }
            if let Some(updated) = &project.updated_on {
                self.push_timestamp(MetricId::ProjectUpdatedTimestamp, &[project.key.as_str()], updated);
            }
        }

        for repo in &cloud.repos {
            let identity = repo.repo.labels();

            let counts = [
                (MetricId::RepoOpenPrs, repo.open_prs),
                (MetricId::RepoCommits, repo.commits.as_ref().map(CommitTally::total)),
                (MetricId::RepoSizeBytes, repo.size_bytes),
                (MetricId::TagsTotal, repo.tags),
                (MetricId::RepoBranchesTotal, repo.branches),
                (MetricId::WebhooksTotal, repo.webhooks),
            ];
            for (id, value) in counts {
                if let Some(value) = value {
                    self.push_count(id, &identity, value);
                }
            }

            if let Some(last_commit) = &repo.last_commit {
                self.push_timestamp(MetricId::RepoLastCommitTimestamp, &identity, last_commit);
            }

            if let Some(tally) = &repo.commits {
                for (user, count) in tally.by_author() {
                    self.push_count(MetricId::UserCommits, &with_labels(identity, &[user.as_str()]), *count);
                }
            }

            if let Some(open) = repo.open_issues {
                self.push_count(MetricId::IssuesTotal, &with_labels(identity, &["open"]), open);
            }

            if let Some(restrictions) = &repo.branch_restrictions {
                for ((pattern, kind), count) in restrictions {
                    self.push_count(MetricId::BranchRestrictionsTotal, &with_labels(identity, &[pattern.as_str(), kind.as_str()]), *count);
                }
            }
        }

        for reading in &cloud.rate_limits {
            self.push(MetricId::ApiRateLimitRemaining, &[reading.bucket.as_str()], as_signed_gauge(reading.remaining));
            self.push(MetricId::ApiRateLimitResetSeconds, &[reading.bucket.as_str()], as_signed_gauge(reading.reset_seconds));
        }
    }

    fn add_server(&mut self, server: &ServerAggregates) {
        self.push_count(MetricId::RepositoryCount, &[], server.repository_count);
        self.push_count(MetricId::ProjectCount, &[], server.project_count);
        if let Some(users) = server.user_count {
            self.push_count(MetricId::UserCount, &[], users);
        }
        if let Some(open) = server.open_pull_requests {
            self.push_count(MetricId::OpenPullRequests, &[], open);
        }
    }

    /// Add the exporter's own counters and the duration of the pass that produced this snapshot.
    pub fn add_self_telemetry(&mut self, errors: &BTreeMap<(ErrorKind, Component), u64>, scrape_duration: Duration) {
        for ((kind, component), count) in errors {
            self.push_count(MetricId::ExporterErrorsTotal, &[kind.as_str(), component.as_str()], *count);
        }
        self.push(MetricId::ExporterScrapeDurationSeconds, &[], scrape_duration.as_secs_f64());
    }

    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot {
            records: self
                .records
                .into_iter()
                .map(|((id, labels), value)| MetricRecord { id, labels, value })
                .collect(),
        }
    }
}

/// Snapshot for a pass that did not complete: liveness 0 and nothing else from the API.
#[must_use]
pub fn degraded(table: &DescriptorTable) -> SnapshotBuilder<'_> {
    let mut builder = SnapshotBuilder::new(table);
    builder.add_liveness(false);
    builder
}

const fn bool_label(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn with_labels<'a>(identity: [&'a str; 4], extra: &[&'a str]) -> Vec<&'a str> {
    let mut labels = Vec::with_capacity(identity.len() + extra.len());
    labels.extend_from_slice(&identity);
    labels.extend_from_slice(extra);
    labels
}

#[expect(clippy::cast_precision_loss, reason = "counts stay far below 2^52")]
fn as_gauge(value: u64) -> f64 {
    value as f64
}

#[expect(clippy::cast_precision_loss, reason = "quota values stay far below 2^52")]
fn as_signed_gauge(value: i64) -> f64 {
    value as f64
}
