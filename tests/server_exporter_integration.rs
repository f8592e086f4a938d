//! Integration tests for the Bitbucket Server pass using a wiremock stand-in for the API

use bitbucket_exporter::config::{Config, RawConfig};
use bitbucket_exporter::exporter::Exporter;
use bitbucket_exporter::metrics::MetricId;
use serde_json::json;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn exporter_for(server: &MockServer) -> Exporter {
    let config = Config::resolve(RawConfig {
        url: Some(server.uri()),
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        ..RawConfig::default()
    })
    .unwrap();
    Exporter::from_config(&config).unwrap()
}

async fn mount_count(server: &MockServer, route: &str, total: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("limit", "1"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "size": 1,
            "limit": 1,
            "isLastPage": false,
            "values": [{}],
            "start": 0,
            "total": total
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_server_totals() {
    let server = MockServer::start().await;
    mount_count(&server, "/rest/api/1.0/repos", 12).await;
    mount_count(&server, "/rest/api/1.0/projects", 3).await;
    mount_count(&server, "/rest/api/1.0/users", 40).await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/pull-requests"))
        .and(query_param("state", "OPEN"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "size": 1, "total": 5, "values": [{}] })))
        .mount(&server)
        .await;

    let snapshot = exporter_for(&server).scrape().await;

    assert_eq!(snapshot.get(MetricId::ExporterUp, &[]), Some(1.0));
    assert_eq!(snapshot.get(MetricId::RepositoryCount, &[]), Some(12.0));
    assert_eq!(snapshot.get(MetricId::ProjectCount, &[]), Some(3.0));
    assert_eq!(snapshot.get(MetricId::UserCount, &[]), Some(40.0));
    assert_eq!(snapshot.get(MetricId::OpenPullRequests, &[]), Some(5.0));

    // no per-repository drill-down against Bitbucket Server
    assert_eq!(snapshot.series(MetricId::RepoCommits).count(), 0);
    assert_eq!(snapshot.series(MetricId::ProjectRepos).count(), 0);
}

#[tokio::test]
async fn test_server_falls_back_to_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "size": 7, "values": [] })))
        .mount(&server)
        .await;
    mount_count(&server, "/rest/api/1.0/projects", 2).await;
    mount_count(&server, "/rest/api/1.0/users", 4).await;
    mount_count(&server, "/rest/api/1.0/pull-requests", 0).await;

    let snapshot = exporter_for(&server).scrape().await;

    assert_eq!(snapshot.get(MetricId::RepositoryCount, &[]), Some(7.0));
    assert_eq!(snapshot.get(MetricId::OpenPullRequests, &[]), Some(0.0));
}

#[tokio::test]
async fn test_server_user_failure_degrades_only_that_metric() {
    let server = MockServer::start().await;
    mount_count(&server, "/rest/api/1.0/repos", 12).await;
    mount_count(&server, "/rest/api/1.0/projects", 3).await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/users"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_count(&server, "/rest/api/1.0/pull-requests", 5).await;

    let snapshot = exporter_for(&server).scrape().await;

    assert_eq!(snapshot.get(MetricId::ExporterUp, &[]), Some(0.0));
    assert!(snapshot.get(MetricId::UserCount, &[]).is_none());
    assert_eq!(snapshot.get(MetricId::RepositoryCount, &[]), Some(12.0));
    assert_eq!(snapshot.get(MetricId::OpenPullRequests, &[]), Some(5.0));
    assert_eq!(snapshot.get(MetricId::ExporterErrorsTotal, &["auth", "users"]), Some(1.0));
}

#[tokio::test]
async fn test_server_enumeration_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/repos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let exporter = exporter_for(&server);
    let snapshot = exporter.scrape().await;

    assert_eq!(snapshot.get(MetricId::ExporterUp, &[]), Some(0.0));
    assert!(snapshot.get(MetricId::RepositoryCount, &[]).is_none());
    assert_eq!(
        snapshot.get(MetricId::ExporterErrorsTotal, &["upstream_status", "repositories"]),
        Some(1.0)
    );

    // the exporter keeps serving and keeps counting
    let snapshot = exporter.scrape().await;
    assert_eq!(
        snapshot.get(MetricId::ExporterErrorsTotal, &["upstream_status", "repositories"]),
        Some(2.0)
    );
}

#[tokio::test]
async fn test_server_rejects_missing_credentials() {
    let server = MockServer::start().await;
    mount_count(&server, "/rest/api/1.0/repos", 12).await;

    let config = Config::resolve(RawConfig {
        url: Some(server.uri()),
        ..RawConfig::default()
    })
    .unwrap();
    let snapshot = Exporter::from_config(&config).unwrap().scrape().await;

    // without basic auth the mock does not match and wiremock answers 404
    assert_eq!(snapshot.get(MetricId::ExporterUp, &[]), Some(0.0));
    assert_eq!(
        snapshot.get(MetricId::ExporterErrorsTotal, &["upstream_status", "repositories"]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_server_count_without_total_or_size_is_a_decode_failure() {
    let server = MockServer::start().await;
    mount_count(&server, "/rest/api/1.0/repos", 12).await;
    mount_count(&server, "/rest/api/1.0/projects", 3).await;
    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [] })))
        .mount(&server)
        .await;
    mount_count(&server, "/rest/api/1.0/pull-requests", 5).await;

    let snapshot = exporter_for(&server).scrape().await;

    // no made-up zero
    assert!(snapshot.get(MetricId::UserCount, &[]).is_none());
    assert_eq!(snapshot.get(MetricId::ExporterErrorsTotal, &["decode", "users"]), Some(1.0));
    assert_eq!(snapshot.get(MetricId::RepositoryCount, &[]), Some(12.0));
}
