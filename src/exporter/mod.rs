//! Scrape boundary: runs one pass per request and serves the result over HTTP.

use crate::Result;
use crate::aggregate::{Aggregator, Component, Failure, PassError, PassOutput};
use crate::config::{Config, Dialect};
use crate::hosting::{Client, CloudApi, ErrorKind, Paginator, ServerApi};
use crate::metrics::{CONTENT_TYPE, DescriptorTable, Snapshot, SnapshotBuilder, degraded, render};
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;

const LOG_TARGET: &str = "  exporter";

const LANDING_PAGE: &str = "<html>
<head><title>Bitbucket Exporter</title></head>
<body>
<h1>Bitbucket Exporter</h1>
<p><a href=\"/metrics\">Metrics</a></p>
</body>
</html>
";

/// Turns scrape requests into snapshots.
///
/// Passes are serialized: a scrape that arrives while another pass is running waits for it to
/// finish and then runs its own. The pass task owns the lock, so a scrape whose client hangs up
/// leaves the lock held until its pass ends. The error counter is the only state kept between
/// scrapes.
#[derive(Debug)]
pub struct Exporter {
    aggregator: Arc<Aggregator>,
    table: DescriptorTable,
    scrape_timeout: Duration,
    pass_lock: Arc<tokio::sync::Mutex<()>>,
    errors: Mutex<BTreeMap<(ErrorKind, Component), u64>>,
}

impl Exporter {
    #[must_use]
    pub fn new(aggregator: Aggregator, table: DescriptorTable, scrape_timeout: Duration) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            table,
            scrape_timeout,
            pass_lock: Arc::new(tokio::sync::Mutex::new(())),
            errors: Mutex::new(BTreeMap::new()),
        }
    }

    /// Wire up the API client and aggregator described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::new(config.credentials.clone(), config.request_timeout)?;

        let aggregator = match &config.dialect {
            Dialect::Cloud { workspace } => Aggregator::cloud(CloudApi::new(
                Paginator::new(client, config.max_pages),
                config.base_url.clone(),
                workspace.clone(),
            )),
            Dialect::Server => Aggregator::server(ServerApi::new(client, config.base_url.clone())),
        };

        Ok(Self::new(aggregator, DescriptorTable::new(&config.namespace), config.scrape_timeout))
    }

    /// Run one pass and build its snapshot. Upstream failures only ever degrade the snapshot.
    pub async fn scrape(&self) -> Snapshot {
        let guard = Arc::clone(&self.pass_lock).lock_owned().await;

        let started = Instant::now();
        let aggregator = Arc::clone(&self.aggregator);
        let outcome = run_guarded(guard, self.scrape_timeout, async move { aggregator.run().await }).await;
        let elapsed = started.elapsed();

        let mut builder = match outcome {
            Ok(output) => {
                self.count_failures(&output.health.failures);
                if !output.health.up {
                    log::warn!(
                        target: LOG_TARGET,
                        "Pass completed with {} failure(s) in {:.2}s",
                        output.health.failures.len(),
                        elapsed.as_secs_f64()
                    );
                }
                let mut builder = SnapshotBuilder::new(&self.table);
                builder.add_pass(&output);
                builder
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "Pass aborted after {:.2}s: {e}", elapsed.as_secs_f64());
                self.count_failures(&[e.failure()]);
                degraded(&self.table)
            }
        };

        builder.add_self_telemetry(&self.error_counts(), elapsed);
        builder.build()
    }

    /// Scrape and render in the text exposition format.
    pub async fn scrape_text(&self) -> String {
        let snapshot = self.scrape().await;
        render(&snapshot, &self.table)
    }

    fn count_failures(&self, failures: &[Failure]) {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        for failure in failures {
            *errors.entry((failure.kind, failure.component)).or_insert(0) += 1;
        }
    }

    fn error_counts(&self) -> BTreeMap<(ErrorKind, Component), u64> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Run a pass on its own task so a panic or the deadline cannot take the exporter down.
///
/// The task keeps `guard` until the pass settles, even if the caller stops waiting for it.
async fn run_guarded<F>(guard: OwnedMutexGuard<()>, deadline: Duration, pass: F) -> Result<PassOutput, PassError>
where
    F: Future<Output = Result<PassOutput, PassError>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let _guard = guard;
        match tokio::time::timeout(deadline, pass).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PassError::DeadlineExceeded(deadline)),
        }
    });

    match task.await {
        Ok(result) => result,
        Err(e) => Err(PassError::RuntimeFault(e.to_string())),
    }
}

/// HTTP routes: `/metrics` and a landing page at `/`.
pub fn router(exporter: Arc<Exporter>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .with_state(exporter)
}

async fn metrics(State(exporter): State<Arc<Exporter>>) -> impl IntoResponse {
    let body = exporter.scrape_text().await;
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}
