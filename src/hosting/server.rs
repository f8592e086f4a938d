//! Bitbucket Server / Data Center 1.0 endpoints.
//!
//! Only instance-wide totals are read; each comes from page 1 of a `limit=1` query.

use super::{Client, FetchError};
use serde::Deserialize;
use url::Url;

/// Page envelope of the 1.0 API, reduced to the counting fields.
#[derive(Debug, Deserialize)]
struct CountEnvelope {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
}

/// Collection total read from a page: `total` when present, else `size`.
///
/// A page carrying neither fails to decode rather than reading as zero.
#[derive(Debug, Deserialize)]
#[serde(try_from = "CountEnvelope")]
struct ServerCount(u64);

impl TryFrom<CountEnvelope> for ServerCount {
    type Error = &'static str;

    fn try_from(envelope: CountEnvelope) -> Result<Self, Self::Error> {
        envelope
            .total
            .or(envelope.size)
            .map(Self)
            .ok_or("page reports neither `total` nor `size`")
    }
}

#[derive(Debug, Clone)]
pub struct ServerApi {
    client: Client,
    base: Url,
}

impl ServerApi {
    #[must_use]
    pub const fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn url(&self, collection: &str, query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.pop_if_empty().extend(["rest", "api", "1.0", collection]);
        }
        let _ = url.query_pairs_mut().extend_pairs(query);
        url.into()
    }

    async fn total(&self, collection: &str, query: &[(&str, &str)]) -> Result<u64, FetchError> {
        let count: ServerCount = self.client.get_json(&self.url(collection, query)).await?;
        Ok(count.0)
    }

    pub async fn repository_total(&self) -> Result<u64, FetchError> {
        self.total("repos", &[("limit", "1")]).await
    }

    pub async fn project_total(&self) -> Result<u64, FetchError> {
        self.total("projects", &[("limit", "1")]).await
    }

    pub async fn user_total(&self) -> Result<u64, FetchError> {
        self.total("users", &[("limit", "1")]).await
    }

    pub async fn open_pull_request_total(&self) -> Result<u64, FetchError> {
        self.total("pull-requests", &[("state", "OPEN"), ("limit", "1")]).await
    }
}
