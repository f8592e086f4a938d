//! Bitbucket API client
//!
//! Thin authenticated GET capability shared by both API dialects. Everything above
//! this layer sees either a decoded body or a classified [`FetchError`].

use super::FetchError;
use core::time::Duration;
use serde::de::DeserializeOwned;

const LOG_TARGET: &str = "    client";
const USER_AGENT: &str = "bitbucket-exporter";

/// Credentials for HTTP basic auth.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Bitbucket API client (Cloud or Server).
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl Client {
    /// Create a new API client with optional basic-auth credentials.
    pub fn new(credentials: Option<Credentials>, request_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client, credentials })
    }

    /// Issue an authenticated GET and decode a successful JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        log::debug!(target: LOG_TARGET, "GET {url}");

        let mut request = self.client.get(url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        let resp = request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            log::debug!(target: LOG_TARGET, "GET {url} returned {status}");
            return Err(FetchError::from_status(url, status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
