//! Validated exporter settings.

use crate::Result;
use crate::hosting::{Credentials, DEFAULT_CLOUD_API_ROOT, DEFAULT_MAX_PAGES};
use crate::metrics::DEFAULT_NAMESPACE;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use url::Url;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which Bitbucket API the exporter talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    Cloud { workspace: String },
    Server,
}

/// Settings as supplied by the user, before validation.
#[derive(Debug, Clone)]
pub struct RawConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub workspace: Option<String>,
    pub cloud: bool,
    pub port: u16,
    pub scrape_timeout: Duration,
    pub request_timeout: Duration,
    pub max_pages: u32,
    pub namespace: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            workspace: None,
            cloud: false,
            port: DEFAULT_PORT,
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub dialect: Dialect,
    pub base_url: Url,
    pub credentials: Option<Credentials>,
    pub port: u16,
    pub scrape_timeout: Duration,
    pub request_timeout: Duration,
    pub max_pages: u32,
    pub namespace: String,
}

impl Config {
    pub fn resolve(raw: RawConfig) -> Result<Self> {
        let username = raw.username.filter(|u| !u.is_empty());
        let password = raw.password.filter(|p| !p.is_empty());

        let credentials = match (username, password) {
            (Some(username), password) => Some(Credentials { username, password }),
            (None, Some(_)) => bail!("a password was given without a username"),
            (None, None) => None,
        };

        let url = raw.url.filter(|u| !u.is_empty());
        let (dialect, url) = if raw.cloud {
            let workspace = raw
                .workspace
                .filter(|w| !w.is_empty())
                .or_else(|| credentials.as_ref().map(|c| c.username.clone()));
            let Some(workspace) = workspace else {
                bail!("Bitbucket Cloud needs a workspace, either explicitly or through the username");
            };
            (Dialect::Cloud { workspace }, url.unwrap_or_else(|| DEFAULT_CLOUD_API_ROOT.to_string()))
        } else {
            let Some(url) = url else {
                bail!("Bitbucket Server needs a base URL");
            };
            (Dialect::Server, url)
        };

        let base_url = Url::parse(&url).into_app_err_with(|| format!("invalid base URL '{url}'"))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            bail!("base URL '{url}' must be an absolute http or https URL");
        }

        if raw.scrape_timeout.is_zero() {
            bail!("the scrape timeout must be greater than zero");
        }
        if raw.request_timeout.is_zero() {
            bail!("the request timeout must be greater than zero");
        }
        if raw.max_pages == 0 {
            bail!("the page budget must be greater than zero");
        }
        if !is_valid_namespace(&raw.namespace) {
            bail!("'{}' is not a valid metric namespace", raw.namespace);
        }

        Ok(Self {
            dialect,
            base_url,
            credentials,
            port: raw.port,
            scrape_timeout: raw.scrape_timeout,
            request_timeout: raw.request_timeout,
            max_pages: raw.max_pages,
            namespace: raw.namespace,
        })
    }
}

/// Metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`; an empty namespace means no prefix.
fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        None => true,
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_' || first == ':') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
    }
}
