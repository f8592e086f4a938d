use strum::IntoStaticStr;

/// Failure of a single upstream API call or page walk.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (connect failure, timeout, broken body stream).
    #[error("request to '{url}' failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream rejected the credentials or denied access (401/403).
    #[error("request to '{url}' was rejected with status {status}")]
    Auth { url: String, status: u16 },

    /// Any other non-success status.
    #[error("request to '{url}' returned unexpected status {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// The body could not be decoded into the expected shape.
    #[error("could not decode response from '{url}'")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The `next` cursor chain revisited an address or exceeded the page budget.
    #[error("pagination did not terminate at '{url}' after {pages} page(s)")]
    PaginationLoop { url: String, pages: u32 },
}

impl FetchError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::UpstreamStatus { .. } => ErrorKind::UpstreamStatus,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::PaginationLoop { .. } => ErrorKind::PaginationLoop,
        }
    }

    /// HTTP status of the failed response, when there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(url: &str, status: u16) -> Self {
        if matches!(status, 401 | 403) {
            Self::Auth {
                url: url.to_string(),
                status,
            }
        } else {
            Self::UpstreamStatus {
                url: url.to_string(),
                status,
            }
        }
    }
}

/// Error classes reported through the `error_type` label of the error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Auth,
    UpstreamStatus,
    Decode,
    PaginationLoop,
    RuntimeFault,
    Deadline,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
