//! Cursor-paginated collection walker.
//!
//! Every collection endpoint is walked by following the server-supplied `next`
//! address verbatim. The walker guards against cursor chains that never end: a
//! revisited address or a chain longer than the page budget fails with
//! [`FetchError::PaginationLoop`].

use super::{Client, FetchError};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

const LOG_TARGET: &str = " paginator";

/// Default upper bound on pages fetched for one collection.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// A decoded page of a collection: the item decoder and cursor extractor used by [`Paginator`].
pub trait Paged: DeserializeOwned + Send {
    type Item: Send;

    /// Address of the following page, if any.
    fn next_page(&self) -> Option<&str>;

    /// Total number of items in the collection, when the server reports it.
    fn reported_size(&self) -> Option<u64>;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Bitbucket Cloud paginated envelope.
#[derive(Debug, Deserialize)]
pub struct CloudPage<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl<T: DeserializeOwned + Send> Paged for CloudPage<T> {
    type Item = T;

    fn next_page(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| !next.is_empty())
    }

    fn reported_size(&self) -> Option<u64> {
        self.size
    }

    fn into_items(self) -> Vec<T> {
        self.values
    }
}

struct WalkState {
    next: Option<String>,
    visited: HashSet<String>,
    pages: u32,
}

impl WalkState {
    fn start(url: &str) -> Self {
        Self {
            next: Some(url.to_string()),
            visited: HashSet::new(),
            pages: 0,
        }
    }

    /// State after `first` was fetched from `url` outside the walk.
    fn resume<P: Paged>(url: &str, first: &P) -> Self {
        Self {
            next: first.next_page().map(str::to_string),
            visited: HashSet::from([url.to_string()]),
            pages: 1,
        }
    }
}

/// Walks cursor-linked pages through a shared [`Client`].
#[derive(Debug, Clone)]
pub struct Paginator {
    client: Client,
    max_pages: u32,
}

impl Paginator {
    #[must_use]
    pub const fn new(client: Client, max_pages: u32) -> Self {
        Self { client, max_pages }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Decode the first page only.
    pub async fn first_page<P: Paged>(&self, url: &str) -> Result<P, FetchError> {
        self.client.get_json(url).await
    }

    /// Lazily walk the collection starting at `url`, yielding one item at a time.
    ///
    /// Pages are fetched on demand; dropping the stream stops the traversal.
    pub fn walk<P>(&self, url: &str) -> impl Stream<Item = Result<P::Item, FetchError>> + Send + '_
    where
        P: Paged + 'static,
    {
        self.walk_from::<P>(WalkState::start(url))
    }

    fn walk_from<P>(&self, state: WalkState) -> impl Stream<Item = Result<P::Item, FetchError>> + Send + '_
    where
        P: Paged + 'static,
    {
        stream::try_unfold(state, move |mut state| async move {
            let Some(url) = state.next.take() else {
                return Ok(None);
            };

            if state.pages >= self.max_pages || state.visited.contains(&url) {
                log::warn!(target: LOG_TARGET, "Cursor chain did not terminate at '{url}' after {} page(s)", state.pages);
                return Err(FetchError::PaginationLoop { url, pages: state.pages });
            }

            let page: P = self.client.get_json(&url).await?;
            state.pages += 1;
            state.next = page.next_page().map(str::to_string);
            let _ = state.visited.insert(url);

            Ok(Some((page.into_items(), state)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, FetchError>)))
        .try_flatten()
    }

    /// Walk the collection to exhaustion and collect every item.
    pub async fn collect_all<P>(&self, url: &str) -> Result<Vec<P::Item>, FetchError>
    where
        P: Paged + 'static,
    {
        self.walk::<P>(url).try_collect().await
    }

    /// Number of items in a collection.
    ///
    /// Uses the page-1 `size` field when the server reports one, and otherwise
    /// walks the rest of the collection counting items. Every page is fetched once.
    pub async fn count<P>(&self, url: &str) -> Result<u64, FetchError>
    where
        P: Paged + 'static,
    {
        let first: P = self.first_page(url).await?;
        if let Some(size) = first.reported_size() {
            return Ok(size);
        }

        log::debug!(target: LOG_TARGET, "No size reported by '{url}', walking the collection");
        let rest = WalkState::resume(url, &first);
        stream::iter(first.into_items().into_iter().map(Ok))
            .chain(self.walk_from::<P>(rest))
            .try_fold(0_u64, |count, _| async move { Ok(count + 1) })
            .await
    }
}
