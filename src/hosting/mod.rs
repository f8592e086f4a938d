//! Access to the Bitbucket REST APIs.
//!
//! [`Client`] is the authenticated GET capability, [`Paginator`] walks cursor-linked
//! collections on top of it, and [`CloudApi`] / [`ServerApi`] know the endpoints of
//! each API dialect.

mod client;
mod cloud;
mod fetch_error;
mod paginator;
mod server;

pub use client::{Client, Credentials};
pub use cloud::{
    BranchRestriction, CloudApi, Commit, CommitAuthor, CommitTally, DEFAULT_CLOUD_API_ROOT, Project, ProjectRef, RateLimitBucket,
    Repository, RepositoryInfo,
};
pub use fetch_error::{ErrorKind, FetchError};
pub use paginator::{CloudPage, DEFAULT_MAX_PAGES, Paged, Paginator};
pub use server::ServerApi;
