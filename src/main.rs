//! Prometheus exporter for Bitbucket Cloud and Bitbucket Server.
//!
//! # Overview
//!
//! `bitbucket-exporter` serves a `/metrics` endpoint. Every scrape walks the Bitbucket API once
//! and reports what it found: project and repository counts, open pull requests, and for
//! Bitbucket Cloud a per-repository breakdown of commits, committers, tags, branches, webhooks,
//! branch restrictions and open issues, plus the API rate-limit buckets.
//!
//! # Usage
//!
//! **Bitbucket Cloud:**
//! ```bash
//! bitbucket-exporter --cloud --username alice --password "$APP_PASSWORD" --workspace acme
//! ```
//!
//! **Bitbucket Server / Data Center:**
//! ```bash
//! bitbucket-exporter --url https://bitbucket.example.com --username alice --password "$TOKEN"
//! ```
//!
//! Every flag can also be given through its environment variable (`BITBUCKET_URL`,
//! `BITBUCKET_USERNAME`, `BITBUCKET_PASSWORD`, `BITBUCKET_WORKSPACE`, `BITBUCKET_CLOUD`,
//! `BITBUCKET_EXPORTER_PORT`, ...). Run with `--help` for the full list.
//!
//! # Failure Handling
//!
//! `/metrics` always answers with HTTP 200. When the Bitbucket API misbehaves the snapshot is
//! degraded instead: `bitbucket_exporter_up` drops to 0, the failing series are left out, and
//! `bitbucket_exporter_errors_total` counts what went wrong by error type and component.
//!
//! A scrape that lists projects or repositories unsuccessfully reports only the exporter's own
//! metrics. A scrape where individual repository lookups fail still reports everything else.
//!
//! # Cardinality
//!
//! `bitbucket_user_commits` has one series per committer and repository. On large workspaces
//! with many contributors this can grow large; drop it with a relabeling rule if needed.

use bitbucket_exporter::Result;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

mod commands;

use crate::commands::{ServeArgs, serve};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "bitbucket-exporter", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    serve(&cli.serve).await
}
