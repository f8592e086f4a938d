use bitbucket_exporter::Result;
use bitbucket_exporter::config::{Config, DEFAULT_PORT, Dialect, RawConfig};
use bitbucket_exporter::exporter::{Exporter, router};
use bitbucket_exporter::hosting::DEFAULT_MAX_PAGES;
use bitbucket_exporter::metrics::DEFAULT_NAMESPACE;
use clap::{Args, ValueEnum};
use core::net::{Ipv4Addr, SocketAddr};
use core::time::Duration;
use ohno::IntoAppError;
use std::sync::Arc;

const LOG_TARGET: &str = "     serve";

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bitbucket Server base URL, or the Bitbucket Cloud API root [default for Cloud: https://api.bitbucket.org/2.0]
    #[arg(long, value_name = "URL", env = "BITBUCKET_URL")]
    pub url: Option<String>,

    /// Username for HTTP basic auth
    #[arg(long, value_name = "USER", env = "BITBUCKET_USERNAME")]
    pub username: Option<String>,

    /// Password or app password for HTTP basic auth
    #[arg(long, value_name = "PASSWORD", env = "BITBUCKET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bitbucket Cloud workspace [default: the username]
    #[arg(long, value_name = "WORKSPACE", env = "BITBUCKET_WORKSPACE")]
    pub workspace: Option<String>,

    /// Talk to Bitbucket Cloud instead of Bitbucket Server
    #[arg(long, env = "BITBUCKET_CLOUD")]
    pub cloud: bool,

    /// Port to serve metrics on
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_PORT, env = "BITBUCKET_EXPORTER_PORT")]
    pub port: u16,

    /// Upper bound on the duration of one scrape, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 120, env = "BITBUCKET_SCRAPE_TIMEOUT")]
    pub scrape_timeout: u64,

    /// Upper bound on the duration of one API request, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30, env = "BITBUCKET_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Maximum number of pages fetched for one collection
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_MAX_PAGES, env = "BITBUCKET_MAX_PAGES")]
    pub max_pages: u32,

    /// Prefix of every metric name
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_NAMESPACE, env = "BITBUCKET_METRIC_NAMESPACE")]
    pub namespace: String,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

impl ServeArgs {
    fn raw_config(&self) -> RawConfig {
        RawConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            workspace: self.workspace.clone(),
            cloud: self.cloud,
            port: self.port,
            scrape_timeout: Duration::from_secs(self.scrape_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            max_pages: self.max_pages,
            namespace: self.namespace.clone(),
        }
    }
}

pub async fn serve(args: &ServeArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::resolve(args.raw_config())?;
    let exporter = Arc::new(Exporter::from_config(&config)?);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_app_err_with(|| format!("unable to listen on {addr}"))?;

    match &config.dialect {
        Dialect::Cloud { workspace } => {
            log::info!(target: LOG_TARGET, "Serving Bitbucket Cloud workspace '{workspace}' metrics on {addr}/metrics");
        }
        Dialect::Server => {
            log::info!(target: LOG_TARGET, "Serving Bitbucket Server '{}' metrics on {addr}/metrics", config.base_url);
        }
    }

    axum::serve(listener, router(exporter))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!(target: LOG_TARGET, "Shutdown signal received");
        })
        .await
        .into_app_err("metrics server failed")
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}
