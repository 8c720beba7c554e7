//! CLI parsing and orchestration. Parses args, resolves the layered
//! configuration (flags over config file over defaults), runs the
//! collection, and maps errors to exit codes.

use crate::client::{
    ClientError, Credentials, HttpSession, RequestExecutor, ThreadSleeper, Transport,
    DEFAULT_MAX_ATTEMPTS,
};
use crate::config::{self, Config};
use crate::harvest::output::OutputDir;
use crate::harvest::resources::{PageSizes, ResourceKind, Selection};
use crate::harvest::{HarvestError, Harvester};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("{0}")]
    Harvest(#[from] HarvestError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Client(_) => 1,
            CliRunError::Harvest(_) => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "liferake")]
#[command(about = "Collect content from a Liferay headless-delivery API into JSON files")]
#[command(
    after_help = "Config file keys (base_url, site_id, username, password, csrf_token, output_dir, verify_ssl, user_agent, timeout_secs, max_retries, page_delay_ms, page_sizes) are documented in the README. CLI flags override config."
)]
pub struct Args {
    /// Portal base URL, e.g. https://portal.example.com.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Site (group) id whose content is collected.
    #[arg(long)]
    pub site_id: Option<String>,

    /// Account username (overrides config).
    #[arg(short, long)]
    pub username: Option<String>,

    /// Account password (overrides config).
    #[arg(short, long)]
    pub password: Option<String>,

    /// Pre-obtained CSRF token; skips token discovery.
    #[arg(long)]
    pub csrf_token: Option<String>,

    /// Output directory. Default: ./liferay_data.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Collect every resource type.
    #[arg(long)]
    pub all: bool,

    /// Collect structured contents.
    #[arg(long)]
    pub structured_contents: bool,

    /// Collect structured-content folders.
    #[arg(long)]
    pub content_folders: bool,

    /// Collect site pages.
    #[arg(long)]
    pub site_pages: bool,

    /// Collect document folders.
    #[arg(long)]
    pub document_folders: bool,

    /// Collect documents (needs --document-folders or --all for the folder list).
    #[arg(long)]
    pub documents: bool,

    /// Skip TLS certificate verification (for self-signed deployments).
    #[arg(long, conflicts_with = "verify_ssl")]
    pub no_ssl: bool,

    /// Force TLS certificate verification even when config disables it.
    #[arg(long)]
    pub verify_ssl: bool,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per request (overrides config; default 3).
    #[arg(long, value_parser = parse_max_retries)]
    pub max_retries: Option<u32>,

    /// Delay between result pages in milliseconds (overrides config; default 500).
    #[arg(long)]
    pub page_delay_ms: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Print the resolved configuration and selection without collecting.
    #[arg(long)]
    pub dry_run: bool,

    /// Print per-request detail.
    #[arg(long)]
    pub verbose: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_max_retries(s: &str) -> Result<u32, String> {
    let n: u32 = s
        .parse()
        .map_err(|_| format!("Invalid --max-retries: '{}' is not a number", s))?;
    if n == 0 {
        return Err("Invalid --max-retries: must be at least 1".to_string());
    }
    Ok(n)
}

/// Install the log subscriber. Quiet shows errors only; verbose adds
/// per-request detail. RUST_LOG overrides both.
pub fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        EnvFilter::new("liferake=error")
    } else if verbose {
        EnvFilter::new("liferake=debug,info")
    } else {
        EnvFilter::new("liferake=info,warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or(default);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn selection_from_args(args: &Args) -> Selection {
    if args.all {
        return Selection::all();
    }
    Selection {
        structured_contents: args.structured_contents,
        content_folders: args.content_folders,
        site_pages: args.site_pages,
        document_folders: args.document_folders,
        documents: args.documents,
    }
}

fn selected_labels(selection: Selection) -> Vec<&'static str> {
    ResourceKind::ALL
        .iter()
        .filter(|kind| selection.includes(**kind))
        .map(|kind| kind.label())
        .collect()
}

/// TLS verification: --no-ssl wins, then --verify-ssl, then config,
/// then on.
fn resolve_verify_tls(no_ssl: bool, verify_ssl: bool, config: Option<&Config>) -> bool {
    if no_ssl {
        return false;
    }
    if verify_ssl {
        return true;
    }
    config.and_then(|c| c.verify_ssl).unwrap_or(true)
}

fn effective_page_sizes(config: Option<&Config>) -> PageSizes {
    let mut sizes = PageSizes::default();
    if let Some(overrides) = config.and_then(|c| c.page_sizes.as_ref()) {
        if let Some(n) = overrides.structured_contents {
            sizes.structured_contents = n;
        }
        if let Some(n) = overrides.content_folders {
            sizes.content_folders = n;
        }
        if let Some(n) = overrides.site_pages {
            sizes.site_pages = n;
        }
        if let Some(n) = overrides.document_folders {
            sizes.document_folders = n;
        }
        if let Some(n) = overrides.documents {
            sizes.documents = n;
        }
    }
    sizes
}

fn require(
    value: Option<String>,
    what: &str,
    flag: &str,
    config_key: &str,
) -> Result<String, CliRunError> {
    value.ok_or_else(|| {
        CliRunError::InvalidInput(format!(
            "Missing {}. Pass {} or set {} in the config file.",
            what, flag, config_key
        ))
    })
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    let base_url = require(
        args.base_url
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.base_url.clone())),
        "base URL",
        "--base-url",
        "base_url",
    )?;
    let site_id = require(
        args.site_id
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.site_id.clone())),
        "site id",
        "--site-id",
        "site_id",
    )?;
    let username = require(
        args.username
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.username.clone())),
        "username",
        "--username",
        "username",
    )?;
    let password = require(
        args.password
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.password.clone())),
        "password",
        "--password",
        "password",
    )?;

    let selection = selection_from_args(args);
    if selection.is_empty() {
        return Err(CliRunError::InvalidInput(
            "No resource selected. Pass --all or at least one of --structured-contents, \
             --content-folders, --site-pages, --document-folders, --documents."
                .to_string(),
        ));
    }

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_PAGE_DELAY_MS: u64 = 500;
    let output_dir: PathBuf = args
        .output_dir
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("liferay_data"));
    let verify_tls = resolve_verify_tls(args.no_ssl, args.verify_ssl, config.as_ref());
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_retries = args
        .max_retries
        .or_else(|| config.as_ref().and_then(|c| c.max_retries))
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
        .max(1);
    let page_delay_ms = args
        .page_delay_ms
        .or_else(|| config.as_ref().and_then(|c| c.page_delay_ms))
        .unwrap_or(DEFAULT_PAGE_DELAY_MS);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));
    let csrf_token = args
        .csrf_token
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.csrf_token.clone()));
    let page_sizes = effective_page_sizes(config.as_ref());

    if args.dry_run {
        println!("Base URL: {}", base_url);
        println!("Site id: {}", site_id);
        println!("Username: {}", username);
        println!("Output directory: {}", output_dir.display());
        println!(
            "TLS verification: {}",
            if verify_tls { "on" } else { "off" }
        );
        println!(
            "Timeout: {}s, retries: {}, page delay: {}ms",
            timeout_secs, max_retries, page_delay_ms
        );
        println!("Selected: {}", selected_labels(selection).join(", "));
        return Ok(());
    }

    if !verify_tls {
        warn!("TLS certificate verification is disabled");
    }

    let mut builder = HttpSession::builder(&base_url)
        .timeout_secs(timeout_secs)
        .verify_tls(verify_tls);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let mut session = builder.build()?;
    if let Some(token) = csrf_token {
        session.set_csrf_token(token);
    }

    let credentials = Credentials { username, password };
    let mut executor =
        RequestExecutor::new(session, Some(credentials), max_retries, ThreadSleeper);
    executor.authenticate();

    let mut harvester = Harvester::new(
        executor,
        site_id,
        OutputDir::new(output_dir),
        page_sizes,
        Duration::from_millis(page_delay_ms),
        verify_tls,
    );
    harvester.run(selection)?;
    Ok(())
}
