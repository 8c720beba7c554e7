//! Optional config file loading. Search order: ./liferake.toml, then
//! $XDG_CONFIG_HOME/liferake/config.toml (or ~/.config/liferake/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults,
/// and command-line flags override the file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Portal base URL, e.g. "https://portal.example.com".
    pub base_url: Option<String>,
    /// Site (group) id whose content is collected.
    pub site_id: Option<String>,
    /// Account used for authentication.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pre-obtained CSRF token; skips token discovery when set.
    pub csrf_token: Option<String>,
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Verify TLS certificates (default: true). Set to false for self-signed deployments.
    pub verify_ssl: Option<bool>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of HTTP attempts for failing requests (default 3).
    pub max_retries: Option<u32>,
    /// Delay in milliseconds between result pages.
    pub page_delay_ms: Option<u64>,
    /// Per-resource page sizes, as a [page_sizes] table.
    pub page_sizes: Option<PageSizeConfig>,
}

/// Page size overrides per resource type. Absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PageSizeConfig {
    pub structured_contents: Option<u32>,
    pub content_folders: Option<u32>,
    pub site_pages: Option<u32>,
    pub document_folders: Option<u32>,
    pub documents: Option<u32>,
}

/// Search order: (1) ./liferake.toml, (2) $XDG_CONFIG_HOME/liferake/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("liferake.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("liferake").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}
