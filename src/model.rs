//! Shared data shapes: API list envelopes, run counters, and the
//! summary document written at the end of a run.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One API record, kept as the raw JSON object so nothing the server
/// sends is lost on the way to disk.
pub type Record = serde_json::Map<String, Value>;

fn default_last_page() -> u64 {
    1
}

/// List envelope returned by the headless-delivery collection endpoints.
/// Missing fields decode to an empty first-and-only page.
#[derive(Debug, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub items: Vec<Record>,
    #[serde(rename = "totalCount", default)]
    pub total_count: u64,
    #[serde(rename = "lastPage", default = "default_last_page")]
    pub last_page: u64,
    #[serde(default)]
    pub page: u64,
}

impl PageEnvelope {
    /// Decode an envelope, treating payloads of any other shape as an
    /// empty dataset.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|_| Self {
            items: Vec::new(),
            total_count: 0,
            last_page: 1,
            page: 0,
        })
    }
}

/// Per-resource record counts accumulated over one run.
#[derive(Debug)]
pub struct RunStats {
    pub structured_contents: u64,
    pub content_folders: u64,
    pub site_pages: u64,
    pub document_folders: u64,
    pub documents: u64,
    started: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            structured_contents: 0,
            content_folders: 0,
            site_pages: 0,
            document_folders: 0,
            documents: 0,
            started: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of `summary_report.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub collected_at: String,
    pub duration_seconds: f64,
    pub statistics: SummaryStatistics,
    pub configuration: SummaryConfiguration,
}

#[derive(Debug, Serialize)]
pub struct SummaryStatistics {
    pub structured_contents: u64,
    pub content_folders: u64,
    pub site_pages: u64,
    pub document_folders: u64,
    pub documents: u64,
    pub errors: u64,
}

#[derive(Debug, Serialize)]
pub struct SummaryConfiguration {
    pub base_url: String,
    pub site_id: String,
    pub output_dir: String,
    pub username: Option<String>,
    pub verify_ssl: bool,
    pub csrf_token_obtained: bool,
}
