//! Collection run orchestration.
//!
//! A run probes the API for access, walks the selected resource types in
//! a fixed order, writes each non-empty dataset to disk, and finishes
//! with a summary document. Request failures degrade the run (partial
//! datasets, counted errors) rather than aborting it; only an API that
//! never answers or a disk that refuses writes ends a run early.

pub mod output;
pub mod resources;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::pages::Paginator;
use crate::client::request::{RequestExecutor, Sleeper};
use crate::client::session::Transport;
use crate::model::{Record, RunStats, RunSummary, SummaryConfiguration, SummaryStatistics};
use output::{folder_file_name, OutputDir};
use resources::{documents_endpoint, PageSizes, ResourceKind, Selection};

pub const SUMMARY_FILE: &str = "summary_report.json";

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("No API endpoint responded; check base URL, credentials, and permissions.")]
    NoApiAccess,
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Lifecycle of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    AccessChecking,
    Collecting,
    Summarizing,
    Done,
    Failed,
}

/// Drives one collection run against one site.
pub struct Harvester<T: Transport, S: Sleeper> {
    executor: RequestExecutor<T, S>,
    site_id: String,
    output: OutputDir,
    page_sizes: PageSizes,
    page_delay: Duration,
    stats: RunStats,
    phase: RunPhase,
    verify_tls: bool,
}

impl<T: Transport, S: Sleeper> Harvester<T, S> {
    pub fn new(
        executor: RequestExecutor<T, S>,
        site_id: impl Into<String>,
        output: OutputDir,
        page_sizes: PageSizes,
        page_delay: Duration,
        verify_tls: bool,
    ) -> Self {
        Self {
            executor,
            site_id: site_id.into(),
            output,
            page_sizes,
            page_delay,
            stats: RunStats::new(),
            phase: RunPhase::NotStarted,
            verify_tls,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn executor(&self) -> &RequestExecutor<T, S> {
        &self.executor
    }

    /// Run the full collection: access check, selected resources in
    /// catalog order, then the summary. The summary is still attempted
    /// when collection fails partway, so interrupted runs leave a
    /// record of what they managed.
    pub fn run(&mut self, selection: Selection) -> Result<(), HarvestError> {
        info!("starting collection for site {}", self.site_id);
        self.phase = RunPhase::AccessChecking;
        if !self.check_access() {
            error!("no API endpoint answered the access probes");
            self.phase = RunPhase::Failed;
            return Err(HarvestError::NoApiAccess);
        }
        self.phase = RunPhase::Collecting;
        match self.collect_selected(selection) {
            Ok(()) => {
                self.phase = RunPhase::Summarizing;
                if let Err(e) = self.summarize() {
                    self.phase = RunPhase::Failed;
                    return Err(e);
                }
                self.phase = RunPhase::Done;
                Ok(())
            }
            Err(e) => {
                error!("collection failed: {}", e);
                self.phase = RunPhase::Failed;
                if let Err(summary_error) = self.summarize() {
                    warn!("could not write summary after failure: {}", summary_error);
                }
                Err(e)
            }
        }
    }

    fn check_access(&mut self) -> bool {
        for path in resources::access_probes(&self.site_id) {
            if self.executor.execute(&path, &[]).is_some() {
                info!("API access confirmed via {}", path);
                return true;
            }
        }
        false
    }

    fn collect_selected(&mut self, selection: Selection) -> Result<(), HarvestError> {
        let mut folders: Vec<Record> = Vec::new();
        for kind in [
            ResourceKind::StructuredContents,
            ResourceKind::ContentFolders,
            ResourceKind::SitePages,
            ResourceKind::DocumentFolders,
        ] {
            if !selection.includes(kind) {
                continue;
            }
            let records = self.collect_listing(kind);
            *self.stat_slot(kind) = records.len() as u64;
            self.persist(kind, &records)?;
            if kind == ResourceKind::DocumentFolders {
                folders = records;
            }
        }
        if selection.includes(ResourceKind::Documents) {
            if !selection.includes(ResourceKind::DocumentFolders) {
                warn!("documents require document folders in the same run; skipping documents");
            } else if folders.is_empty() {
                info!("no document folders found; skipping documents");
            } else {
                self.collect_documents(&folders)?;
            }
        }
        Ok(())
    }

    fn collect_listing(&mut self, kind: ResourceKind) -> Vec<Record> {
        let path = match kind.listing_endpoint(&self.site_id) {
            Some(path) => path,
            None => return Vec::new(),
        };
        info!("collecting {}", kind.label());
        let page_size = self.page_sizes.for_kind(kind);
        Paginator::new(&mut self.executor, self.page_delay).collect_all(
            &path,
            kind.label(),
            page_size,
        )
    }

    fn collect_documents(&mut self, folders: &[Record]) -> Result<(), HarvestError> {
        info!("collecting documents from {} folders", folders.len());
        let mut all_documents: Vec<Record> = Vec::new();
        for (index, folder) in folders.iter().enumerate() {
            let folder_id = match folder.get("id").and_then(Value::as_i64) {
                Some(id) => id,
                None => {
                    warn!("document folder without a numeric id; skipping it");
                    continue;
                }
            };
            let folder_name = folder
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("folder_{}", folder_id));
            info!(
                "folder {}/{}: {}",
                index + 1,
                folders.len(),
                folder_name
            );
            let path = documents_endpoint(folder_id);
            let label = format!("documents in {}", folder_name);
            let page_size = self.page_sizes.for_kind(ResourceKind::Documents);
            let mut documents = Paginator::new(&mut self.executor, self.page_delay)
                .collect_all(&path, &label, page_size);
            let origin = json!({"id": folder_id, "name": folder_name});
            for document in &mut documents {
                document.insert("source_folder".to_string(), origin.clone());
            }
            if !documents.is_empty() {
                let file_name = folder_file_name(folder_id, &folder_name);
                let written = self.write(&file_name, &documents)?;
                info!("saved {} documents to {}", documents.len(), written.display());
            }
            all_documents.extend(documents);
        }
        self.stats.documents = all_documents.len() as u64;
        self.persist(ResourceKind::Documents, &all_documents)
    }

    fn stat_slot(&mut self, kind: ResourceKind) -> &mut u64 {
        match kind {
            ResourceKind::StructuredContents => &mut self.stats.structured_contents,
            ResourceKind::ContentFolders => &mut self.stats.content_folders,
            ResourceKind::SitePages => &mut self.stats.site_pages,
            ResourceKind::DocumentFolders => &mut self.stats.document_folders,
            ResourceKind::Documents => &mut self.stats.documents,
        }
    }

    /// Write the dataset for one resource type. Empty datasets leave no
    /// file behind.
    fn persist(&self, kind: ResourceKind, records: &[Record]) -> Result<(), HarvestError> {
        if records.is_empty() {
            debug!("no {} collected; not writing a file", kind.label());
            return Ok(());
        }
        let path = self.write(kind.file_name(), &records)?;
        info!("saved {} {} to {}", records.len(), kind.label(), path.display());
        Ok(())
    }

    fn write<D: Serialize>(&self, file_name: &str, data: &D) -> Result<PathBuf, HarvestError> {
        self.output
            .write_json(file_name, data)
            .map_err(|source| HarvestError::WriteFailed {
                path: self.output.path().join(file_name),
                source,
            })
    }

    fn summarize(&mut self) -> Result<(), HarvestError> {
        let summary = RunSummary {
            collected_at: Local::now().to_rfc3339(),
            duration_seconds: self.stats.elapsed_seconds(),
            statistics: SummaryStatistics {
                structured_contents: self.stats.structured_contents,
                content_folders: self.stats.content_folders,
                site_pages: self.stats.site_pages,
                document_folders: self.stats.document_folders,
                documents: self.stats.documents,
                errors: self.executor.errors(),
            },
            configuration: SummaryConfiguration {
                base_url: self.executor.transport().base_url().to_string(),
                site_id: self.site_id.clone(),
                output_dir: self.output.path().display().to_string(),
                username: self.executor.username().map(str::to_string),
                verify_ssl: self.verify_tls,
                csrf_token_obtained: self.executor.transport().csrf_token().is_some(),
            },
        };
        let path = self.write(SUMMARY_FILE, &summary)?;
        info!("collection finished in {:.1}s", summary.duration_seconds);
        info!("  structured contents: {}", summary.statistics.structured_contents);
        info!("  content folders: {}", summary.statistics.content_folders);
        info!("  site pages: {}", summary.statistics.site_pages);
        info!("  document folders: {}", summary.statistics.document_folders);
        info!("  documents: {}", summary.statistics.documents);
        info!("  request errors: {}", summary.statistics.errors);
        info!("summary written to {}", path.display());
        Ok(())
    }
}
