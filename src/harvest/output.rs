//! JSON dataset persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Directory the run writes its dataset and summary files into.
#[derive(Debug)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write `data` as pretty-printed JSON. The write goes to a
    /// temporary file first and renames into place, so an interrupted
    /// run never leaves a truncated dataset behind.
    pub fn write_json<T: Serialize>(&self, file_name: &str, data: &T) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let rendered = serde_json::to_string_pretty(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let path = self.root.join(file_name);
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, rendered)?;
        fs::rename(&temp, &path)?;
        Ok(path)
    }
}

/// Restrict a name to characters safe in a file name, truncated to keep
/// paths short.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect()
}

/// File name for one folder's document dataset.
pub fn folder_file_name(folder_id: i64, folder_name: &str) -> String {
    format!(
        "documents_folder_{}_{}.json",
        folder_id,
        sanitize_component(folder_name)
    )
}
