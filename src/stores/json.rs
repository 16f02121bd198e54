//! Minimal JSON-file persistence shared by the record stores.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::types::CourseError;

/// A directory of `<name>.json` records.
#[derive(Clone, Debug)]
pub struct JsonDirectory {
    root: PathBuf,
}

impl JsonDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }

    pub async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CourseError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).await?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|err| CourseError::Storage(format!("corrupt record {}: {err}", path.display())))
    }

    pub async fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CourseError> {
        fs::create_dir_all(&self.root).await?;
        let serialized = serde_json::to_string_pretty(value)
            .map_err(|err| CourseError::Storage(err.to_string()))?;
        fs::write(self.path_for(name), serialized).await?;
        Ok(())
    }

    /// Removes a record; returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool, CourseError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }

    /// Names of all stored records (file stems), unsorted.
    pub async fn list_names(&self) -> Result<Vec<String>, CourseError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }
}
