//! File-backed CRUD for course configs.

use std::path::Path;

use chrono::Utc;

use crate::models::{CourseConfig, CreateCourseRequest, UpdateCourseRequest};
use crate::stores::json::JsonDirectory;
use crate::types::CourseError;

/// Stores one JSON record per course config under `<data_dir>/configs/`.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    dir: JsonDirectory,
}

impl ConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: JsonDirectory::new(data_dir.as_ref().join("configs")),
        }
    }

    /// Creates a config with a filesystem-safe slug ID derived from its
    /// name; collisions get a numeric suffix.
    pub async fn create(&self, request: CreateCourseRequest) -> Result<CourseConfig, CourseError> {
        let id = self.generate_id(&request.name);
        let now = Utc::now();
        let config = CourseConfig {
            id,
            name: request.name,
            settings: request.settings,
            instructions: request.instructions,
            linked_pages: request.linked_pages,
            created_at: now,
            updated_at: now,
        };
        self.dir.write(&config.id, &config).await?;
        Ok(config)
    }

    pub async fn get(&self, config_id: &str) -> Result<Option<CourseConfig>, CourseError> {
        self.dir.read(config_id).await
    }

    /// All stored configs, most recently updated first. Corrupt records
    /// are skipped with a warning rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<CourseConfig>, CourseError> {
        let mut configs = Vec::new();
        for name in self.dir.list_names().await? {
            match self.dir.read::<CourseConfig>(&name).await {
                Ok(Some(config)) => configs.push(config),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(record = %name, error = %err, "skipping unreadable config");
                }
            }
        }
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(configs)
    }

    /// Applies the provided fields and bumps `updated_at`; `None` when the
    /// config does not exist.
    pub async fn update(
        &self,
        config_id: &str,
        request: UpdateCourseRequest,
    ) -> Result<Option<CourseConfig>, CourseError> {
        let Some(mut config) = self.dir.read::<CourseConfig>(config_id).await? else {
            return Ok(None);
        };
        if let Some(name) = request.name {
            config.name = name;
        }
        if let Some(settings) = request.settings {
            config.settings = settings;
        }
        if let Some(instructions) = request.instructions {
            config.instructions = instructions;
        }
        if let Some(linked_pages) = request.linked_pages {
            config.linked_pages = linked_pages;
        }
        config.updated_at = Utc::now();
        self.dir.write(config_id, &config).await?;
        Ok(Some(config))
    }

    /// Removes the config record; returns whether it existed.
    pub async fn delete(&self, config_id: &str) -> Result<bool, CourseError> {
        self.dir.delete(config_id).await
    }

    fn generate_id(&self, name: &str) -> String {
        let base: String = name
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect();
        let base = if base.is_empty() {
            "course".to_string()
        } else {
            base
        };

        if !self.dir.contains(&base) {
            return base;
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}-{counter}");
            if !self.dir.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseSettings;
    use tempfile::tempdir;

    fn request(name: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            name: name.into(),
            settings: CourseSettings::default(),
            instructions: "Learn the basics.".into(),
            linked_pages: vec!["p1".into()],
        }
    }

    #[tokio::test]
    async fn create_slugs_and_deduplicates_ids() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let first = store.create(request("Backend Onboarding!")).await.unwrap();
        assert_eq!(first.id, "backend-onboarding");

        let second = store.create(request("Backend Onboarding!")).await.unwrap();
        assert_eq!(second.id, "backend-onboarding-1");
    }

    #[tokio::test]
    async fn update_is_partial() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let created = store.create(request("Demo")).await.unwrap();

        let updated = store
            .update(
                &created.id,
                UpdateCourseRequest {
                    linked_pages: Some(vec!["p2".into(), "p3".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Demo");
        assert_eq!(updated.linked_pages, vec!["p2", "p3"]);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn missing_config_updates_and_deletes_report_absence() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(
            store
                .update("nope", UpdateCourseRequest::default())
                .await
                .unwrap()
                .is_none()
        );
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let a = store.create(request("Alpha")).await.unwrap();
        let _b = store.create(request("Beta")).await.unwrap();
        store
            .update(
                &a.id,
                UpdateCourseRequest {
                    instructions: Some("refresh".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "alpha");
    }
}
