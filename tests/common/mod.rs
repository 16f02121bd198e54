//! Shared fakes for the cross-component test suites.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use coursesmith::generation::TextGenerator;
use coursesmith::models::{CourseConfig, CourseSettings};
use coursesmith::types::CourseError;
use coursesmith::wiki::{WikiClient, WikiPage};
use coursesmith::EmbeddingProvider;

/// In-memory wiki with page bodies, versions, a folder hierarchy, and a
/// switch to simulate per-page outages.
#[derive(Clone, Default)]
pub struct FakeWiki {
    pages: Arc<Mutex<HashMap<String, WikiPage>>>,
    children: Arc<Mutex<HashMap<String, Vec<String>>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, id: &str, title: &str, body_html: &str, version: i64) {
        self.pages.lock().unwrap().insert(
            id.to_string(),
            WikiPage {
                id: id.to_string(),
                title: title.to_string(),
                body_html: body_html.to_string(),
                version,
                url: format!("https://wiki.example/pages/{id}"),
            },
        );
    }

    pub fn set_children(&self, parent: &str, children: &[&str]) {
        self.children.lock().unwrap().insert(
            parent.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn set_version(&self, id: &str, version: i64) {
        if let Some(page) = self.pages.lock().unwrap().get_mut(id) {
            page.version = version;
        }
    }

    /// Makes every operation on `id` fail until restored.
    pub fn break_page(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    fn ensure_reachable(&self, id: &str) -> Result<(), CourseError> {
        if self.broken.lock().unwrap().contains(id) {
            return Err(CourseError::Fetch(format!("simulated outage for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl WikiClient for FakeWiki {
    async fn fetch_page(&self, page_id: &str) -> Result<WikiPage, CourseError> {
        self.ensure_reachable(page_id)?;
        self.pages
            .lock()
            .unwrap()
            .get(page_id)
            .cloned()
            .ok_or_else(|| CourseError::NotFound(format!("page {page_id}")))
    }

    async fn fetch_version(&self, page_id: &str) -> Result<i64, CourseError> {
        self.ensure_reachable(page_id)?;
        self.pages
            .lock()
            .unwrap()
            .get(page_id)
            .map(|p| p.version)
            .ok_or_else(|| CourseError::NotFound(format!("page {page_id}")))
    }

    async fn has_children(&self, page_id: &str) -> Result<bool, CourseError> {
        self.ensure_reachable(page_id)?;
        Ok(self
            .children
            .lock()
            .unwrap()
            .get(page_id)
            .is_some_and(|c| !c.is_empty()))
    }

    async fn list_children(
        &self,
        page_id: &str,
        recursive: bool,
    ) -> Result<Vec<String>, CourseError> {
        self.ensure_reachable(page_id)?;
        let map = self.children.lock().unwrap();
        let mut collected = Vec::new();
        let mut queue = VecDeque::from([page_id.to_string()]);
        while let Some(parent) = queue.pop_front() {
            for child in map.get(&parent).cloned().unwrap_or_default() {
                if recursive {
                    queue.push_back(child.clone());
                }
                collected.push(child);
            }
            if !recursive {
                break;
            }
        }
        Ok(collected)
    }
}

/// Replays canned generation outputs in order; errors once exhausted.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CourseError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CourseError::Generation("script exhausted".into()))
    }
}

/// Generation backend that is always down.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CourseError> {
        Err(CourseError::Generation("backend unavailable".into()))
    }
}

/// Embedding capability that is always down.
pub struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CourseError> {
        Err(CourseError::Embedding("capability outage".into()))
    }
}

pub fn course_config(id: &str, linked_pages: &[&str], folder_recursion: bool) -> CourseConfig {
    let now = Utc::now();
    CourseConfig {
        id: id.to_string(),
        name: format!("{id} course"),
        settings: CourseSettings {
            folder_recursion,
            test_at_end: true,
        },
        instructions: "Learn how the team works.".to_string(),
        linked_pages: linked_pages.iter().map(|p| p.to_string()).collect(),
        created_at: now,
        updated_at: now,
    }
}
