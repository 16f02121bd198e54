//! Course processing: page-set resolution, chunk/embed/upsert, snapshots.
//!
//! One [`CourseProcessor`] owns the per-course vector namespace and the
//! processing snapshot; nothing else mutates them. Runs against the same
//! course are serialized by a per-course lock, and a finished run fully
//! replaces the previous snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::chunking::{ChunkerConfig, chunk_text};
use crate::embeddings::EmbeddingProvider;
use crate::html::extract_text;
use crate::models::{
    CourseConfig, PageFailure, ProcessedPage, ProcessingSnapshot, ProcessingState,
};
use crate::stores::{ChunkRecord, ContentStore, VectorBackend};
use crate::types::CourseError;
use crate::wiki::{WikiClient, resolve_page_set};

/// Consecutive embedding failures after which a run is treated as a
/// capability outage and aborted instead of grinding through every page.
const EMBEDDING_OUTAGE_THRESHOLD: u32 = 3;

/// In-memory run state and per-course run locks.
struct RunRegistry {
    states: Mutex<HashMap<String, ProcessingState>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunRegistry {
    fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, course_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(course_id.to_string())
            .or_default()
            .clone()
    }

    fn set_state(&self, course_id: &str, state: ProcessingState) {
        self.states.lock().insert(course_id.to_string(), state);
    }

    fn state(&self, course_id: &str) -> Option<ProcessingState> {
        self.states.lock().get(course_id).copied()
    }

    fn clear(&self, course_id: &str) {
        self.states.lock().remove(course_id);
        self.locks.lock().remove(course_id);
    }
}

/// Orchestrates (re)processing of a course's source pages into its vector
/// namespace.
pub struct CourseProcessor {
    wiki: Arc<dyn WikiClient>,
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorBackend>,
    content: ContentStore,
    chunker: ChunkerConfig,
    runs: RunRegistry,
}

impl CourseProcessor {
    pub fn new(
        wiki: Arc<dyn WikiClient>,
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorBackend>,
        content: ContentStore,
        chunker: ChunkerConfig,
    ) -> Self {
        Self {
            wiki,
            embeddings,
            index,
            content,
            chunker,
            runs: RunRegistry::new(),
        }
    }

    /// Fully (re)processes a course and persists the resulting snapshot.
    ///
    /// Reentrant: a later call restarts processing and replaces the
    /// snapshot. Overlapping calls for the same course are serialized.
    /// Page-level failures are recorded and skipped; the run only fails
    /// outright when nothing resolves at all, when the embedding
    /// capability looks dead, or when the snapshot cannot be persisted.
    pub async fn process_course(
        &self,
        config: &CourseConfig,
    ) -> Result<ProcessingSnapshot, CourseError> {
        let lock = self.runs.lock_for(&config.id);
        let _guard = lock.lock().await;

        self.runs.set_state(&config.id, ProcessingState::Processing);
        let result = self.run(config).await;
        let final_state = match &result {
            Ok(snapshot) if snapshot.failed_pages.is_empty() => ProcessingState::Processed,
            Ok(_) => ProcessingState::ProcessedPartial,
            Err(_) => ProcessingState::Failed,
        };
        self.runs.set_state(&config.id, final_state);
        result
    }

    async fn run(&self, config: &CourseConfig) -> Result<ProcessingSnapshot, CourseError> {
        tracing::info!(course_id = %config.id, pages = config.linked_pages.len(), "processing course");

        let (resolved, mut failures) = resolve_page_set(self.wiki.as_ref(), config).await;
        if resolved.is_empty() && !failures.is_empty() {
            return Err(CourseError::Fetch(format!(
                "could not resolve any source page for course {}",
                config.id
            )));
        }

        // Garbage-collect pages dropped from the course before inserting
        // anything new, so storage growth stays bounded.
        let resolved_set: HashSet<&str> = resolved.iter().map(String::as_str).collect();
        for stale in self
            .index
            .list_page_ids(&config.id)
            .await?
            .into_iter()
            .filter(|p| !resolved_set.contains(p.as_str()))
        {
            let removed = self.index.delete_page(&config.id, &stale).await?;
            tracing::debug!(course_id = %config.id, page_id = %stale, chunks = removed, "dropped stale page");
        }

        let mut processed = Vec::new();
        let mut consecutive_embedding_failures = 0u32;
        for (position, page_id) in resolved.iter().enumerate() {
            tracing::debug!(
                course_id = %config.id,
                page_id = %page_id,
                position = position + 1,
                total = resolved.len(),
                "processing page"
            );
            match self.process_page(config, page_id).await {
                Ok(page) => {
                    consecutive_embedding_failures = 0;
                    processed.push(page);
                }
                Err(err) => {
                    if matches!(err, CourseError::Embedding(_)) {
                        consecutive_embedding_failures += 1;
                        if consecutive_embedding_failures >= EMBEDDING_OUTAGE_THRESHOLD {
                            return Err(CourseError::Embedding(format!(
                                "aborting run after {consecutive_embedding_failures} consecutive embedding failures: {err}"
                            )));
                        }
                    }
                    tracing::warn!(course_id = %config.id, page_id = %page_id, error = %err, "page failed");
                    failures.push(PageFailure {
                        page_id: page_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let snapshot = ProcessingSnapshot {
            course_id: config.id.clone(),
            total_pages: resolved.len(),
            processed_pages: processed,
            failed_pages: failures,
            completed_at: Utc::now(),
        };
        self.content.save_snapshot(&snapshot).await?;

        tracing::info!(
            course_id = %config.id,
            processed = snapshot.processed_pages.len(),
            failed = snapshot.failed_pages.len(),
            "course processing complete"
        );
        Ok(snapshot)
    }

    /// Fetch, chunk, embed, and index one page, replacing its prior chunks.
    async fn process_page(
        &self,
        config: &CourseConfig,
        page_id: &str,
    ) -> Result<ProcessedPage, CourseError> {
        let page = self.wiki.fetch_page(page_id).await?;
        let text = extract_text(&page.body_html);
        let chunks = chunk_text(&text, &self.chunker);

        let records: Vec<ChunkRecord> = if chunks.is_empty() {
            Vec::new()
        } else {
            let embeddings = self.embeddings.embed_batch(&chunks).await?;
            if embeddings.len() != chunks.len() {
                return Err(CourseError::Embedding(format!(
                    "page {page_id}: {} chunks but {} embeddings",
                    chunks.len(),
                    embeddings.len()
                )));
            }
            chunks
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(index, (content, embedding))| {
                    ChunkRecord::new(
                        &config.id,
                        page_id,
                        &page.title,
                        &page.url,
                        index,
                        content,
                    )
                    .with_embedding(embedding)
                })
                .collect()
        };

        // Changed content mints fresh chunk IDs, so the page's old chunks
        // must go before the new ones land or orphans accumulate.
        self.index.delete_page(&config.id, page_id).await?;
        self.index.upsert_chunks(records).await?;

        Ok(ProcessedPage {
            page_id: page_id.to_string(),
            title: page.title,
            url: page.url,
            content_length: text.len(),
            version: page.version,
        })
    }

    /// Last persisted snapshot for the course, if any.
    pub async fn processing_status(
        &self,
        course_id: &str,
    ) -> Result<Option<ProcessingSnapshot>, CourseError> {
        self.content.load_snapshot(course_id).await
    }

    /// Current position in the processing state machine.
    ///
    /// In-flight state wins; otherwise it is derived from the persisted
    /// snapshot.
    pub async fn processing_state(&self, course_id: &str) -> Result<ProcessingState, CourseError> {
        if let Some(state) = self.runs.state(course_id) {
            return Ok(state);
        }
        Ok(match self.content.load_snapshot(course_id).await? {
            Some(snapshot) if snapshot.failed_pages.is_empty() => ProcessingState::Processed,
            Some(_) => ProcessingState::ProcessedPartial,
            None => ProcessingState::NotProcessed,
        })
    }

    /// Removes everything owned by a course: vector namespace, snapshot,
    /// generated course, and quizzes. Idempotent.
    pub async fn delete_course_data(&self, course_id: &str) -> Result<(), CourseError> {
        tracing::info!(course_id = %course_id, "deleting course data");
        self.index.delete_course(course_id).await?;
        self.content.delete_snapshot(course_id).await?;
        self.content.delete_course(course_id).await?;
        self.content.delete_quizzes(course_id).await?;
        self.runs.clear(course_id);
        Ok(())
    }
}
