//! Storage: the per-course vector index and the JSON record stores.
//!
//! Vector storage sits behind the [`VectorBackend`] trait so pipeline code
//! and tests are not tied to a specific database; [`SqliteVectorStore`] is
//! the sqlite-vec implementation. Record persistence (snapshots, generated
//! courses, quizzes) lives in [`content::ContentStore`].

pub mod content;
pub mod json;
pub mod sqlite;

pub use content::ContentStore;
pub use sqlite::SqliteVectorStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::CourseError;

/// A chunk with provenance metadata and (optionally) its embedding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    /// Deterministic identifier, see [`chunk_id`].
    pub id: String,
    /// Course namespace this chunk belongs to.
    pub course_id: String,
    pub page_id: String,
    pub page_title: String,
    pub page_url: String,
    /// Zero-based position of this chunk within its page.
    pub chunk_index: usize,
    pub content: String,
    /// Present on insert; query results omit it.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        course_id: impl Into<String>,
        page_id: impl Into<String>,
        page_title: impl Into<String>,
        page_url: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        let page_id = page_id.into();
        let content = content.into();
        Self {
            id: chunk_id(&page_id, chunk_index, &content),
            course_id: course_id.into(),
            page_id,
            page_title: page_title.into(),
            page_url: page_url.into(),
            chunk_index,
            content,
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Deterministic chunk identifier: page, position, and a truncated content
/// hash.
///
/// Identical content at the same position always produces the same ID, so
/// re-inserting it is a no-op; changed content produces a fresh ID. The
/// hash is truncated to 8 hex chars — a nonzero but negligible collision
/// probability that is accepted for this domain.
pub fn chunk_id(page_id: &str, chunk_index: usize, content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hash8 = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        hash8.push_str(&format!("{byte:02x}"));
    }
    format!("{page_id}_chunk_{chunk_index}_{hash8}")
}

/// Unified interface over vector-index backends, one logical namespace per
/// course.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Inserts or replaces chunks by their deterministic IDs.
    ///
    /// Every record must carry an embedding; the batch fails as a whole
    /// otherwise (no partial insert).
    async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), CourseError>;

    /// Nearest chunks to `embedding` within the course namespace, closest
    /// first (ascending cosine distance, chunk ID as the deterministic
    /// tiebreak).
    async fn query(
        &self,
        course_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, CourseError>;

    /// Removes all chunks of one page; returns how many were deleted.
    /// No-op when nothing matches.
    async fn delete_page(&self, course_id: &str, page_id: &str) -> Result<usize, CourseError>;

    /// Removes a whole course namespace; idempotent.
    async fn delete_course(&self, course_id: &str) -> Result<usize, CourseError>;

    /// Distinct page IDs currently stored for a course, sorted.
    async fn list_page_ids(&self, course_id: &str) -> Result<Vec<String>, CourseError>;

    /// Number of chunks stored for a course.
    async fn count(&self, course_id: &str) -> Result<usize, CourseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_stable_for_identical_content() {
        let a = chunk_id("p1", 0, "same text");
        let b = chunk_id("p1", 0, "same text");
        assert_eq!(a, b);
        assert!(a.starts_with("p1_chunk_0_"));
        assert_eq!(a.rsplit('_').next().unwrap().len(), 8);
    }

    #[test]
    fn chunk_ids_change_with_content_or_position() {
        let base = chunk_id("p1", 0, "same text");
        assert_ne!(base, chunk_id("p1", 0, "different text"));
        assert_ne!(base, chunk_id("p1", 1, "same text"));
        assert_ne!(base, chunk_id("p2", 0, "same text"));
    }
}
