//! SQLite implementation of [`VectorBackend`] using the sqlite-vec
//! extension for cosine-distance search.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{ChunkRecord, VectorBackend};
use crate::types::CourseError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id          TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL,
    page_id     TEXT NOT NULL,
    page_title  TEXT NOT NULL,
    page_url    TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content     TEXT NOT NULL,
    embedding   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_course ON chunks(course_id);
CREATE INDEX IF NOT EXISTS idx_chunks_course_page ON chunks(course_id, page_id);
";

/// Persistent per-course chunk index backed by SQLite + sqlite-vec.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the index at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CourseError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| CourseError::Storage(err.to_string()))?;
        Self::initialize(&conn).await?;
        Ok(Self { conn })
    }

    /// In-memory index, used by tests.
    pub async fn in_memory() -> Result<Self, CourseError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| CourseError::Storage(err.to_string()))?;
        Self::initialize(&conn).await?;
        Ok(Self { conn })
    }

    async fn initialize(conn: &Connection) -> Result<(), CourseError> {
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Error)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Error)?;
            Ok(())
        })
        .await
        .map_err(|err: tokio_rusqlite::Error| CourseError::Storage(err.to_string()))
    }

    fn register_sqlite_vec() -> Result<(), CourseError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(CourseError::Storage)
    }
}

fn embedding_json(record: &ChunkRecord) -> Result<String, CourseError> {
    let embedding = record.embedding.as_ref().ok_or_else(|| {
        CourseError::Validation(format!("chunk {} is missing its embedding", record.id))
    })?;
    serde_json::to_string(embedding).map_err(|err| CourseError::Storage(err.to_string()))
}

#[async_trait]
impl VectorBackend for SqliteVectorStore {
    async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), CourseError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(chunks.len());
        for record in &chunks {
            rows.push((record.clone(), embedding_json(record)?));
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Error)?;
                {
                    let mut stmt = tx
                        .prepare(
                            "INSERT OR REPLACE INTO chunks \
                             (id, course_id, page_id, page_title, page_url, chunk_index, content, embedding) \
                             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        )
                        .map_err(tokio_rusqlite::Error::Error)?;
                    for (record, embedding) in rows {
                        stmt.execute((
                            record.id,
                            record.course_id,
                            record.page_id,
                            record.page_title,
                            record.page_url,
                            record.chunk_index as i64,
                            record.content,
                            embedding,
                        ))
                        .map_err(tokio_rusqlite::Error::Error)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| CourseError::Storage(err.to_string()))
    }

    async fn query(
        &self,
        course_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, CourseError> {
        let query_json =
            serde_json::to_string(embedding).map_err(|err| CourseError::Storage(err.to_string()))?;
        let course_id = course_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, course_id, page_id, page_title, page_url, chunk_index, content, \
                         vec_distance_cosine(vec_f32(embedding), vec_f32(?)) AS distance \
                         FROM chunks WHERE course_id = ? \
                         ORDER BY distance ASC, id ASC LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;
                let rows = stmt
                    .query_map((query_json, course_id), |row| {
                        let record = ChunkRecord {
                            id: row.get(0)?,
                            course_id: row.get(1)?,
                            page_id: row.get(2)?,
                            page_title: row.get(3)?,
                            page_url: row.get(4)?,
                            chunk_index: row.get::<_, i64>(5)? as usize,
                            content: row.get(6)?,
                            embedding: None,
                        };
                        let distance: f32 = row.get(7)?;
                        Ok((record, distance))
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;
                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| CourseError::Storage(err.to_string()))
    }

    async fn delete_page(&self, course_id: &str, page_id: &str) -> Result<usize, CourseError> {
        let course_id = course_id.to_string();
        let page_id = page_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM chunks WHERE course_id = ? AND page_id = ?",
                    (course_id, page_id),
                )
                .map_err(tokio_rusqlite::Error::Error)
            })
            .await
            .map_err(|err| CourseError::Storage(err.to_string()))
    }

    async fn delete_course(&self, course_id: &str) -> Result<usize, CourseError> {
        let course_id = course_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM chunks WHERE course_id = ?", [course_id])
                    .map_err(tokio_rusqlite::Error::Error)
            })
            .await
            .map_err(|err| CourseError::Storage(err.to_string()))
    }

    async fn list_page_ids(&self, course_id: &str) -> Result<Vec<String>, CourseError> {
        let course_id = course_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT DISTINCT page_id FROM chunks WHERE course_id = ? ORDER BY page_id",
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                let rows = stmt
                    .query_map([course_id], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Error)?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| CourseError::Storage(err.to_string()))
    }

    async fn count(&self, course_id: &str) -> Result<usize, CourseError> {
        let course_id = course_id.to_string();
        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM chunks WHERE course_id = ?",
                        [course_id],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| CourseError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(course: &str, page: &str, index: usize, content: &str) -> ChunkRecord {
        ChunkRecord::new(course, page, "Title", "https://wiki.example/p", index, content)
            .with_embedding(vec![index as f32 + 1.0, 0.5, -0.25])
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteVectorStore::in_memory().await.unwrap();
        let chunks = vec![record("c1", "p1", 0, "alpha"), record("c1", "p1", 1, "beta")];
        store.upsert_chunks(chunks.clone()).await.unwrap();
        store.upsert_chunks(chunks).await.unwrap();
        assert_eq!(store.count("c1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_embedding_rejects_whole_batch() {
        let store = SqliteVectorStore::in_memory().await.unwrap();
        let mut bad = record("c1", "p1", 0, "alpha");
        bad.embedding = None;
        let err = store
            .upsert_chunks(vec![record("c1", "p1", 1, "beta"), bad])
            .await
            .unwrap_err();
        assert!(matches!(err, CourseError::Validation(_)));
        assert_eq!(store.count("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_orders_by_distance_and_respects_namespace() {
        let store = SqliteVectorStore::in_memory().await.unwrap();
        let near = ChunkRecord::new("c1", "p1", "T", "u", 0, "near")
            .with_embedding(vec![1.0, 0.0, 0.0]);
        let far = ChunkRecord::new("c1", "p1", "T", "u", 1, "far")
            .with_embedding(vec![-1.0, 0.1, 0.0]);
        let other_course = ChunkRecord::new("c2", "px", "T", "u", 0, "identical direction")
            .with_embedding(vec![1.0, 0.0, 0.0]);
        store
            .upsert_chunks(vec![far.clone(), near.clone(), other_course])
            .await
            .unwrap();

        let hits = store.query("c1", &[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.content, "near");
        assert!(hits[0].1 <= hits[1].1);
        assert!(hits.iter().all(|(r, _)| r.course_id == "c1"));
    }

    #[tokio::test]
    async fn delete_page_is_scoped_and_idempotent() {
        let store = SqliteVectorStore::in_memory().await.unwrap();
        store
            .upsert_chunks(vec![
                record("c1", "p1", 0, "alpha"),
                record("c1", "p2", 0, "beta"),
                record("c2", "p1", 0, "gamma"),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_page("c1", "p1").await.unwrap(), 1);
        assert_eq!(store.delete_page("c1", "p1").await.unwrap(), 0);
        assert_eq!(store.list_page_ids("c1").await.unwrap(), vec!["p2"]);
        // Other course untouched.
        assert_eq!(store.list_page_ids("c2").await.unwrap(), vec!["p1"]);
    }

    #[tokio::test]
    async fn delete_course_clears_the_namespace() {
        let store = SqliteVectorStore::in_memory().await.unwrap();
        store
            .upsert_chunks(vec![
                record("c1", "p1", 0, "alpha"),
                record("c2", "p1", 0, "beta"),
            ])
            .await
            .unwrap();
        store.delete_course("c1").await.unwrap();
        assert_eq!(store.count("c1").await.unwrap(), 0);
        assert_eq!(store.count("c2").await.unwrap(), 1);
        // Idempotent.
        assert_eq!(store.delete_course("c1").await.unwrap(), 0);
    }
}
