//! ```text
//! CourseConfig ──► wiki::resolve_page_set ──► WikiClient (HTTP / fake)
//!                          │
//! CourseProcessor ─ fetch ─┴─► html::extract_text ──► chunking::chunk_text
//!        │                                                   │
//!        │                     EmbeddingProvider ◄───────────┘
//!        │                            │
//!        ├─► stores::VectorBackend ◄──┘ (per-course namespace, sqlite-vec)
//!        └─► ProcessingSnapshot ──► UpdateDetector (version diffing)
//!
//! Stored vectors ──► CourseSynthesizer ──► TextGenerator (paced, retried)
//!                          │                    │
//!                          └── GeneratedCourse / Quiz ── grading
//!
//! CoursePipeline: process ──► generate course ──► final quiz (background)
//! ```
//!
pub mod chunking;
pub mod config_store;
pub mod embeddings;
pub mod generation;
pub mod html;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod stores;
pub mod synthesis;
pub mod types;
pub mod updates;
pub mod wiki;

pub use chunking::{ChunkerConfig, chunk_text};
pub use config_store::ConfigStore;
pub use embeddings::{EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider};
pub use generation::{HttpTextGenerator, PacedGenerator, RetryPolicy, TextGenerator};
pub use models::{
    CourseConfig, CourseSettings, CreateCourseRequest, GeneratedCourse, GradingResult,
    ProcessingSnapshot, ProcessingState, Quiz, QuizDifficulty, UpdateCourseRequest, UpdateReport,
};
pub use pipeline::{CoursePipeline, PipelineReport};
pub use processor::CourseProcessor;
pub use stores::{ChunkRecord, ContentStore, SqliteVectorStore, VectorBackend};
pub use synthesis::CourseSynthesizer;
pub use types::CourseError;
pub use updates::UpdateDetector;
pub use wiki::{HttpWikiClient, WikiClient, WikiPage};
