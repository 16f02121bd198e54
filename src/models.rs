//! Persisted record types shared across the pipeline.
//!
//! Everything in this module is a plain serde struct: course configs, the
//! per-run processing snapshot, generated course/quiz records, and the
//! update-detection report. All of them are written wholesale on each
//! run — there is no partial patching of persisted state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Behavioral settings attached to a course config.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseSettings {
    /// Expand linked pages that have children into their descendant set.
    #[serde(default = "default_true")]
    pub folder_recursion: bool,
    /// Generate a whole-course final quiz at the end of the pipeline.
    #[serde(default = "default_true")]
    pub test_at_end: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CourseSettings {
    fn default() -> Self {
        Self {
            folder_recursion: true,
            test_at_end: true,
        }
    }
}

/// A stored course configuration: the unit of isolation for the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Filesystem-safe slug, unique across the config store.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub settings: CourseSettings,
    /// Free-form guidance describing what the course should cover.
    pub instructions: String,
    /// Wiki page IDs that source the course content.
    #[serde(default)]
    pub linked_pages: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new course config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    #[serde(default)]
    pub settings: CourseSettings,
    pub instructions: String,
    #[serde(default)]
    pub linked_pages: Vec<String>,
}

/// Partial update for an existing course config; `None` fields are kept.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub settings: Option<CourseSettings>,
    pub instructions: Option<String>,
    pub linked_pages: Option<Vec<String>>,
}

/// Per-page metadata recorded by a successful processing pass.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedPage {
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub content_length: usize,
    /// Wiki version stamp at processing time; drives update detection.
    pub version: i64,
}

/// A page that could not be processed, with the reason.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageFailure {
    pub page_id: String,
    pub error: String,
}

/// Outcome of one full processing run for a course.
///
/// Created or overwritten wholesale on each run; read by status reporting
/// and by update detection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingSnapshot {
    pub course_id: String,
    /// Size of the resolved page set this run worked from.
    pub total_pages: usize,
    pub processed_pages: Vec<ProcessedPage>,
    pub failed_pages: Vec<PageFailure>,
    pub completed_at: DateTime<Utc>,
}

impl ProcessingSnapshot {
    /// Page IDs this snapshot recorded as successfully processed.
    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.processed_pages.iter().map(|p| p.page_id.as_str())
    }

    /// Stored version stamp for a page, if it was processed.
    pub fn version_of(&self, page_id: &str) -> Option<i64> {
        self.processed_pages
            .iter()
            .find(|p| p.page_id == page_id)
            .map(|p| p.version)
    }
}

/// Where a course currently sits in the processing state machine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    NotProcessed,
    Processing,
    /// Last run completed with every page processed.
    Processed,
    /// Last run completed but some pages failed.
    ProcessedPartial,
    /// Last run aborted (e.g. embedding outage, snapshot persist failure).
    Failed,
}

/// A page whose wiki version advanced since the last processing run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangedPage {
    pub page_id: String,
    pub old_version: i64,
    pub new_version: i64,
}

/// Result of diffing the stored snapshot against the live page set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateReport {
    pub needs_update: bool,
    pub new_pages: Vec<String>,
    pub deleted_pages: Vec<String>,
    pub changed_pages: Vec<ChangedPage>,
    /// Human-readable summary of nonzero counts.
    pub reason: String,
}

/// One synthesized learning module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    pub module_number: u32,
    pub title: String,
    pub description: String,
    pub overview: String,
    /// Main body, markdown.
    pub content: String,
    pub key_points: Vec<String>,
    pub takeaways: Vec<String>,
}

/// Reference back to a source page a course was synthesized from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcePageRef {
    pub id: String,
    pub title: String,
}

/// A fully synthesized course; overwritten wholesale on regeneration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedCourse {
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<Module>,
    pub source_pages: Vec<SourcePageRef>,
}

/// Requested difficulty for quiz synthesis.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuizDifficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizDifficulty::Easy => "easy",
            QuizDifficulty::Medium => "medium",
            QuizDifficulty::Hard => "hard",
        }
    }
}

/// A four-option multiple-choice question.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub explanation: String,
}

/// A synthesized quiz, keyed by course and optional module scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quiz {
    pub course_id: String,
    /// `None` denotes the whole-course final quiz.
    pub module_number: Option<u32>,
    pub difficulty: QuizDifficulty,
    pub questions: Vec<QuizQuestion>,
}

/// Per-question outcome of a quiz submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionResult {
    pub selected: usize,
    pub correct: usize,
    pub is_correct: bool,
    pub explanation: String,
}

/// Graded quiz submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradingResult {
    pub correct_answers: usize,
    pub total_questions: usize,
    pub score_percentage: f64,
    /// Score at or above 70% passes.
    pub passed: bool,
    pub per_question: Vec<QuestionResult>,
}
