//! Persistence for processing snapshots, generated courses, and quizzes.
//!
//! One JSON record per course for snapshots and courses; quizzes are keyed
//! by `(course, module-or-final)`. All records are replaced wholesale on
//! regeneration.

use std::path::{Path, PathBuf};

use super::json::JsonDirectory;
use crate::models::{GeneratedCourse, ProcessingSnapshot, Quiz};
use crate::types::CourseError;

/// File-backed store for everything the pipeline produces.
#[derive(Clone, Debug)]
pub struct ContentStore {
    snapshots: JsonDirectory,
    courses: JsonDirectory,
    /// Quizzes get one directory per course so scoped deletes can't bleed
    /// across courses.
    quizzes_root: PathBuf,
}

impl ContentStore {
    /// Creates a store rooted at `data_dir`, with one subdirectory per
    /// record family.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let root = data_dir.as_ref();
        Self {
            snapshots: JsonDirectory::new(root.join("processed")),
            courses: JsonDirectory::new(root.join("courses")),
            quizzes_root: root.join("quizzes"),
        }
    }

    pub async fn save_snapshot(&self, snapshot: &ProcessingSnapshot) -> Result<(), CourseError> {
        self.snapshots.write(&snapshot.course_id, snapshot).await
    }

    pub async fn load_snapshot(
        &self,
        course_id: &str,
    ) -> Result<Option<ProcessingSnapshot>, CourseError> {
        self.snapshots.read(course_id).await
    }

    pub async fn delete_snapshot(&self, course_id: &str) -> Result<bool, CourseError> {
        self.snapshots.delete(course_id).await
    }

    pub async fn save_course(&self, course: &GeneratedCourse) -> Result<(), CourseError> {
        self.courses.write(&course.course_id, course).await
    }

    pub async fn load_course(
        &self,
        course_id: &str,
    ) -> Result<Option<GeneratedCourse>, CourseError> {
        self.courses.read(course_id).await
    }

    pub async fn delete_course(&self, course_id: &str) -> Result<bool, CourseError> {
        self.courses.delete(course_id).await
    }

    fn quiz_dir(&self, course_id: &str) -> JsonDirectory {
        JsonDirectory::new(self.quizzes_root.join(course_id))
    }

    fn quiz_key(module_number: Option<u32>) -> String {
        match module_number {
            Some(number) => format!("module-{number}"),
            None => "final".to_string(),
        }
    }

    pub async fn save_quiz(&self, quiz: &Quiz) -> Result<(), CourseError> {
        self.quiz_dir(&quiz.course_id)
            .write(&Self::quiz_key(quiz.module_number), quiz)
            .await
    }

    pub async fn load_quiz(
        &self,
        course_id: &str,
        module_number: Option<u32>,
    ) -> Result<Option<Quiz>, CourseError> {
        self.quiz_dir(course_id)
            .read(&Self::quiz_key(module_number))
            .await
    }

    /// Removes every quiz belonging to the course; returns the count.
    pub async fn delete_quizzes(&self, course_id: &str) -> Result<usize, CourseError> {
        let dir = self.quiz_dir(course_id);
        let mut removed = 0;
        for name in dir.list_names().await? {
            if dir.delete(&name).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
