//! Retrieval-augmented synthesis of courses and quizzes.
//!
//! Every generation call is grounded in chunks retrieved from the course's
//! vector namespace and parsed at the boundary ([`schema`]); when the
//! backend fails or returns an unusable shape, synthesis falls back to
//! deterministic output built from the retrieved text itself, so these
//! entry points never surface a raw generation failure.

pub mod prompts;
pub mod schema;

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::embeddings::EmbeddingProvider;
use crate::generation::TextGenerator;
use crate::models::{
    GeneratedCourse, GradingResult, Module, QuestionResult, Quiz, QuizDifficulty, QuizQuestion,
    SourcePageRef,
};
use crate::stores::{ChunkRecord, ContentStore, VectorBackend};
use crate::types::CourseError;
use schema::ModuleContentPayload;

const PLAN_RETRIEVAL_K: usize = 50;
const MODULE_RETRIEVAL_K: usize = 10;
const QUIZ_RETRIEVAL_K: usize = 15;
const MODULE_COUNT_MIN: usize = 2;
const MODULE_COUNT_MAX: usize = 12;
const QUESTION_COUNT_MIN: usize = 3;
const QUESTION_COUNT_MAX: usize = 20;
/// Cap on source text handed to a single generation call.
const SOURCE_CHAR_LIMIT: usize = 4000;
/// Cap on retrieved text surfaced directly as a fallback module body.
const FALLBACK_BODY_LIMIT: usize = 1200;
const PASS_THRESHOLD: f64 = 70.0;

/// Turns indexed course content into structured modules and quizzes.
pub struct CourseSynthesizer {
    index: Arc<dyn VectorBackend>,
    embeddings: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    content: ContentStore,
}

/// Retrieved chunks regrouped under their source page, first-seen order.
struct PageContent {
    page_id: String,
    title: String,
    chunks: Vec<String>,
}

/// A planned module stub, post-validation.
struct ModulePlan {
    module_number: u32,
    title: String,
    description: String,
    topics: Vec<String>,
}

impl CourseSynthesizer {
    pub fn new(
        index: Arc<dyn VectorBackend>,
        embeddings: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        content: ContentStore,
    ) -> Self {
        Self {
            index,
            embeddings,
            generator,
            content,
        }
    }

    /// Synthesizes and persists the full course, overwriting any previous
    /// generation.
    ///
    /// Fails with `NotFound` when the course has no indexed content (it
    /// was never processed, or processing produced nothing); generation
    /// failures fall back instead of failing.
    pub async fn generate_course(
        &self,
        course_id: &str,
        title: &str,
        description: &str,
        num_modules: Option<usize>,
    ) -> Result<GeneratedCourse, CourseError> {
        let seed = if description.trim().is_empty() {
            title
        } else {
            description
        };
        let hits = self.retrieve(course_id, seed, PLAN_RETRIEVAL_K).await?;
        if hits.is_empty() {
            return Err(CourseError::NotFound(format!(
                "no indexed content for course {course_id}; has it been processed?"
            )));
        }

        let pages = group_by_page(&hits);
        let total_chars: usize = pages
            .iter()
            .flat_map(|p| p.chunks.iter())
            .map(|c| c.len())
            .sum();
        let module_count = num_modules
            .map(|n| n.clamp(MODULE_COUNT_MIN, MODULE_COUNT_MAX))
            .unwrap_or_else(|| {
                (total_chars / 5000 + pages.len().div_ceil(2))
                    .clamp(MODULE_COUNT_MIN, MODULE_COUNT_MAX)
            });

        tracing::info!(
            course_id = %course_id,
            pages = pages.len(),
            modules = module_count,
            "generating course content"
        );

        let plan = self
            .plan_modules(title, description, &pages, module_count)
            .await;
        let mut modules = Vec::with_capacity(plan.len());
        for stub in plan {
            modules.push(self.build_module(course_id, stub).await?);
        }

        let course = GeneratedCourse {
            course_id: course_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            modules,
            source_pages: pages
                .iter()
                .map(|p| SourcePageRef {
                    id: p.page_id.clone(),
                    title: p.title.clone(),
                })
                .collect(),
        };
        self.content.save_course(&course).await?;
        Ok(course)
    }

    /// One outline call; falls back to an even page partition when the
    /// backend fails or returns an unusable shape.
    async fn plan_modules(
        &self,
        title: &str,
        description: &str,
        pages: &[PageContent],
        count: usize,
    ) -> Vec<ModulePlan> {
        let summary = content_summary(pages);
        let prompt = prompts::course_outline(title, description, &summary, count);
        let outcome = match self.generator.generate(&prompt).await {
            Ok(raw) => schema::parse_module_plan(&raw),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(entries) => entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| ModulePlan {
                    module_number: (index + 1) as u32,
                    title: entry.title,
                    description: entry.description,
                    topics: entry.topics,
                })
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "module planning failed, partitioning pages instead");
                fallback_plan(title, pages, count)
            }
        }
    }

    async fn build_module(
        &self,
        course_id: &str,
        plan: ModulePlan,
    ) -> Result<Module, CourseError> {
        let query = format!("{} {}", plan.title, plan.description);
        let hits = self.retrieve(course_id, &query, MODULE_RETRIEVAL_K).await?;
        let source = join_chunks(&hits, SOURCE_CHAR_LIMIT);

        let prompt = prompts::module_content(&plan.title, &plan.description, &plan.topics, &source);
        let outcome = match self.generator.generate(&prompt).await {
            Ok(raw) => schema::parse_module_content(&raw),
            Err(err) => Err(err),
        };
        let payload = outcome.unwrap_or_else(|err| {
            tracing::warn!(module = %plan.title, error = %err, "module generation failed, surfacing retrieved text");
            ModuleContentPayload {
                overview: plan.description.clone(),
                content: truncate_chars(&source, FALLBACK_BODY_LIMIT),
                key_points: plan.topics.clone(),
                takeaways: Vec::new(),
            }
        });

        let mut content = if payload.content.trim().is_empty() {
            payload.overview.clone()
        } else {
            payload.content
        };
        if content.trim().is_empty() {
            content = format!("Review the source pages covering {}.", plan.title);
        }

        Ok(Module {
            module_number: plan.module_number,
            title: plan.title,
            description: plan.description,
            overview: payload.overview,
            content,
            key_points: payload.key_points,
            takeaways: payload.takeaways,
        })
    }

    /// Synthesizes and persists a quiz for one module or the whole course.
    ///
    /// Requires the generated course to exist. The result always contains
    /// at least one well-formed question, whatever the backend does.
    pub async fn generate_quiz(
        &self,
        course_id: &str,
        module_number: Option<u32>,
        num_questions: Option<usize>,
        difficulty: QuizDifficulty,
    ) -> Result<Quiz, CourseError> {
        let course = self.content.load_course(course_id).await?.ok_or_else(|| {
            CourseError::NotFound(format!("course {course_id} has not been generated yet"))
        })?;

        let (scope, query) = match module_number {
            Some(number) => {
                let module = course
                    .modules
                    .iter()
                    .find(|m| m.module_number == number)
                    .ok_or_else(|| {
                        CourseError::NotFound(format!("module {number} of course {course_id}"))
                    })?;
                (
                    module.title.clone(),
                    format!("{} {}", module.title, module.description),
                )
            }
            None => (
                course.title.clone(),
                format!("{} {}", course.title, course.description),
            ),
        };

        let content_volume: usize = course.modules.iter().map(|m| m.content.len()).sum();
        let count = num_questions
            .map(|n| n.clamp(QUESTION_COUNT_MIN, QUESTION_COUNT_MAX))
            .unwrap_or_else(|| {
                (course.modules.len() * 2 + content_volume / 4000)
                    .clamp(QUESTION_COUNT_MIN, QUESTION_COUNT_MAX)
            });

        let hits = self.retrieve(course_id, &query, QUIZ_RETRIEVAL_K).await?;
        let source = join_chunks(&hits, SOURCE_CHAR_LIMIT);

        let prompt = prompts::quiz(&scope, difficulty, count, &source);
        let outcome = match self.generator.generate(&prompt).await {
            Ok(raw) => schema::parse_quiz_questions(&raw),
            Err(err) => Err(err),
        };
        let mut questions = match outcome {
            Ok(mut questions) => {
                questions.truncate(count);
                questions
            }
            Err(err) => {
                tracing::warn!(scope = %scope, error = %err, "quiz generation failed, deriving questions from content");
                fallback_questions(&hits, count)
            }
        };
        if questions.is_empty() {
            questions.push(placeholder_question(&scope));
        }

        let quiz = Quiz {
            course_id: course_id.to_string(),
            module_number,
            difficulty,
            questions,
        };
        self.content.save_quiz(&quiz).await?;
        Ok(quiz)
    }

    /// Grades a submission against the stored quiz for that scope.
    pub async fn submit_answers(
        &self,
        course_id: &str,
        module_number: Option<u32>,
        answers: &[usize],
    ) -> Result<GradingResult, CourseError> {
        let quiz = self
            .content
            .load_quiz(course_id, module_number)
            .await?
            .ok_or_else(|| {
                CourseError::NotFound(format!(
                    "no quiz generated for that scope of course {course_id}"
                ))
            })?;

        if answers.len() != quiz.questions.len() {
            return Err(CourseError::Validation(format!(
                "expected {} answers, got {}",
                quiz.questions.len(),
                answers.len()
            )));
        }

        let per_question: Vec<QuestionResult> = quiz
            .questions
            .iter()
            .zip(answers)
            .map(|(question, &selected)| QuestionResult {
                selected,
                correct: question.correct_answer_index,
                is_correct: selected == question.correct_answer_index,
                explanation: question.explanation.clone(),
            })
            .collect();

        let correct_answers = per_question.iter().filter(|r| r.is_correct).count();
        let total_questions = quiz.questions.len();
        let score_percentage = if total_questions == 0 {
            0.0
        } else {
            correct_answers as f64 / total_questions as f64 * 100.0
        };

        Ok(GradingResult {
            correct_answers,
            total_questions,
            score_percentage,
            passed: score_percentage >= PASS_THRESHOLD,
            per_question,
        })
    }

    async fn retrieve(
        &self,
        course_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, CourseError> {
        let embeddings = self.embeddings.embed_batch(&[query.to_string()]).await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CourseError::Embedding("embedding batch came back empty".into()))?;
        self.index.query(course_id, &embedding, top_k).await
    }
}

fn group_by_page(hits: &[(ChunkRecord, f32)]) -> Vec<PageContent> {
    let mut pages: Vec<PageContent> = Vec::new();
    for (record, _) in hits {
        match pages.iter_mut().find(|p| p.page_id == record.page_id) {
            Some(page) => page.chunks.push(record.content.clone()),
            None => pages.push(PageContent {
                page_id: record.page_id.clone(),
                title: record.page_title.clone(),
                chunks: vec![record.content.clone()],
            }),
        }
    }
    pages
}

fn content_summary(pages: &[PageContent]) -> String {
    pages
        .iter()
        .map(|page| {
            let chars: usize = page.chunks.iter().map(|c| c.len()).sum();
            format!(
                "- {} ({} sections, ~{} chars)",
                page.title,
                page.chunks.len(),
                chars
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Even partition of pages across `count` modules, each named after its
/// first page.
fn fallback_plan(course_title: &str, pages: &[PageContent], count: usize) -> Vec<ModulePlan> {
    let count = count.min(pages.len()).max(1);
    let per_bucket = pages.len().div_ceil(count);
    pages
        .chunks(per_bucket)
        .take(count)
        .enumerate()
        .map(|(index, bucket)| {
            let titles: Vec<String> = bucket.iter().map(|p| p.title.clone()).collect();
            ModulePlan {
                module_number: (index + 1) as u32,
                title: bucket[0].title.clone(),
                description: format!("Part {} of {course_title}: {}", index + 1, titles.join(", ")),
                topics: titles,
            }
        })
        .collect()
}

fn join_chunks(hits: &[(ChunkRecord, f32)], limit: usize) -> String {
    let joined = hits
        .iter()
        .map(|(record, _)| record.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, limit)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].trim_end().to_string()
}

static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence pattern is valid"));

/// Deterministic true/false-style questions lifted from content sentences.
fn fallback_questions(hits: &[(ChunkRecord, f32)], count: usize) -> Vec<QuizQuestion> {
    let mut questions = Vec::new();
    let mut seen = HashSet::new();
    'hits: for (record, _) in hits {
        for sentence in SENTENCE_SPLIT.split(&record.content) {
            let sentence = sentence.trim().trim_end_matches(['.', '!', '?']);
            if sentence.len() < 40 || sentence.len() > 240 {
                continue;
            }
            if !seen.insert(sentence.to_string()) {
                continue;
            }
            questions.push(QuizQuestion {
                question: format!("True or false: {sentence}."),
                options: vec![
                    "True".to_string(),
                    "False".to_string(),
                    "The material does not say".to_string(),
                    "Only in older versions".to_string(),
                ],
                correct_answer_index: 0,
                explanation: "Stated directly in the course material.".to_string(),
            });
            if questions.len() >= count {
                break 'hits;
            }
        }
    }
    questions
}

fn placeholder_question(scope: &str) -> QuizQuestion {
    QuizQuestion {
        question: format!("Have you reviewed the material covering {scope}?"),
        options: vec![
            "Yes, all of it".to_string(),
            "Most of it".to_string(),
            "Some of it".to_string(),
            "Not yet".to_string(),
        ],
        correct_answer_index: 0,
        explanation: "Work through the course content before taking the quiz.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str, title: &str, chunks: &[&str]) -> PageContent {
        PageContent {
            page_id: id.into(),
            title: title.into(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn hit(page_id: &str, content: &str) -> (ChunkRecord, f32) {
        (
            ChunkRecord::new("c", page_id, "Title", "url", 0, content),
            0.1,
        )
    }

    #[test]
    fn fallback_plan_partitions_pages_in_order() {
        let pages = vec![
            page("a", "Alpha", &["x"]),
            page("b", "Beta", &["y"]),
            page("c", "Gamma", &["z"]),
            page("d", "Delta", &["w"]),
        ];
        let plan = fallback_plan("Course", &pages, 2);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].title, "Alpha");
        assert_eq!(plan[0].topics, vec!["Alpha", "Beta"]);
        assert_eq!(plan[1].title, "Gamma");
        assert_eq!(plan[1].module_number, 2);
    }

    #[test]
    fn fallback_plan_never_exceeds_page_count() {
        let pages = vec![page("a", "Alpha", &["x"])];
        let plan = fallback_plan("Course", &pages, 6);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn truncation_lands_on_char_boundaries() {
        let text = "ääääääääää";
        let cut = truncate_chars(text, 7);
        assert!(cut.len() <= 7);
        assert!(text.starts_with(&cut));
    }

    #[test]
    fn fallback_questions_are_well_formed() {
        let hits = vec![hit(
            "p1",
            "The deployment pipeline promotes builds from staging to production automatically. \
             Short one. Access requests are reviewed by the platform team every Monday morning.",
        )];
        let questions = fallback_questions(&hits, 5);
        assert_eq!(questions.len(), 2);
        for question in &questions {
            assert_eq!(question.options.len(), 4);
            assert_eq!(question.correct_answer_index, 0);
            assert!(question.question.starts_with("True or false:"));
        }
    }

    #[test]
    fn placeholder_question_is_always_available() {
        let question = placeholder_question("Demo Course");
        assert_eq!(question.options.len(), 4);
        assert!(question.question.contains("Demo Course"));
    }
}
