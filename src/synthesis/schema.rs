//! Parse-and-validate boundary for generation output.
//!
//! The generation backend returns free text that is *supposed* to be JSON
//! in an agreed shape. Everything coming back crosses through here; shape
//! mismatches become [`CourseError::Generation`] so callers fall back
//! deterministically instead of letting malformed data flow downstream.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::models::QuizQuestion;
use crate::types::CourseError;

/// One planned module stub from the outline call.
#[derive(Clone, Debug, Deserialize)]
pub struct ModulePlanEntry {
    #[serde(default)]
    pub module_number: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Body payload for a single module.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleContentPayload {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub takeaways: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuizQuestionPayload {
    question: String,
    options: Vec<String>,
    correct_answer_index: usize,
    #[serde(default)]
    explanation: String,
}

pub fn parse_module_plan(raw: &str) -> Result<Vec<ModulePlanEntry>, CourseError> {
    let entries: Vec<ModulePlanEntry> = parse_json(raw)?;
    let usable: Vec<ModulePlanEntry> = entries
        .into_iter()
        .filter(|entry| !entry.title.trim().is_empty())
        .collect();
    if usable.is_empty() {
        return Err(CourseError::Generation(
            "module plan contained no usable entries".into(),
        ));
    }
    Ok(usable)
}

pub fn parse_module_content(raw: &str) -> Result<ModuleContentPayload, CourseError> {
    let payload: ModuleContentPayload = parse_json(raw)?;
    if payload.content.trim().is_empty() && payload.overview.trim().is_empty() {
        return Err(CourseError::Generation("module body came back empty".into()));
    }
    Ok(payload)
}

/// Parses quiz questions, dropping malformed entries (wrong option count,
/// out-of-range answer index, blank question). Errors when nothing
/// survives.
pub fn parse_quiz_questions(raw: &str) -> Result<Vec<QuizQuestion>, CourseError> {
    let entries: Vec<QuizQuestionPayload> = parse_json(raw)?;
    let usable: Vec<QuizQuestion> = entries
        .into_iter()
        .filter_map(|entry| {
            if entry.question.trim().is_empty()
                || entry.options.len() != 4
                || entry.correct_answer_index >= entry.options.len()
            {
                return None;
            }
            Some(QuizQuestion {
                question: entry.question,
                options: entry.options,
                correct_answer_index: entry.correct_answer_index,
                explanation: entry.explanation,
            })
        })
        .collect();
    if usable.is_empty() {
        return Err(CourseError::Generation(
            "quiz response contained no well-formed questions".into(),
        ));
    }
    Ok(usable)
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, CourseError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|err| CourseError::Generation(format!("unparseable generation output: {err}")))
}

/// Models love wrapping JSON in markdown fences; unwrap them if present.
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.split_once('\n') {
            Some((_info, body)) => body,
            None => rest,
        };
        if let Some(body) = text.strip_suffix("```") {
            text = body;
        }
        text = text.trim();
    }
    text
}
