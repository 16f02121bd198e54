//! Prompt builders for the generation backend.

use crate::models::QuizDifficulty;

pub fn course_outline(
    title: &str,
    description: &str,
    content_summary: &str,
    num_modules: usize,
) -> String {
    format!(
        "You are an instructional designer building a course.\n\n\
         Course title: {title}\n\
         Course description: {description}\n\n\
         Available source material:\n{content_summary}\n\n\
         Produce a course outline with exactly {num_modules} modules that \
         build from basics to advanced. Respond with ONLY a JSON array of \
         objects shaped like \
         {{\"module_number\": 1, \"title\": \"...\", \"description\": \"...\", \"topics\": [\"...\"]}} \
         and no surrounding prose or markdown."
    )
}

pub fn module_content(title: &str, description: &str, topics: &[String], source: &str) -> String {
    format!(
        "Write a concise, friendly learning module grounded strictly in the \
         source material below. Do not invent facts that the material does \
         not support.\n\n\
         Module title: {title}\n\
         Module description: {description}\n\
         Topics to cover: {}\n\n\
         Source material:\n{source}\n\n\
         Respond with ONLY a JSON object shaped like \
         {{\"overview\": \"...\", \"content\": \"markdown...\", \
         \"key_points\": [\"...\"], \"takeaways\": [\"...\"]}}.",
        topics.join(", ")
    )
}

pub fn quiz(scope: &str, difficulty: QuizDifficulty, count: usize, source: &str) -> String {
    format!(
        "Create {count} multiple-choice questions at {} difficulty testing \
         understanding of: {scope}.\n\n\
         Base every question on the source material below; each question \
         needs exactly four options, one correct answer, and a short \
         explanation.\n\n\
         Source material:\n{source}\n\n\
         Respond with ONLY a JSON array of objects shaped like \
         {{\"question\": \"...\", \"options\": [\"a\",\"b\",\"c\",\"d\"], \
         \"correct_answer_index\": 0, \"explanation\": \"...\"}}.",
        difficulty.as_str()
    )
}
