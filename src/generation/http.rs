//! Gemini-style `generateContent` implementation of [`TextGenerator`].

use async_trait::async_trait;
use serde::Deserialize;

use super::TextGenerator;
use crate::types::CourseError;

/// HTTP generation backend.
#[derive(Clone, Debug)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpTextGenerator {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, CourseError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|err| CourseError::Generation(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Reads `COURSESMITH_TEXTGEN_URL`, `COURSESMITH_TEXTGEN_MODEL`, and
    /// `COURSESMITH_TEXTGEN_API_KEY` (a `.env` file is honored).
    pub fn from_env() -> Result<Self, CourseError> {
        dotenvy::dotenv().ok();
        let base = env_var("COURSESMITH_TEXTGEN_URL")?;
        let model = env_var("COURSESMITH_TEXTGEN_MODEL")?;
        let key = env_var("COURSESMITH_TEXTGEN_API_KEY")?;
        Self::new(&base, model, key)
    }
}

fn env_var(key: &str) -> Result<String, CourseError> {
    std::env::var(key).map_err(|_| CourseError::Validation(format!("{key} is not set")))
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CourseError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| CourseError::Generation(err.to_string()))?
            .error_for_status()
            .map_err(|err| CourseError::Generation(err.to_string()))?;
        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|err| CourseError::Generation(err.to_string()))?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CourseError::Generation("empty completion".into()));
        }
        Ok(text)
    }
}
