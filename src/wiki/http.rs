//! Confluence-style REST implementation of [`WikiClient`].

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{WikiClient, WikiPage};
use crate::types::CourseError;

/// HTTP wiki client with basic-auth credentials.
///
/// Construct with [`new`](Self::new) for explicit configuration or
/// [`from_env`](Self::from_env) for environment-driven setup.
#[derive(Clone, Debug)]
pub struct HttpWikiClient {
    client: reqwest::Client,
    /// REST API root, e.g. `https://acme.example/wiki/rest/api`.
    api_base: String,
    /// Site root used to resolve page web links.
    site_base: String,
    email: String,
    token: String,
}

impl HttpWikiClient {
    /// Builds a client for the given site.
    ///
    /// Some sites carry the `/wiki` context path and some don't; the API
    /// root is normalized either way.
    pub fn new(
        base_url: &str,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, CourseError> {
        let parsed = Url::parse(base_url)
            .map_err(|err| CourseError::Validation(format!("invalid wiki base URL: {err}")))?;
        if !parsed.has_host() {
            return Err(CourseError::Validation(format!(
                "wiki base URL {base_url} has no host"
            )));
        }
        let base = base_url.trim_end_matches('/');
        let api_base = if base.contains("/wiki") {
            format!("{base}/rest/api")
        } else {
            format!("{base}/wiki/rest/api")
        };
        let site_base = api_base.trim_end_matches("/rest/api").to_string();
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|err| CourseError::Fetch(err.to_string()))?;
        Ok(Self {
            client,
            api_base,
            site_base,
            email: email.into(),
            token: token.into(),
        })
    }

    /// Reads `COURSESMITH_WIKI_URL`, `COURSESMITH_WIKI_EMAIL`, and
    /// `COURSESMITH_WIKI_TOKEN` (a `.env` file is honored).
    pub fn from_env() -> Result<Self, CourseError> {
        dotenvy::dotenv().ok();
        let base = require_env("COURSESMITH_WIKI_URL")?;
        let email = require_env("COURSESMITH_WIKI_EMAIL")?;
        let token = require_env("COURSESMITH_WIKI_TOKEN")?;
        Self::new(&base, email, token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CourseError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.email, Some(&self.token))
            .query(query)
            .send()
            .await
            .map_err(|err| CourseError::Fetch(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CourseError::NotFound(format!("wiki resource {url}")));
        }
        let response = response
            .error_for_status()
            .map_err(|err| CourseError::Fetch(err.to_string()))?;
        response
            .json::<T>()
            .await
            .map_err(|err| CourseError::Fetch(err.to_string()))
    }

    async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>, CourseError> {
        let url = format!("{}/content/{}/child/page", self.api_base, parent_id);
        let payload: ChildListing = self.get_json(&url, &[("limit", "100")]).await?;
        Ok(payload.results.into_iter().map(|c| c.id).collect())
    }
}

fn require_env(key: &str) -> Result<String, CourseError> {
    std::env::var(key).map_err(|_| CourseError::Validation(format!("{key} is not set")))
}

#[async_trait]
impl WikiClient for HttpWikiClient {
    async fn fetch_page(&self, page_id: &str) -> Result<WikiPage, CourseError> {
        let url = format!("{}/content/{}", self.api_base, page_id);
        let payload: PagePayload = self
            .get_json(&url, &[("expand", "body.storage,version")])
            .await?;
        Ok(WikiPage {
            url: format!("{}{}", self.site_base, payload.links.webui),
            id: payload.id,
            title: payload.title,
            body_html: payload.body.storage.value,
            version: payload.version.number,
        })
    }

    async fn fetch_version(&self, page_id: &str) -> Result<i64, CourseError> {
        let url = format!("{}/content/{}", self.api_base, page_id);
        let payload: VersionOnlyPayload = self.get_json(&url, &[("expand", "version")]).await?;
        Ok(payload.version.number)
    }

    async fn has_children(&self, page_id: &str) -> Result<bool, CourseError> {
        let url = format!("{}/content/{}/child/page", self.api_base, page_id);
        let payload: ChildListing = self.get_json(&url, &[("limit", "1")]).await?;
        Ok(!payload.results.is_empty())
    }

    async fn list_children(
        &self,
        page_id: &str,
        recursive: bool,
    ) -> Result<Vec<String>, CourseError> {
        let mut collected = Vec::new();
        let mut queue = VecDeque::from([page_id.to_string()]);
        while let Some(parent) = queue.pop_front() {
            let children = self.child_ids(&parent).await?;
            if recursive {
                queue.extend(children.iter().cloned());
            }
            collected.extend(children);
        }
        Ok(collected)
    }
}

#[derive(Deserialize)]
struct PagePayload {
    id: String,
    title: String,
    #[serde(default)]
    body: BodyPayload,
    version: VersionPayload,
    #[serde(default, rename = "_links")]
    links: LinksPayload,
}

#[derive(Default, Deserialize)]
struct BodyPayload {
    #[serde(default)]
    storage: StoragePayload,
}

#[derive(Default, Deserialize)]
struct StoragePayload {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct VersionPayload {
    number: i64,
}

#[derive(Deserialize)]
struct VersionOnlyPayload {
    version: VersionPayload,
}

#[derive(Default, Deserialize)]
struct LinksPayload {
    #[serde(default)]
    webui: String,
}

#[derive(Deserialize)]
struct ChildListing {
    #[serde(default)]
    results: Vec<ChildEntry>,
}

#[derive(Deserialize)]
struct ChildEntry {
    id: String,
}
