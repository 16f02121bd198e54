//! Wiki content capability: page fetching, folder structure, and page-set
//! resolution.
//!
//! The pipeline consumes wiki content through the [`WikiClient`] trait so
//! tests can substitute in-memory fakes; [`HttpWikiClient`] talks to a
//! Confluence-style REST API.

pub mod http;

pub use http::HttpWikiClient;

use async_trait::async_trait;

use crate::models::{CourseConfig, PageFailure};
use crate::types::CourseError;

/// A fetched wiki document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WikiPage {
    pub id: String,
    pub title: String,
    /// Storage-format HTML body.
    pub body_html: String,
    /// Monotonically increasing wiki revision number.
    pub version: i64,
    pub url: String,
}

/// Capability trait for the wiki content API.
#[async_trait]
pub trait WikiClient: Send + Sync {
    /// Fetches a page with its body and version stamp.
    async fn fetch_page(&self, page_id: &str) -> Result<WikiPage, CourseError>;

    /// Fetches only the current version stamp of a page.
    ///
    /// The default goes through [`fetch_page`](Self::fetch_page);
    /// implementations may override with a lighter call.
    async fn fetch_version(&self, page_id: &str) -> Result<i64, CourseError> {
        Ok(self.fetch_page(page_id).await?.version)
    }

    /// Whether the page has at least one child page.
    async fn has_children(&self, page_id: &str) -> Result<bool, CourseError>;

    /// Child page IDs, optionally descending through the whole subtree.
    async fn list_children(
        &self,
        page_id: &str,
        recursive: bool,
    ) -> Result<Vec<String>, CourseError>;
}

/// Resolves a config's linked pages into the working page set.
///
/// With folder recursion enabled, a linked page that has children is
/// replaced by its descendant set; the parent itself is excluded. An ID
/// whose child-check or expansion fails is excluded from the set and
/// reported as a resolution failure instead of aborting the whole
/// resolution. The returned IDs preserve input/traversal order with
/// duplicates removed.
pub async fn resolve_page_set(
    client: &dyn WikiClient,
    config: &CourseConfig,
) -> (Vec<String>, Vec<PageFailure>) {
    let mut resolved: Vec<String> = Vec::new();
    let mut failures = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    if !config.settings.folder_recursion {
        for id in &config.linked_pages {
            if seen.insert(id.clone()) {
                resolved.push(id.clone());
            }
        }
        return (resolved, failures);
    }

    for id in &config.linked_pages {
        match client.has_children(id).await {
            Ok(true) => match client.list_children(id, true).await {
                Ok(children) => {
                    tracing::debug!(page_id = %id, children = children.len(), "expanded folder page");
                    for child in children {
                        if seen.insert(child.clone()) {
                            resolved.push(child);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(page_id = %id, error = %err, "folder expansion failed");
                    failures.push(PageFailure {
                        page_id: id.clone(),
                        error: err.to_string(),
                    });
                }
            },
            Ok(false) => {
                if seen.insert(id.clone()) {
                    resolved.push(id.clone());
                }
            }
            Err(err) => {
                tracing::warn!(page_id = %id, error = %err, "child check failed");
                failures.push(PageFailure {
                    page_id: id.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    (resolved, failures)
}
