//! Version-based drift detection between the last processing run and the
//! live wiki.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{ChangedPage, CourseConfig, UpdateReport};
use crate::stores::ContentStore;
use crate::types::CourseError;
use crate::wiki::{WikiClient, resolve_page_set};

/// Diffs the persisted processing snapshot against a freshly resolved page
/// set to decide whether a course needs re-processing.
pub struct UpdateDetector {
    wiki: Arc<dyn WikiClient>,
    content: ContentStore,
}

impl UpdateDetector {
    pub fn new(wiki: Arc<dyn WikiClient>, content: ContentStore) -> Self {
        Self { wiki, content }
    }

    /// Classifies drift as new, deleted, or changed pages.
    ///
    /// Pages present in both sets are compared by wiki version: a strictly
    /// greater current version counts as changed. A failed version lookup
    /// is logged and the page treated as unchanged, best-effort.
    pub async fn check_for_updates(
        &self,
        course_id: &str,
        config: &CourseConfig,
    ) -> Result<UpdateReport, CourseError> {
        let Some(snapshot) = self.content.load_snapshot(course_id).await? else {
            return Ok(UpdateReport {
                needs_update: true,
                new_pages: Vec::new(),
                deleted_pages: Vec::new(),
                changed_pages: Vec::new(),
                reason: "never processed".to_string(),
            });
        };

        let (current, _resolution_failures) = resolve_page_set(self.wiki.as_ref(), config).await;
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
        let snapshot_set: HashSet<&str> = snapshot.page_ids().collect();

        let new_pages: Vec<String> = current
            .iter()
            .filter(|id| !snapshot_set.contains(id.as_str()))
            .cloned()
            .collect();
        let deleted_pages: Vec<String> = snapshot
            .page_ids()
            .filter(|id| !current_set.contains(id))
            .map(str::to_string)
            .collect();

        let mut changed_pages = Vec::new();
        for page_id in current.iter().filter(|id| snapshot_set.contains(id.as_str())) {
            let Some(old_version) = snapshot.version_of(page_id) else {
                continue;
            };
            match self.wiki.fetch_version(page_id).await {
                Ok(new_version) if new_version > old_version => {
                    changed_pages.push(ChangedPage {
                        page_id: page_id.clone(),
                        old_version,
                        new_version,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        page_id = %page_id,
                        error = %err,
                        "version check failed, treating page as unchanged"
                    );
                }
            }
        }

        let needs_update =
            !new_pages.is_empty() || !deleted_pages.is_empty() || !changed_pages.is_empty();
        let reason = summarize(&new_pages, &deleted_pages, &changed_pages);

        Ok(UpdateReport {
            needs_update,
            new_pages,
            deleted_pages,
            changed_pages,
            reason,
        })
    }
}

fn summarize(new: &[String], deleted: &[String], changed: &[ChangedPage]) -> String {
    let mut parts = Vec::new();
    if !new.is_empty() {
        parts.push(count_phrase(new.len(), "new"));
    }
    if !deleted.is_empty() {
        parts.push(count_phrase(deleted.len(), "deleted"));
    }
    if !changed.is_empty() {
        parts.push(count_phrase(changed.len(), "changed"));
    }
    if parts.is_empty() {
        "no changes detected".to_string()
    } else {
        parts.join(", ")
    }
}

fn count_phrase(count: usize, kind: &str) -> String {
    if count == 1 {
        format!("1 {kind} page")
    } else {
        format!("{count} {kind} pages")
    }
}
