use serde::Serialize;
use std::fmt;

use crate::model::ArticleId;

/// Notice rendered after a manual run that imported nothing.
pub const NOTHING_IMPORTED_NOTICE: &str =
    "No new posts imported. Check the feeds or whether they were already imported.";

/// What happened to one feed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// The newest item was published.
    Imported { article_id: ArticleId, title: String },
    /// An article with the same title is already published.
    SkippedDuplicate { title: String },
    /// The feed could not be fetched or parsed.
    SkippedInvalidFeed { url: String },
    /// The configured URL was empty or malformed; nothing was fetched.
    SkippedInvalidUrl { url: String },
    /// The store rejected the article or could not be queried.
    Failed { url: String, reason: String },
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, ImportOutcome::Imported { .. })
    }
}

/// Human-readable status line for the manual import path.
impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportOutcome::Imported { title, .. } => {
                write!(f, "Post \"{title}\" imported successfully!")
            }
            ImportOutcome::SkippedDuplicate { title } => {
                write!(f, "Post \"{title}\" already exists. Skipping import.")
            }
            ImportOutcome::SkippedInvalidFeed { url } => write!(f, "Error loading feed {url}."),
            ImportOutcome::SkippedInvalidUrl { url } if url.trim().is_empty() => {
                write!(f, "Feed slot is empty. Skipping.")
            }
            ImportOutcome::SkippedInvalidUrl { url } => {
                write!(f, "Feed URL \"{url}\" is not a valid URL. Skipping.")
            }
            ImportOutcome::Failed { url, reason } => {
                write!(f, "Failed to import the post from {url}: {reason}")
            }
        }
    }
}

/// Ordered per-feed outcomes of one run, in feed configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportResult {
    pub fn push(&mut self, outcome: ImportOutcome) {
        self.outcomes.push(outcome);
    }

    /// True iff at least one feed produced an `Imported` outcome.
    pub fn any_imported(&self) -> bool {
        self.outcomes.iter().any(ImportOutcome::is_imported)
    }

    pub fn imported_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_imported()).count()
    }

    /// One line per outcome in order, followed by a notice when nothing was
    /// imported.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.outcomes.iter().map(ToString::to_string).collect();
        if !self.any_imported() {
            lines.push(NOTHING_IMPORTED_NOTICE.to_string());
        }
        lines
    }
}
