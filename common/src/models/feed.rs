use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_LEN: usize = 80;

/// A single news article or feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    #[serde(default)]
    pub summary: String,
}

impl FeedItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
            source_name: source_name.into(),
            summary: String::new(),
        }
    }

    pub fn with_published(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Human readable age, e.g. `2h ago`. Empty when the publish date is unknown.
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        let Some(published) = self.published_at else {
            return String::new();
        };

        let seconds = (now - published).num_seconds();
        match seconds {
            s if s < 60 => "just now".to_string(),
            s if s < 3_600 => format!("{}m ago", s / 60),
            s if s < 86_400 => format!("{}h ago", s / 3_600),
            s if s < 604_800 => format!("{}d ago", s / 86_400),
            s => format!("{}w ago", s / 604_800),
        }
    }

    /// Title truncated to a width that fits a panel row.
    pub fn display_title(&self) -> String {
        if self.title.chars().count() <= MAX_TITLE_LEN {
            return self.title.clone();
        }
        let head: String = self.title.chars().take(MAX_TITLE_LEN - 3).collect();
        format!("{head}...")
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
