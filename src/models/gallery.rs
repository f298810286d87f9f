use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATIC_IMAGES_PATH: &str = "/static/images";

/// One element of `GET /images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: usize,
    pub filename: String,
    pub url: String,
    pub prompt: String,
    pub created_at: String,
}

impl GalleryItem {
    pub fn from_entry(id: usize, entry: ImageEntry) -> Self {
        GalleryItem {
            id,
            url: format!("{}/{}", STATIC_IMAGES_PATH, entry.filename),
            filename: entry.filename,
            prompt: entry
                .prompt
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            created_at: entry
                .created_at
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }

    /// Long-form date such as "May 10, 2023"; the raw value if it does not parse.
    pub fn display_date(&self) -> String {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.created_at) {
            return ts.format("%B %-d, %Y").to_string();
        }
        // The backend writes naive ISO timestamps with optional fractions.
        if let Ok(ts) = NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f") {
            return ts.format("%B %-d, %Y").to_string();
        }
        self.created_at.clone()
    }

    pub fn matches(&self, term: &str) -> bool {
        self.prompt.to_lowercase().contains(&term.to_lowercase())
    }
}
