use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::local_day;

/// Notification category. Unknown categories from older payloads are kept
/// verbatim so a round-trip never rewrites them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Irrigation,
    Germination,
    Fertilizer,
    #[default]
    Info,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Irrigation => "irrigation",
            Category::Germination => "germination",
            Category::Fertilizer => "fertilizer",
            Category::Info => "info",
            Category::Other(raw) => raw,
        }
    }

    /// Short label used by text renderers in place of an icon.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Irrigation => "water",
            Category::Germination => "sprout",
            Category::Fertilizer => "feed",
            Category::Info | Category::Other(_) => "info",
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "irrigation" => Category::Irrigation,
            "germination" => Category::Germination,
            "fertilizer" => Category::Fertilizer,
            "info" => Category::Info,
            _ => Category::Other(raw),
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Category::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    /// Identifier of the plant (or other entity) the record is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl NotificationRecord {
    pub fn is_unread(&self) -> bool {
        !self.read
    }

    pub fn created_on(&self) -> NaiveDate {
        local_day(self.timestamp)
    }

    pub fn is_about(&self, subject: &str, category: &Category) -> bool {
        self.subject.as_deref() == Some(subject) && &self.category == category
    }
}

pub fn unread_count(records: &[NotificationRecord]) -> usize {
    records.iter().filter(|record| record.is_unread()).count()
}
