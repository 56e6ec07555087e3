//! Data models for the Matter highlights feed
//!
//! Mirrors the subset of the Matter v11 API schema the sync engine reads.
//! Optional fields tolerate both `null` and absence.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of the highlights feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedResponse {
    /// Entries on this page, newest first
    #[serde(default)]
    pub feed: Vec<FeedEntry>,
    /// URL of the next (older) page, if any
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any
    #[serde(default)]
    pub previous: Option<String>,
}

/// A highlighted library item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedEntry {
    /// Stable remote identifier
    pub id: String,
    /// The article the highlights belong to
    pub content: Content,
}

/// Article content and the user's annotations on it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub publisher: Option<Publisher>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub my_note: Option<ContentNote>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub my_annotations: Vec<Annotation>,
    #[serde(default)]
    pub library: Option<LibraryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    #[serde(default)]
    pub any_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publisher {
    #[serde(default)]
    pub any_name: Option<String>,
}

/// The user's free-form note on an article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentNote {
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryEntry {
    pub library_state: i64,
}

/// A single highlight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    /// Highlighted text
    pub text: String,
    /// Optional note attached to the highlight
    #[serde(default)]
    pub note: Option<String>,
    /// When the highlight was made
    pub created_date: DateTime<Utc>,
    /// Word offset of the highlight start, used for reading order
    #[serde(default)]
    pub word_start: i64,
    #[serde(default)]
    pub word_end: i64,
}

impl FeedEntry {
    /// Create an entry with no annotations or optional metadata
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Content {
                title: title.into(),
                url: url.into(),
                author: None,
                publisher: None,
                publication_date: None,
                my_note: None,
                tags: Vec::new(),
                my_annotations: Vec::new(),
                library: None,
            },
        }
    }

    /// Add an annotation (builder style)
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.content.my_annotations.push(annotation);
        self
    }

    /// Annotations in reading order (ascending word offset)
    ///
    /// The sort is stable, so highlights sharing an offset keep feed order.
    pub fn annotations_in_reading_order(&self) -> Vec<&Annotation> {
        let mut annotations: Vec<&Annotation> = self.content.my_annotations.iter().collect();
        annotations.sort_by_key(|a| a.word_start);
        annotations
    }

    /// Annotations created strictly after `after`, in reading order
    ///
    /// With no watermark every annotation counts as new.
    pub fn annotations_since(&self, after: Option<DateTime<Utc>>) -> Vec<&Annotation> {
        self.annotations_in_reading_order()
            .into_iter()
            .filter(|a| after.map_or(true, |after| a.created_date > after))
            .collect()
    }
}

impl Content {
    pub fn author_name(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(|a| a.any_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn publisher_name(&self) -> Option<&str> {
        self.publisher
            .as_ref()
            .and_then(|p| p.any_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn note_text(&self) -> Option<&str> {
        self.my_note
            .as_ref()
            .map(|n| n.note.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }

    /// Publication date as a calendar date (UTC)
    ///
    /// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` timestamps and
    /// bare `YYYY-MM-DD` dates. Unparseable values are treated as absent.
    pub fn published_date(&self) -> Option<NaiveDate> {
        let raw = self.publication_date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.date());
        }
        raw.get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

impl Annotation {
    /// Create an annotation without a note
    pub fn new(text: impl Into<String>, word_start: i64, created_date: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            note: None,
            created_date,
            word_start,
            word_end: word_start,
        }
    }

    /// Attach a note (builder style)
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
