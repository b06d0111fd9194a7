//! The normalized content unit shared across all sources.
//!
//! `Post` represents a single entry from any source (syndication feed, wall
//! text, wall link).  Every source converts its native items into `Post`s so
//! the ingestion loop and the dispatcher stay source-agnostic.
//!
//! A `Post` cannot be mutated in place.  Refinement (see
//! [`TextBlockParser`](super::TextBlockParser)) consumes a post and returns a
//! new one through the `with_*` builders.

use chrono::{DateTime, Utc};

/// A single post, normalized from any source.
///
/// The title is never blank: [`Post::new`] refuses to build one otherwise.
/// Optional fields are either absent or hold non-blank text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Post {
    source_name: String,
    timestamp: DateTime<Utc>,
    title: String,
    summary: Option<String>,
    full_text: Option<String>,
    url: Option<String>,
}

impl Post {
    /// Build a post, or `None` when `title` is blank.
    pub fn new(
        source_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        title: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return None;
        }
        Some(Self {
            source_name: source_name.into(),
            timestamp,
            title,
            summary: None,
            full_text: None,
            url: None,
        })
    }

    /// Replace the title.  A blank replacement is ignored.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        if let Some(title) = non_blank(title.into()) {
            self.title = title;
        }
        self
    }

    /// Set the lead paragraph.  A blank summary is ignored.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        if let Some(summary) = non_blank(summary.into()) {
            self.summary = Some(summary);
        }
        self
    }

    /// Set the full article body.  A blank body is ignored.
    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        if let Some(full_text) = non_blank(full_text.into()) {
            self.full_text = Some(full_text);
        }
        self
    }

    /// Set the link to the original.  A blank url is ignored.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        if let Some(url) = non_blank(url.into()) {
            self.url = Some(url);
        }
        self
    }

    /// Configured name of the source that produced this post.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Publication instant, compared against the watermark.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Headline; never blank.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Short description, if the source provided one.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Full article body, only for sources configured to carry it.
    pub fn full_text(&self) -> Option<&str> {
        self.full_text.as_deref()
    }

    /// Link to the original item.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// True when this post is strictly newer than `watermark`.
    ///
    /// Posts stamped exactly at the watermark were already handled by the
    /// cycle that set it.
    pub fn is_newer_than(&self, watermark: DateTime<Utc>) -> bool {
        self.timestamp > watermark
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
