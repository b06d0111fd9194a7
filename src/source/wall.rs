//! Social-network wall sources.
//!
//! [`Wall`] is the shared base: it turns the configured alias into a
//! [`WallTarget`], fetches one bounded page of recent items and drops paid
//! placements.  The two sources built on it differ only in how an item
//! becomes a [`Post`]:
//!
//! * [`WallTextSource`] — the item text is the title, the permalink the url.
//!   An optional [`TextBlockParser`] then re-derives title/summary/url.
//! * [`WallLinkSource`] — title and url come from the first link attachment.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::{Post, Source, SourceError, TextBlockParser, TransportError};

/// Items requested per poll.  Sized for the polling cadence; older items are
/// never paged in.
pub const WALL_PAGE_SIZE: u32 = 30;

/// Aliases of the form `club123` / `public123` name a community by id.
static NUMERIC_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:club|public)(\d+)$").expect("alias pattern is valid"));

/// One raw wall post as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WallItem {
    /// Post id, unique within the wall.
    pub id: i64,
    /// Author id; negative for communities.  Part of the permalink.
    pub from_id: i64,
    /// Unix seconds.
    pub date: i64,
    /// Body text; empty for attachment-only posts.
    #[serde(default)]
    pub text: String,
    /// Non-zero for paid placements.
    #[serde(default)]
    pub marked_as_ads: i64,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One attachment of a wall item.  Only links are modelled.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment type as reported by the API (`link`, `photo`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Present when `kind` is `link`.
    pub link: Option<LinkAttachment>,
}

/// A shared link.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LinkAttachment {
    /// Target of the link.
    #[serde(default)]
    pub url: String,
    /// Title of the linked page; may be empty.
    #[serde(default)]
    pub title: String,
}

impl WallItem {
    /// True for paid placements, which never become posts.
    pub fn is_ad(&self) -> bool {
        self.marked_as_ads > 0
    }

    /// Post time as UTC, `None` for an out-of-range epoch.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.date, 0).single()
    }

    /// The first attachment that is a link, skipping photos and the like.
    pub fn first_link(&self) -> Option<&LinkAttachment> {
        self.attachments.iter().find_map(|a| a.link.as_ref())
    }
}

/// How the listing endpoint is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WallTarget {
    /// Screen name.
    Domain(String),
    /// Numeric owner id; communities are negative.
    Owner(i64),
}

impl WallTarget {
    pub fn from_alias(alias: &str) -> Self {
        NUMERIC_ALIAS
            .captures(alias)
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .map(|id| Self::Owner(-id))
            .unwrap_or_else(|| Self::Domain(alias.to_string()))
    }
}

/// Lists recent wall items.
pub trait WallTransport: Send + Sync {
    fn fetch_wall(&self, target: &WallTarget, count: u32) -> Result<Vec<WallItem>, TransportError>;
}

/// Shared wall fetching: target resolution, bounded page, ad filtering.
pub struct Wall {
    alias: String,
    target: WallTarget,
    transport: Arc<dyn WallTransport>,
}

impl Wall {
    pub fn new(alias: impl Into<String>, transport: Arc<dyn WallTransport>) -> Self {
        let alias = alias.into();
        Self {
            target: WallTarget::from_alias(&alias),
            alias,
            transport,
        }
    }

    /// Fetch one page, newest first, without paid placements.
    pub fn fetch_items(&self) -> Result<Vec<WallItem>, SourceError> {
        let items = self
            .transport
            .fetch_wall(&self.target, WALL_PAGE_SIZE)
            .map_err(|source| SourceError::Unavailable {
                address: self.alias.clone(),
                source,
            })?;
        Ok(items.into_iter().filter(|item| !item.is_ad()).collect())
    }

    /// Stable link to one item on this wall.
    pub fn permalink(&self, item: &WallItem) -> String {
        format!("https://vk.com/{}?w=wall{}_{}", self.alias, item.from_id, item.id)
    }
}

/// Free-text wall posts.
pub struct WallTextSource {
    name: String,
    wall: Wall,
    parser: Option<TextBlockParser>,
}

impl WallTextSource {
    pub fn new(
        name: impl Into<String>,
        alias: impl Into<String>,
        transport: Arc<dyn WallTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            wall: Wall::new(alias, transport),
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: TextBlockParser) -> Self {
        self.parser = Some(parser);
        self
    }

    fn post_from_item(&self, item: &WallItem) -> Option<Post> {
        let Some(posted_at) = item.posted_at() else {
            tracing::debug!(source = %self.name, id = item.id, date = item.date, "bad item date, skipped");
            return None;
        };
        let Some(post) = Post::new(&self.name, posted_at, item.text.as_str()) else {
            tracing::debug!(source = %self.name, id = item.id, "item without text, skipped");
            return None;
        };
        Some(post.with_url(self.wall.permalink(item)))
    }
}

impl Source for WallTextSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, watermark: DateTime<Utc>) -> Result<Vec<Post>, SourceError> {
        let items = self.wall.fetch_items()?;
        let posts = items
            .iter()
            .filter_map(|item| self.post_from_item(item))
            .filter(|post| post.is_newer_than(watermark));

        Ok(match self.parser {
            Some(parser) => posts.map(|post| parser.refine(post)).collect(),
            None => posts.collect(),
        })
    }
}

/// Wall posts that share a link: the attachment is the content.
pub struct WallLinkSource {
    name: String,
    wall: Wall,
}

impl WallLinkSource {
    pub fn new(
        name: impl Into<String>,
        alias: impl Into<String>,
        transport: Arc<dyn WallTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            wall: Wall::new(alias, transport),
        }
    }

    fn post_from_item(&self, item: &WallItem) -> Option<Post> {
        let Some(link) = item.first_link() else {
            tracing::debug!(source = %self.name, id = item.id, "item without a link attachment, skipped");
            return None;
        };
        let Some(posted_at) = item.posted_at() else {
            tracing::debug!(source = %self.name, id = item.id, date = item.date, "bad item date, skipped");
            return None;
        };
        let Some(post) = Post::new(&self.name, posted_at, link.title.as_str()) else {
            tracing::debug!(source = %self.name, id = item.id, "link without a title, skipped");
            return None;
        };
        Some(post.with_url(link.url.as_str()))
    }
}

impl Source for WallLinkSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, watermark: DateTime<Utc>) -> Result<Vec<Post>, SourceError> {
        Ok(self
            .wall
            .fetch_items()?
            .iter()
            .filter_map(|item| self.post_from_item(item))
            .filter(|post| post.is_newer_than(watermark))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
