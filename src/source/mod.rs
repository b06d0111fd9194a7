//! Source abstraction layer.
//!
//! This module defines the [`Source`] trait and the common [`Post`] type.
//! Concrete sources live in sub-modules:
//!
//! * [`syndication`] — RSS / Atom feeds.
//! * [`wall`] — social-network walls, as raw text posts or as link posts.
//! * [`text_block`] — strategies that refine raw wall text into fields.
//! * [`vk`] — the HTTP wall transport.
//!
//! ## For contributors — adding a new source kind
//!
//! 1. Implement [`Source`] for a new struct in its own file.
//! 2. Add a variant to [`SourceConfig`](crate::config::SourceConfig).
//! 3. Build it in [`build`].
//!
//! The ingestion loop never looks past the trait.

mod post;
pub mod syndication;
pub mod text_block;
pub mod vk;
pub mod wall;

pub use post::Post;
pub use syndication::{FeedEntry, FeedTransport, HttpFeedTransport, SyndicationSource};
pub use text_block::TextBlockParser;
pub use vk::VkWallTransport;
pub use wall::{WallItem, WallLinkSource, WallTarget, WallTextSource, WallTransport};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::SourceConfig;

/// Failures of the collaborator that moves bytes for a source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not a valid RSS or Atom feed: {0}")]
    InvalidFeed(String),

    #[error("wall API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A source could not produce anything this cycle.
///
/// Item-level problems never surface here; they only skip the item.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{address} unavailable: {source}")]
    Unavailable {
        address: String,
        #[source]
        source: TransportError,
    },
}

/// Trait that every source must implement.
///
/// `fetch` takes `&self`: whatever a source buffers while fetching lives on
/// the call's stack, so one cycle can never see another cycle's items.
pub trait Source: Send {
    /// Human-readable name, copied into every [`Post`] this source emits.
    fn name(&self) -> &str;

    /// Fetch posts strictly newer than `watermark`, newest first, in the
    /// order the upstream listed them.
    fn fetch(&self, watermark: DateTime<Utc>) -> Result<Vec<Post>, SourceError>;
}

/// Transports shared by all sources built from one configuration.
#[derive(Clone)]
pub struct Transports {
    pub feed: Arc<dyn FeedTransport>,
    /// `None` when no wall credentials are configured.
    pub wall: Option<Arc<dyn WallTransport>>,
}

#[derive(Debug, Error)]
#[error("source {name:?} needs a wall transport, but no wall access token is configured")]
pub struct MissingWallTransport {
    pub name: String,
}

/// Build a source from its configuration entry.
pub fn build(
    config: &SourceConfig,
    transports: &Transports,
) -> Result<Box<dyn Source>, MissingWallTransport> {
    let wall_transport = |name: &str| {
        transports.wall.clone().ok_or_else(|| MissingWallTransport {
            name: name.to_string(),
        })
    };

    let source: Box<dyn Source> = match config {
        SourceConfig::Syndication {
            name,
            address,
            full_text,
        } => Box::new(SyndicationSource::new(
            name,
            address,
            *full_text,
            transports.feed.clone(),
        )),
        SourceConfig::WallText {
            name,
            address,
            text_parser,
        } => {
            let source = WallTextSource::new(name, address, wall_transport(name)?);
            match text_parser {
                Some(parser) => Box::new(source.with_parser(*parser)),
                None => Box::new(source),
            }
        }
        SourceConfig::WallLink { name, address } => {
            Box::new(WallLinkSource::new(name, address, wall_transport(name)?))
        }
    };
    Ok(source)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::testing::{StubFeeds, StubWalls};
    use super::*;

    fn transports(with_wall: bool) -> Transports {
        Transports {
            feed: Arc::new(StubFeeds::default()),
            wall: with_wall.then(|| Arc::new(StubWalls::default()) as Arc<dyn WallTransport>),
        }
    }

    #[test]
    fn builds_every_kind_with_its_name() {
        let configs = vec![
            SourceConfig::Syndication {
                name: "Feed".into(),
                address: "http://example.com/rss".into(),
                full_text: true,
            },
            SourceConfig::WallText {
                name: "Text".into(),
                address: "some_wall".into(),
                text_parser: Some(TextBlockParser::Pattern),
            },
            SourceConfig::WallLink {
                name: "Links".into(),
                address: "club42".into(),
            },
        ];

        let names: Vec<String> = configs
            .iter()
            .map(|c| build(c, &transports(true)).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["Feed", "Text", "Links"]);
    }

    #[test]
    fn wall_source_without_transport_is_rejected() {
        let config = SourceConfig::WallLink {
            name: "Links".into(),
            address: "club42".into(),
        };
        let err = build(&config, &transports(false)).err().unwrap();
        assert_eq!(err.name, "Links");
    }

    #[test]
    fn syndication_source_needs_no_wall_transport() {
        let config = SourceConfig::Syndication {
            name: "Feed".into(),
            address: "http://example.com/rss".into(),
            full_text: false,
        };
        assert!(build(&config, &transports(false)).is_ok());
    }
}
