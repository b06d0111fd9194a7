//! Syndication feed source (RSS 2.0 and Atom).
//!
//! Fetching and parsing sit behind [`FeedTransport`] so the source logic
//! (title requirement, full-text flag, watermark filter) can be tested
//! without a network.  [`HttpFeedTransport`] is the real thing: a blocking
//! `reqwest` GET followed by [`parse_feed`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{Post, Source, SourceError, TransportError};

/// Extension namespace prefix and element carrying an article's full text.
const FULL_TEXT_PREFIX: &str = "yandex";
const FULL_TEXT_ELEMENT: &str = "full-text";

/// One feed entry as handed over by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// Full article text from the feed's full-text extension, if present.
    pub full_text: Option<String>,
}

/// Retrieves and parses a feed.
///
/// An `Err` means the feed is unreachable or not a feed at all.  A valid feed
/// with no entries is `Ok(vec![])`.
pub trait FeedTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, TransportError>;
}

/// Feed transport over HTTP.
pub struct HttpFeedTransport {
    client: reqwest::blocking::Client,
}

impl HttpFeedTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FeedTransport for HttpFeedTransport {
    fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, TransportError> {
        let body = self.client.get(url).send()?.error_for_status()?.bytes()?;
        parse_feed(&body)
    }
}

/// Parse raw feed bytes into entries.
///
/// RSS is tried first with the [`rss`] crate, which keeps namespaced
/// extensions such as `yandex:full-text`.  Anything else goes to
/// [`feed_rs`], which covers Atom.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>, TransportError> {
    match rss::Channel::read_from(body) {
        Ok(channel) => Ok(channel.items().iter().map(entry_from_rss).collect()),
        Err(rss_err) => match feed_rs::parser::parse(body) {
            Ok(feed) => Ok(feed.entries.into_iter().map(entry_from_atom).collect()),
            Err(atom_err) => Err(TransportError::InvalidFeed(format!(
                "rss: {rss_err}; atom: {atom_err}"
            ))),
        },
    }
}

fn entry_from_rss(item: &rss::Item) -> FeedEntry {
    // <pubDate> is RFC 2822; some feeds only carry <dc:date> (RFC 3339).
    let published = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().first())
                .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
        })
        .map(|dt| dt.with_timezone(&Utc));

    let full_text = item
        .extensions()
        .get(FULL_TEXT_PREFIX)
        .and_then(|ns| ns.get(FULL_TEXT_ELEMENT))
        .and_then(|values| values.first())
        .and_then(|ext| ext.value())
        .map(String::from);

    FeedEntry {
        title: item.title().map(String::from),
        summary: item.description().map(String::from),
        link: item.link().map(String::from),
        published,
        full_text,
    }
}

fn entry_from_atom(entry: feed_rs::model::Entry) -> FeedEntry {
    FeedEntry {
        title: entry.title.map(|t| t.content),
        summary: entry.summary.map(|t| t.content),
        link: entry.links.into_iter().next().map(|l| l.href),
        published: entry.published.or(entry.updated),
        full_text: None,
    }
}

/// A syndication feed polled over a [`FeedTransport`].
pub struct SyndicationSource {
    name: String,
    url: String,
    /// Whether this feed publishes full article text worth relaying.
    full_text: bool,
    transport: Arc<dyn FeedTransport>,
}

impl SyndicationSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        full_text: bool,
        transport: Arc<dyn FeedTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            full_text,
            transport,
        }
    }

    /// Turn parsed entries into posts newer than `watermark`.
    ///
    /// Pure (no I/O) so tests can drive it directly.
    pub fn posts_from_entries(
        &self,
        entries: Vec<FeedEntry>,
        watermark: DateTime<Utc>,
    ) -> Vec<Post> {
        let mut posts = Vec::new();
        for entry in entries {
            let Some(published) = entry.published else {
                tracing::debug!(source = %self.name, title = ?entry.title, "entry without a usable date, skipped");
                continue;
            };
            let Some(mut post) = entry
                .title
                .and_then(|title| Post::new(&self.name, published, title))
            else {
                tracing::debug!(source = %self.name, link = ?entry.link, "entry without a title, skipped");
                continue;
            };
            if !post.is_newer_than(watermark) {
                continue;
            }

            if let Some(summary) = entry.summary {
                post = post.with_summary(summary);
            }
            if let Some(link) = entry.link {
                post = post.with_url(link);
            }
            if self.full_text {
                if let Some(text) = entry.full_text {
                    post = post.with_full_text(text);
                }
            }
            posts.push(post);
        }
        posts
    }
}

impl Source for SyndicationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, watermark: DateTime<Utc>) -> Result<Vec<Post>, SourceError> {
        let entries = self
            .transport
            .fetch(&self.url)
            .map_err(|source| SourceError::Unavailable {
                address: self.url.clone(),
                source,
            })?;
        Ok(self.posts_from_entries(entries, watermark))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
