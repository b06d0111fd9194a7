//! Structured-field extraction from free-text wall posts.
//!
//! Some wall accounts publish news as a plain text block: a headline, maybe a
//! lead paragraph, and a link.  A [`TextBlockParser`] re-derives those fields
//! from a post whose title still holds the raw text.  Which strategy fits is a
//! property of the account, so it is chosen in the source configuration and
//! never auto-detected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::Post;

/// Headline block, optional summary block, link line.  A block is a run of
/// non-blank lines; blocks are separated by at least one blank line and
/// leading blank lines are skipped.  Expects `\n` line endings.
static BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\A\s*(?P<title>\S.*(?:\n[ \t]*\S.*)*)\n[ \t]*\n\s*",
        r"(?:(?P<summary>\S.*(?:\n[ \t]*\S.*)*)\n[ \t]*\n\s*)?",
        r"(?P<url>\S.*)",
    ))
    .expect("text block pattern is valid")
});

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextBlockParser {
    /// Blank-line separated blocks: title, optional summary, url.
    Pattern,
    /// One field per non-blank line: title, url, summary.
    LineSplit,
}

impl TextBlockParser {
    /// Refine `post` using its current title as the raw text.
    ///
    /// Never fails: text the strategy cannot make sense of is logged and the
    /// post comes back with whatever could be kept.
    pub fn refine(self, post: Post) -> Post {
        match self {
            Self::Pattern => refine_by_pattern(post),
            Self::LineSplit => refine_by_lines(post),
        }
    }
}

fn refine_by_pattern(post: Post) -> Post {
    let text = post.title().replace("\r\n", "\n");
    let fields = BLOCKS.captures(&text).map(|caps| {
        let field = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };
        (field("title"), field("summary"), field("url"))
    });
    let Some((title, summary, url)) = fields else {
        tracing::warn!(
            source = post.source_name(),
            text = post.title(),
            "text block did not match, keeping raw title"
        );
        return post;
    };

    let mut post = post;
    if let Some(title) = title {
        post = post.with_title(title);
    }
    if let Some(summary) = summary {
        post = post.with_summary(summary);
    }
    if let Some(url) = url {
        post = post.with_url(url);
    }
    post
}

fn refine_by_lines(post: Post) -> Post {
    let lines: Vec<String> = post
        .title()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    if lines.len() < 2 {
        tracing::warn!(
            source = post.source_name(),
            lines = lines.len(),
            "text block has fewer than two lines, keeping title only"
        );
        return match lines.into_iter().next() {
            Some(first) => post.with_title(first),
            None => post,
        };
    }

    let mut fields = lines.into_iter();
    let mut post = post;
    if let Some(title) = fields.next() {
        post = post.with_title(title);
    }
    if let Some(url) = fields.next() {
        post = post.with_url(url);
    }
    if let Some(summary) = fields.next() {
        post = post.with_summary(summary);
    }
    post
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(text: &str) -> Post {
        Post::new("wall", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), text)
            .unwrap()
            .with_url("https://vk.com/acct?w=wall-1_1")
    }

    #[test]
    fn pattern_extracts_three_blocks() {
        let post = TextBlockParser::Pattern.refine(raw("Title line\n\nSummary line\n\nhttp://x"));
        assert_eq!(post.title(), "Title line");
        assert_eq!(post.summary(), Some("Summary line"));
        assert_eq!(post.url(), Some("http://x"));
    }

    #[test]
    fn pattern_skips_leading_blank_lines() {
        let post = TextBlockParser::Pattern.refine(raw("   \n\nHeadline\n\nhttps://e.com"));
        assert_eq!(post.title(), "Headline");
        assert!(post.summary().is_none());
        assert_eq!(post.url(), Some("https://e.com"));
    }

    #[test]
    fn pattern_summary_spans_several_lines() {
        let post = TextBlockParser::Pattern.refine(raw("Title\n\nLead a\nLead b\n\nhttp://x"));
        assert_eq!(post.title(), "Title");
        assert_eq!(post.summary(), Some("Lead a\nLead b"));
        assert_eq!(post.url(), Some("http://x"));
    }

    #[test]
    fn pattern_accepts_crlf_line_endings() {
        let post = TextBlockParser::Pattern.refine(raw("Title\r\n\r\nSummary\r\n\r\nhttp://x"));
        assert_eq!(post.title(), "Title");
        assert_eq!(post.summary(), Some("Summary"));
        assert_eq!(post.url(), Some("http://x"));
    }

    #[test]
    fn pattern_without_summary_block() {
        let post = TextBlockParser::Pattern.refine(raw("Headline\n\n\nhttps://example.com/a"));
        assert_eq!(post.title(), "Headline");
        assert!(post.summary().is_none());
        assert_eq!(post.url(), Some("https://example.com/a"));
    }

    #[test]
    fn pattern_tolerates_whitespace_only_separator_lines() {
        let post = TextBlockParser::Pattern.refine(raw("Headline\n   \nLead\n\t\nhttps://e.com"));
        assert_eq!(post.title(), "Headline");
        assert_eq!(post.summary(), Some("Lead"));
        assert_eq!(post.url(), Some("https://e.com"));
    }

    #[test]
    fn pattern_without_blank_lines_leaves_post_untouched() {
        let unparsed = raw("Title line\nSummary line\nhttp://x");
        let post = TextBlockParser::Pattern.refine(unparsed.clone());
        assert_eq!(post, unparsed);
    }

    #[test]
    fn pattern_single_line_leaves_post_untouched() {
        let unparsed = raw("Only a headline");
        assert_eq!(TextBlockParser::Pattern.refine(unparsed.clone()), unparsed);
    }

    #[test]
    fn line_split_assigns_positionally() {
        let post = TextBlockParser::LineSplit.refine(raw("T\n\nU\n\nS"));
        assert_eq!(post.title(), "T");
        assert_eq!(post.url(), Some("U"));
        assert_eq!(post.summary(), Some("S"));
    }

    #[test]
    fn line_split_two_lines_has_no_summary() {
        let post = TextBlockParser::LineSplit.refine(raw("Headline\nhttps://e.com/x"));
        assert_eq!(post.title(), "Headline");
        assert_eq!(post.url(), Some("https://e.com/x"));
        assert!(post.summary().is_none());
    }

    #[test]
    fn line_split_single_line_keeps_title_only() {
        let post = TextBlockParser::LineSplit.refine(raw("\n  Lonely headline  \n\n"));
        assert_eq!(post.title(), "Lonely headline");
        assert!(post.summary().is_none());
        // The permalink assigned by the wall source survives.
        assert_eq!(post.url(), Some("https://vk.com/acct?w=wall-1_1"));
    }

    #[test]
    fn parser_kind_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            parser: TextBlockParser,
        }
        let h: Holder = toml::from_str(r#"parser = "line_split""#).unwrap();
        assert_eq!(h.parser, TextBlockParser::LineSplit);
    }
}
