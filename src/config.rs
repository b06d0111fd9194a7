//! Static configuration, loaded once at startup.
//!
//! ```toml
//! interval_secs = 300
//! watermark_path = "last_updated"
//!
//! [wall]
//! access_token = "..."
//!
//! [[sources]]
//! kind = "syndication"
//! name = "City News"
//! address = "https://example.com/rss"
//! full_text = true
//!
//! [[sources]]
//! kind = "wall_text"
//! name = "Portal"
//! address = "portal_news"
//! text_parser = "pattern"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::source::vk::DEFAULT_API_VERSION;
use crate::source::TextBlockParser;

/// Overrides `[wall].access_token` so the token can stay out of the file.
pub const ENV_WALL_TOKEN: &str = "FEEDRELAY_WALL_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds to sleep between cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// File holding the watermark between runs.
    #[serde(default = "default_watermark_path")]
    pub watermark_path: PathBuf,

    /// HTTP timeout applied to every transport call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub wall: Option<WallConfig>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WallConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// One configured source.  The set of kinds is closed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    #[serde(alias = "rss")]
    Syndication {
        name: String,
        address: String,
        #[serde(default)]
        full_text: bool,
    },
    WallText {
        name: String,
        address: String,
        #[serde(default)]
        text_parser: Option<TextBlockParser>,
    },
    WallLink {
        name: String,
        address: String,
    },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Syndication { name, .. }
            | Self::WallText { name, .. }
            | Self::WallLink { name, .. } => name,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Syndication { address, .. }
            | Self::WallText { address, .. }
            | Self::WallLink { address, .. } => address,
        }
    }

    pub fn needs_wall(&self) -> bool {
        !matches!(self, Self::Syndication { .. })
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_watermark_path() -> PathBuf {
    PathBuf::from("last_updated")
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        if let Ok(token) = std::env::var(ENV_WALL_TOKEN) {
            config.set_wall_token(token);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Access token, if one is configured and non-empty.
    pub fn wall_token(&self) -> Option<&str> {
        self.wall
            .as_ref()
            .map(|w| w.access_token.trim())
            .filter(|t| !t.is_empty())
    }

    fn set_wall_token(&mut self, token: String) {
        match self.wall.as_mut() {
            Some(wall) => wall.access_token = token,
            None => {
                self.wall = Some(WallConfig {
                    access_token: token,
                    api_version: default_api_version(),
                })
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".into()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be positive".into()));
        }
        for source in &self.sources {
            if source.name().trim().is_empty() || source.address().trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {:?} needs both a name and an address",
                    source.name()
                )));
            }
        }
        if self.wall_token().is_none() {
            if let Some(source) = self.sources.iter().find(|s| s.needs_wall()) {
                return Err(ConfigError::Invalid(format!(
                    "wall source {:?} configured without a wall access token (set [wall].access_token or {ENV_WALL_TOKEN})",
                    source.name()
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
interval_secs = 120
watermark_path = "/var/lib/feedrelay/last_updated"

[wall]
access_token = "service-token"

[[sources]]
kind = "syndication"
name = "City News"
address = "https://example.com/rss"
full_text = true

[[sources]]
kind = "rss"
name = "Plain"
address = "https://example.com/plain.xml"

[[sources]]
kind = "wall_text"
name = "Portal"
address = "portal_news"
text_parser = "pattern"

[[sources]]
kind = "wall_link"
name = "Evening"
address = "club21276594"
"#;

    #[test]
    fn parses_full_config_in_order() {
        let config = Config::parse(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval(), Duration::from_secs(120));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.wall_token(), Some("service-token"));
        assert_eq!(config.wall.as_ref().unwrap().api_version, DEFAULT_API_VERSION);

        assert_eq!(
            config.sources,
            vec![
                SourceConfig::Syndication {
                    name: "City News".into(),
                    address: "https://example.com/rss".into(),
                    full_text: true,
                },
                SourceConfig::Syndication {
                    name: "Plain".into(),
                    address: "https://example.com/plain.xml".into(),
                    full_text: false,
                },
                SourceConfig::WallText {
                    name: "Portal".into(),
                    address: "portal_news".into(),
                    text_parser: Some(TextBlockParser::Pattern),
                },
                SourceConfig::WallLink {
                    name: "Evening".into(),
                    address: "club21276594".into(),
                },
            ]
        );
    }

    #[test]
    fn defaults_apply() {
        let config = Config::parse(
            r#"
[[sources]]
kind = "syndication"
name = "A"
address = "http://a"
"#,
        )
        .unwrap();
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.watermark_path, PathBuf::from("last_updated"));
        assert!(config.wall.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Config::parse(
            r#"
[[sources]]
kind = "newsletter"
name = "A"
address = "x"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn wall_source_requires_token() {
        let config = Config::parse(
            r#"
[wall]
access_token = "  "

[[sources]]
kind = "wall_text"
name = "W"
address = "w"
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_source_list_is_invalid() {
        let config = Config::parse("interval_secs = 10").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn token_override_creates_wall_section() {
        let mut config = Config::parse(
            r#"
[[sources]]
kind = "wall_link"
name = "L"
address = "club1"
"#,
        )
        .unwrap();
        config.set_wall_token("from-env".into());
        assert_eq!(config.wall_token(), Some("from-env"));
        config.validate().unwrap();
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedrelay.toml");
        fs::write(&path, FULL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources.len(), 4);

        let missing = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
