//! HTTP wall transport for the VK `wall.get` method.

use std::time::Duration;

use serde::Deserialize;

use super::{TransportError, WallItem, WallTarget, WallTransport};

const WALL_GET_URL: &str = "https://api.vk.com/method/wall.get";
pub const DEFAULT_API_VERSION: &str = "5.131";

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<WallPage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct WallPage {
    #[serde(default)]
    items: Vec<WallItem>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Wall transport backed by the VK API, authenticated with a service token.
pub struct VkWallTransport {
    client: reqwest::blocking::Client,
    access_token: String,
    api_version: String,
}

impl VkWallTransport {
    pub fn new(
        access_token: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            api_version: api_version.into(),
        })
    }
}

impl WallTransport for VkWallTransport {
    fn fetch_wall(&self, target: &WallTarget, count: u32) -> Result<Vec<WallItem>, TransportError> {
        let mut query: Vec<(&str, String)> = vec![
            ("count", count.to_string()),
            ("access_token", self.access_token.clone()),
            ("v", self.api_version.clone()),
        ];
        match target {
            WallTarget::Domain(domain) => query.push(("domain", domain.clone())),
            WallTarget::Owner(id) => query.push(("owner_id", id.to_string())),
        }

        let body = self
            .client
            .get(WALL_GET_URL)
            .query(&query)
            .send()?
            .error_for_status()?
            .text()?;
        parse_wall_response(&body)
    }
}

/// Decode a `wall.get` response body.
///
/// The API answers HTTP 200 for its own errors, so the envelope is the only
/// place a failure shows up.
pub fn parse_wall_response(body: &str) -> Result<Vec<WallItem>, TransportError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    match (envelope.response, envelope.error) {
        (_, Some(err)) => Err(TransportError::Api {
            code: err.error_code,
            message: err.error_msg,
        }),
        (Some(page), None) => Ok(page.items),
        (None, None) => Err(TransportError::Api {
            code: 0,
            message: "response without items".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_items() {
        let body = r#"{
          "response": {
            "count": 2,
            "items": [
              {
                "id": 11, "from_id": -95760059, "owner_id": -95760059,
                "date": 1700000100, "marked_as_ads": 0, "post_type": "post",
                "text": "Headline\nhttps://e.com/11\nLead",
                "attachments": [
                  {"type": "link", "link": {"url": "https://e.com/11", "title": "Headline", "caption": "e.com"}}
                ]
              },
              {"id": 10, "from_id": -95760059, "date": 1700000000, "marked_as_ads": 1, "text": "Ad"}
            ]
          }
        }"#;

        let items = parse_wall_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 11);
        assert_eq!(items[0].first_link().unwrap().title, "Headline");
        assert!(!items[0].is_ad());
        assert!(items[1].is_ad());
    }

    #[test]
    fn api_error_envelope() {
        let body = r#"{"error": {"error_code": 15, "error_msg": "Access denied: wall is disabled"}}"#;
        match parse_wall_response(body) {
            Err(TransportError::Api { code, message }) => {
                assert_eq!(code, 15);
                assert!(message.contains("wall is disabled"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_wall_response("<html>"),
            Err(TransportError::Decode(_))
        ));
    }
}
