//! Initial snapshot retrieval.
//!
//! The session is seeded once from a [`SnapshotSource`] before any change
//! event is applied.

use async_trait::async_trait;
use livetable_shared::Item;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::error::ClientError;

/// Returns the baseline items for an identity.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, identity: &str) -> Result<Vec<Item>, ClientError>;
}

/// A fixed snapshot, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot(pub Vec<Item>);

#[async_trait]
impl SnapshotSource for StaticSnapshot {
    async fn fetch(&self, _identity: &str) -> Result<Vec<Item>, ClientError> {
        Ok(self.0.clone())
    }
}

/// Accepted response bodies: a bare array, `{"data": [...]}`, or `null`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotBody {
    Items(Vec<Item>),
    Wrapped {
        /// Must be present; `null` means empty.
        #[serde(deserialize_with = "nullable_items")]
        data: Option<Vec<Item>>,
    },
}

fn nullable_items<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Item>>, D::Error> {
    Option::deserialize(d)
}

/// Fetches the snapshot from `GET {base}/api/items?userId={identity}`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with the request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, identity: &str) -> Result<Vec<Item>, ClientError> {
        let mut rb = self.client.get(self.url("/api/items"));
        if !identity.is_empty() {
            rb = rb.query(&[("userId", identity)]);
        }
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let items = parse_snapshot(&text)?;
        tracing::debug!("fetched snapshot of {} items for {:?}", items.len(), identity);
        Ok(items)
    }
}

fn parse_snapshot(body: &str) -> Result<Vec<Item>, ClientError> {
    let parsed: Option<SnapshotBody> = serde_json::from_str(body)?;
    Ok(match parsed {
        None => Vec::new(),
        Some(SnapshotBody::Items(items)) => items,
        Some(SnapshotBody::Wrapped { data }) => data.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_body_shapes() {
        let item = r#"{"projectId":"p1","userId":"u1","createdAt":"t1","name":"A"}"#;

        assert_eq!(parse_snapshot(&format!("[{item}]")).unwrap().len(), 1);
        assert_eq!(parse_snapshot(&format!(r#"{{"data":[{item}]}}"#)).unwrap().len(), 1);
        assert!(parse_snapshot(r#"{"data":null}"#).unwrap().is_empty());
        assert!(parse_snapshot("null").unwrap().is_empty());
        assert!(parse_snapshot("42").is_err());
        assert!(parse_snapshot("not json").is_err());
    }

    #[test]
    fn objects_without_data_are_rejected() {
        for body in [r#"{"error":"forbidden"}"#, "{}"] {
            assert!(matches!(parse_snapshot(body), Err(ClientError::Decode(_))), "{body}");
        }
    }

    #[test]
    fn url_joins_cleanly() {
        let source = HttpSnapshotSource::new("http://localhost:8080/");
        assert_eq!(source.url("/api/items"), "http://localhost:8080/api/items");
    }
}
