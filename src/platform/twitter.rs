//! X/Twitter API v2 client.
//!
//! Every call is made on behalf of an owner whose access token was stored in
//! the [`CredentialStore`] at login.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use super::{Item, PAGE_SIZE, Profile, RemotePlatform};
use crate::error::PlatformError;

/// Platform identity and token for one owner.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Numeric platform user id (the owner key is the username).
    pub user_id: String,
    pub access_token: SecretString,
}

/// Owner → credentials, filled by the login handshake.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<HashMap<String, Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, owner: &str, credentials: Credentials) {
        self.inner
            .write()
            .await
            .insert(owner.to_string(), credentials);
    }

    pub async fn get(&self, owner: &str) -> Option<Credentials> {
        self.inner.read().await.get(owner).cloned()
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WireTweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    referenced_tweets: Vec<WireReference>,
}

#[derive(Debug, Deserialize)]
struct WireReference {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct WireDeleted {
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct WireProblem {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl From<WireTweet> for Item {
    fn from(tweet: WireTweet) -> Self {
        let is_repost = tweet.referenced_tweets.iter().any(|r| r.kind == "retweeted");
        Item {
            id: tweet.id,
            text: tweet.text,
            created_at: tweet.created_at.unwrap_or_default(),
            is_repost,
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────────

/// reqwest-backed [`RemotePlatform`].
pub struct TwitterClient {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<CredentialStore>,
}

impl TwitterClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/2/{path}", self.base_url)
    }

    async fn credentials_for(&self, owner: &str) -> Result<Credentials, PlatformError> {
        self.credentials
            .get(owner)
            .await
            .ok_or_else(|| PlatformError::NotAuthenticated {
                owner: owner.to_string(),
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &SecretString,
    ) -> Result<T, PlatformError> {
        let response = request.bearer_auth(token.expose_secret()).send().await?;
        decode_response(response).await
    }
}

/// Map status codes to [`PlatformError`] and parse a successful body.
async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PlatformError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PlatformError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Api {
            status: status.as_u16(),
            message: problem_message(&body),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
}

/// Best human-readable message from an error body.
fn problem_message(body: &str) -> String {
    match serde_json::from_str::<WireProblem>(body) {
        Ok(WireProblem {
            detail: Some(detail),
            ..
        }) => detail,
        Ok(WireProblem {
            title: Some(title), ..
        }) => title,
        _ => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl RemotePlatform for TwitterClient {
    async fn fetch_remaining(
        &self,
        owner: &str,
        include_reposts: bool,
    ) -> Result<Vec<Item>, PlatformError> {
        let creds = self.credentials_for(owner).await?;

        let mut query = vec![
            ("max_results", PAGE_SIZE.to_string()),
            ("tweet.fields", "created_at,referenced_tweets".to_string()),
        ];
        if !include_reposts {
            query.push(("exclude", "retweets".to_string()));
        }

        let request = self
            .client
            .get(self.api_url(&format!("users/{}/tweets", creds.user_id)))
            .query(&query);
        let envelope: Envelope<Vec<WireTweet>> = self.send(request, &creds.access_token).await?;

        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Item::from)
            .collect())
    }

    async fn delete_item(&self, owner: &str, item_id: &str) -> Result<(), PlatformError> {
        let creds = self.credentials_for(owner).await?;

        let request = self.client.delete(self.api_url(&format!("tweets/{item_id}")));
        let envelope: Envelope<WireDeleted> = self.send(request, &creds.access_token).await?;

        match envelope.data {
            Some(WireDeleted { deleted: true }) => Ok(()),
            _ => Err(PlatformError::InvalidResponse(format!(
                "item {item_id} was not deleted"
            ))),
        }
    }

    async fn profile(&self, owner: &str) -> Result<Profile, PlatformError> {
        let creds = self.credentials_for(owner).await?;
        fetch_profile(&self.client, &self.base_url, &creds.access_token).await
    }
}

/// `GET /2/users/me` with an arbitrary token. Shared with the login flow,
/// which needs the profile before any credentials are stored.
pub(crate) async fn fetch_profile(
    client: &reqwest::Client,
    base_url: &str,
    token: &SecretString,
) -> Result<Profile, PlatformError> {
    let response = client
        .get(format!("{base_url}/2/users/me"))
        .query(&[("user.fields", "created_at,profile_image_url")])
        .bearer_auth(token.expose_secret())
        .send()
        .await?;

    let envelope: Envelope<Profile> = decode_response(response).await?;
    envelope
        .data
        .ok_or_else(|| PlatformError::InvalidResponse("missing user data".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retweets_are_flagged() {
        let json = r#"{"data":[
            {"id":"1","text":"hello","created_at":"2024-01-01T00:00:00.000Z"},
            {"id":"2","text":"RT @x: hi","referenced_tweets":[{"type":"retweeted","id":"9"}]},
            {"id":"3","text":"@x yes","referenced_tweets":[{"type":"replied_to","id":"8"}]}
        ]}"#;
        let envelope: Envelope<Vec<WireTweet>> = serde_json::from_str(json).unwrap();
        let items: Vec<Item> = envelope.data.unwrap().into_iter().map(Item::from).collect();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].created_at, "2024-01-01T00:00:00.000Z");
        assert!(!items[0].is_repost);
        assert!(items[1].is_repost);
        assert!(!items[2].is_repost);
    }

    #[test]
    fn missing_data_means_empty_timeline() {
        let envelope: Envelope<Vec<WireTweet>> =
            serde_json::from_str(r#"{"meta":{"result_count":0}}"#).unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn problem_message_prefers_detail() {
        assert_eq!(
            problem_message(r#"{"title":"Forbidden","detail":"not yours"}"#),
            "not yours"
        );
        assert_eq!(problem_message(r#"{"title":"Forbidden"}"#), "Forbidden");
        assert_eq!(problem_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn unknown_owner_is_not_authenticated() {
        let client = TwitterClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(1),
            CredentialStore::new(),
        )
        .unwrap();

        let err = client.fetch_remaining("ghost", true).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotAuthenticated { ref owner } if owner == "ghost"));
    }
}
