//! OAuth2 authorization-code login against the platform.
//!
//! `GET /login` redirects to [`OAuthFlow::authorize_url`]; the front-end
//! posts the returned `code` and `state` back, and [`OAuthFlow::complete`]
//! trades them for an access token and registers the owner's credentials.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::Profile;
use super::twitter::{CredentialStore, Credentials, fetch_profile};
use crate::config::AppConfig;
use crate::error::AuthError;

/// Scopes needed to read the timeline and delete posts.
const SCOPES: &str = "tweet.read tweet.write users.read offline.access";

/// How long an issued `state` stays redeemable.
const PENDING_LOGIN_TTL: Duration = Duration::from_secs(600);

struct PendingLogin {
    verifier: String,
    issued_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Owner id used for sessions and jobs (the platform username).
    pub owner: String,
    pub profile: Profile,
}

/// Drives the login handshake and stores the resulting credentials.
pub struct OAuthFlow {
    client_id: String,
    client_secret: Option<SecretString>,
    callback_url: String,
    authorize_url: String,
    api_base_url: String,
    client: reqwest::Client,
    pending: Mutex<HashMap<String, PendingLogin>>,
    credentials: Arc<CredentialStore>,
}

impl OAuthFlow {
    pub fn new(config: &AppConfig, credentials: Arc<CredentialStore>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            authorize_url: config.authorize_url.clone(),
            api_base_url: config.api_base_url.clone(),
            client,
            pending: Mutex::new(HashMap::new()),
            credentials,
        })
    }

    /// Start a login: remember a fresh `state`/verifier pair and return the
    /// URL the user should be redirected to.
    pub async fn authorize_url(&self) -> Result<Url, AuthError> {
        let state = Uuid::new_v4().simple().to_string();
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("scope", SCOPES),
                ("state", state.as_str()),
                ("code_challenge", verifier.as_str()),
                ("code_challenge_method", "plain"),
            ],
        )
        .map_err(|e| AuthError::ExchangeFailed(format!("bad authorize url: {e}")))?;

        let mut pending = self.pending.lock().await;
        pending.retain(|_, login| login.issued_at.elapsed() < PENDING_LOGIN_TTL);
        pending.insert(
            state,
            PendingLogin {
                verifier,
                issued_at: Instant::now(),
            },
        );

        Ok(url)
    }

    /// Redeem `code` for the login identified by `state`.
    pub async fn complete(&self, code: &str, state: &str) -> Result<LoginGrant, AuthError> {
        let login = self
            .pending
            .lock()
            .await
            .remove(state)
            .filter(|login| login.issued_at.elapsed() < PENDING_LOGIN_TTL)
            .ok_or(AuthError::UnknownState)?;

        let access_token = self.exchange_code(code, &login.verifier).await?;

        let profile = fetch_profile(&self.client, &self.api_base_url, &access_token)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        self.credentials
            .insert(
                &profile.username,
                Credentials {
                    user_id: profile.id.clone(),
                    access_token,
                },
            )
            .await;

        info!(owner = %profile.username, "User logged in");
        Ok(LoginGrant {
            owner: profile.username.clone(),
            profile,
        })
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<SecretString, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.callback_url.as_str()),
            ("code_verifier", verifier),
            ("client_id", self.client_id.as_str()),
        ];

        let mut request = self
            .client
            .post(format!("{}/2/oauth2/token", self.api_base_url))
            .form(&form);
        if let Some(secret) = &self.client_secret {
            request = request.basic_auth(&self.client_id, Some(secret.expose_secret()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token exchange rejected");
            return Err(AuthError::ExchangeFailed(format!(
                "token endpoint returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
        Ok(SecretString::from(token.access_token))
    }
}
