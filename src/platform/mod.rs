//! Remote platform integration.
//!
//! The job manager only talks to the platform through [`RemotePlatform`].
//! `twitter` is the reqwest-backed implementation for the X/Twitter v2 API,
//! `oauth` performs the login handshake that populates its credentials.

pub mod oauth;
pub mod twitter;

pub use oauth::{LoginGrant, OAuthFlow};
pub use twitter::{CredentialStore, Credentials, TwitterClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Maximum number of items requested per page.
pub const PAGE_SIZE: u32 = 100;

/// A post on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub is_repost: bool,
}

impl Item {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at: String::new(),
            is_repost: false,
        }
    }
}

/// The authenticated account as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// Read/delete operations on an owner's posts.
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// Items still present for `owner`, most recent first, at most
    /// [`PAGE_SIZE`]. An empty vector means nothing is left.
    async fn fetch_remaining(
        &self,
        owner: &str,
        include_reposts: bool,
    ) -> Result<Vec<Item>, PlatformError>;

    /// Delete a single item.
    async fn delete_item(&self, owner: &str, item_id: &str) -> Result<(), PlatformError>;

    /// Profile of the account behind `owner`.
    async fn profile(&self, owner: &str) -> Result<Profile, PlatformError>;
}
