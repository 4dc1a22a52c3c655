use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use domain::{
    repositories::identity::{IdentityProvider, UserProfile},
    value_objects::enums::user_roles::UserRole,
};

/// Identity-provider client over HTTP. Lookups carry a request timeout so
/// a slow provider degrades a caller instead of hanging it.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UserResp {
    id: Uuid,
    role: Option<String>,
    email: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve_user(&self, user_id: Uuid) -> Result<UserProfile> {
        let url = self
            .base_url
            .join(&format!("v1/users/{}", user_id))
            .context("invalid identity provider url")?;

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await
            .context("identity provider request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("identity provider returned status {}", resp.status());
        }

        let parsed: UserResp = resp
            .json()
            .await
            .context("identity provider response was not valid json")?;

        Ok(UserProfile {
            id: parsed.id,
            role: parsed
                .role
                .as_deref()
                .map(UserRole::from_str)
                .unwrap_or_default(),
            email: parsed.email,
        })
    }
}
