//! Exchange a long lived refresh token for a short lived access token.

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub async fn refresh_access_token(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<OAuthToken> {
    let client = Client::new();
    let res = client
        .post(token_url)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Token refresh failed: {} ({})", status, text);
    }
    let token: OAuthToken = serde_json::from_str(&text)?;
    Ok(token)
}
