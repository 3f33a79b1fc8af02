//! External identity providers.
//!
//! A provider turns an authorization code from the redirect flow into an
//! [`ExternalIdentity`]. Only the provider's subject id and email matter to
//! the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::OAuthConfig;

/// The identity asserted by an external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub email: String,
}

/// Errors raised by identity providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token exchange failed with status {status}")]
    TokenExchangeFailed { status: u16 },

    #[error("userinfo request failed with status {status}")]
    UserInfoFailed { status: u16 },

    #[error("provider profile has no email")]
    MissingEmail,
}

/// Capability set every identity provider offers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in routes and logs.
    fn name(&self) -> &'static str;

    /// Where to send the browser to start the flow.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the caller's identity.
    async fn authenticate(&self, code: &str) -> Result<ExternalIdentity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
}

/// Google OAuth2 provider.
#[derive(Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_url: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    http_client: Client,
}

impl GoogleProvider {
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            authorization_endpoint: config.authorization_endpoint.clone(),
            token_endpoint: config.token_endpoint.clone(),
            userinfo_endpoint: config.userinfo_endpoint.clone(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.authorization_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        )
    }

    async fn authenticate(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::TokenExchangeFailed {
                status: status.as_u16(),
            });
        }
        let token: GoogleTokenResponse = response.json().await?;

        let response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UserInfoFailed {
                status: status.as_u16(),
            });
        }
        let info: GoogleUserInfo = response.json().await?;

        let email = info
            .email
            .filter(|e| !e.is_empty())
            .ok_or(ProviderError::MissingEmail)?;

        Ok(ExternalIdentity {
            external_id: info.sub,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GoogleProvider {
        let config = OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            token_endpoint: format!("{}/token", server.uri()),
            userinfo_endpoint: format!("{}/userinfo", server.uri()),
            ..OAuthConfig::default()
        };
        GoogleProvider::from_config(&config)
    }

    #[test]
    fn test_authorization_url() {
        let provider = GoogleProvider::from_config(&OAuthConfig {
            client_id: "client-id".to_string(),
            ..OAuthConfig::default()
        });

        let url = provider.authorization_url("state-token");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=state-token"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }

    #[tokio::test]
    async fn test_code_exchange_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1093",
                "email": "alice@example.com",
                "email_verified": true
            })))
            .mount(&server)
            .await;

        let identity = provider_for(&server).authenticate("auth-code").await.unwrap();
        assert_eq!(
            identity,
            ExternalIdentity {
                external_id: "1093".to_string(),
                email: "alice@example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).authenticate("stale").await.unwrap_err();
        assert!(matches!(err, ProviderError::TokenExchangeFailed { status: 400 }));
    }

    #[tokio::test]
    async fn test_profile_without_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "t" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sub": "1" })))
            .mount(&server)
            .await;

        let err = provider_for(&server).authenticate("code").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingEmail));
    }
}
