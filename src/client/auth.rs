//! Client-credentials token exchange.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AuthError;

/// Default IMS token endpoint.
pub const IMS_TOKEN_URL: &str = "https://ims-na1.adobelogin.com/ims/token/v3";

/// Scopes requested for the Firefly services.
pub const FIREFLY_SCOPE: &str =
    "openid,AdobeID,session,additional_info,read_organizations,firefly_api,ff_apis";

pub const CLIENT_ID_VAR: &str = "FIREFLY_SERVICES_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "FIREFLY_SERVICES_CLIENT_SECRET";
pub const ACCESS_TOKEN_VAR: &str = "FIREFLY_ACCESS_TOKEN";

/// Service credentials, plus a pre-issued token when one is supplied.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    client_secret: Option<String>,
    access_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

impl Credentials {
    /// Reads credentials from the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads credentials through `lookup`.
    ///
    /// The client id is always required. The secret is only required when no
    /// access token is supplied.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = non_empty(CLIENT_ID_VAR).ok_or(AuthError::MissingCredential(CLIENT_ID_VAR))?;
        let client_secret = non_empty(CLIENT_SECRET_VAR);
        let access_token = non_empty(ACCESS_TOKEN_VAR);

        if client_secret.is_none() && access_token.is_none() {
            return Err(AuthError::MissingCredential(CLIENT_SECRET_VAR));
        }

        Ok(Self {
            client_id,
            client_secret,
            access_token,
        })
    }

    /// Credentials carrying an already issued token.
    pub fn with_token(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            access_token: Some(access_token.into()),
        }
    }

    /// Returns the supplied token, or exchanges the client secret for one.
    pub async fn access_token(&self, http: &Client, token_url: &str) -> Result<String, AuthError> {
        if let Some(token) = &self.access_token {
            debug!("Using access token from environment");
            return Ok(token.clone());
        }
        let secret = self
            .client_secret
            .as_deref()
            .ok_or(AuthError::MissingCredential(CLIENT_SECRET_VAR))?;
        exchange_client_credentials(http, token_url, &self.client_id, secret).await
    }
}

/// Exchanges a client id and secret for a bearer token.
pub async fn exchange_client_credentials(
    http: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, AuthError> {
    let body = form_body(&[
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("scope", FIREFLY_SCOPE),
    ]);

    let response = http
        .post(token_url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .map_err(|e| AuthError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::RequestFailed(e.to_string()))?;

    let access_token = token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    info!(expires_in = ?token.expires_in, "Obtained access token");
    Ok(access_token)
}

fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_client_id() {
        let err = Credentials::from_lookup(lookup(&[(CLIENT_SECRET_VAR, "s")])).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential(CLIENT_ID_VAR)));
    }

    #[test]
    fn test_secret_optional_with_token() {
        let creds =
            Credentials::from_lookup(lookup(&[(CLIENT_ID_VAR, "id"), (ACCESS_TOKEN_VAR, "tok")]))
                .expect("token is enough");
        assert_eq!(creds.client_id, "id");

        let err = Credentials::from_lookup(lookup(&[(CLIENT_ID_VAR, "id")])).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential(CLIENT_SECRET_VAR)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::with_token("id", "very-secret");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_form_body_encoding() {
        assert_eq!(
            form_body(&[("scope", "a,b c"), ("x", "1")]),
            "scope=a%2Cb%20c&x=1"
        );
    }

    #[tokio::test]
    async fn test_token_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ims/token/v3"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "abc", "expires_in": 86399})),
            )
            .mount(&server)
            .await;

        let creds = Credentials::from_lookup(lookup(&[
            (CLIENT_ID_VAR, "id"),
            (CLIENT_SECRET_VAR, "secret"),
        ]))
        .expect("creds");
        let url = format!("{}/ims/token/v3", server.uri());
        let token = creds.access_token(&Client::new(), &url).await.expect("token");
        assert_eq!(token, "abc");
    }

    #[tokio::test]
    async fn test_token_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = exchange_client_credentials(&Client::new(), &server.uri(), "id", "bad")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
    }
}
