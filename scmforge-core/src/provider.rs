//! OAuth client-credentials token provider.
//!
//! This module provides:
//! - [`ClientCredentials`] - Service-account identity for a tenant service group
//! - [`ClientCredentialsProvider`] - [`TokenProvider`] backed by the client-credentials grant
//!
//! Tokens are requested with HTTP basic client authentication and the scope
//! `tsg_id:{tsg_id}`.

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl,
    basic::BasicClient, reqwest::async_http_client,
};

use crate::store::Secret;
use crate::token::{AuthError, Credential, TokenProvider};

/// Default identity service token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.apps.paloaltonetworks.com/am/oauth2/access_token";

/// Lifetime assumed when the identity service omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 900;

/// Service-account identity used for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// OAuth client ID of the service account.
    pub client_id: String,

    /// OAuth client secret of the service account.
    pub client_secret: Secret,

    /// Tenant service group the token is scoped to.
    pub tsg_id: String,
}

impl ClientCredentials {
    /// Create a new set of client credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tsg_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            tsg_id: tsg_id.into(),
        }
    }

    /// OAuth scope requested for this tenant.
    pub fn scope(&self) -> String {
        format!("tsg_id:{}", self.tsg_id)
    }
}

/// Fetches credentials with the OAuth client-credentials grant.
#[derive(Debug)]
pub struct ClientCredentialsProvider {
    client: BasicClient,
    scope: String,
}

impl ClientCredentialsProvider {
    /// Create a provider for the given token endpoint.
    pub fn new(token_url: impl Into<String>, credentials: &ClientCredentials) -> Result<Self, AuthError> {
        let token_url = token_url.into();

        // The client-credentials grant never visits the authorization endpoint,
        // but the client type requires one.
        let auth_url = AuthUrl::new(token_url.clone()).map_err(|e| AuthError::InvalidConfig {
            message: format!("invalid token URL: {}", e),
        })?;
        let token_url = TokenUrl::new(token_url).map_err(|e| AuthError::InvalidConfig {
            message: format!("invalid token URL: {}", e),
        })?;

        let client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.expose().to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            client,
            scope: credentials.scope(),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn fetch_token(&self) -> Result<Credential, AuthError> {
        let response = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::RefreshFailed {
                message: e.to_string(),
            })?;

        let lifetime = response
            .expires_in()
            .unwrap_or(std::time::Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS));
        let lifetime = chrono::Duration::from_std(lifetime).map_err(|e| {
            AuthError::MalformedResponse {
                message: format!("invalid expiration duration: {}", e),
            }
        })?;

        tracing::debug!("Obtained access token valid for {}s", lifetime.num_seconds());

        Ok(Credential::new(
            response.access_token().secret().clone(),
            Utc::now() + lifetime,
        ))
    }
}
