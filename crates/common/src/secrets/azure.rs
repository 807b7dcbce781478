//! Azure Key Vault secret store
//!
//! Talks to the Key Vault REST API directly. Credentials are taken from the
//! environment the process runs in, first match wins:
//!
//! 1. Service principal: `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`
//!    (authority overridable with `AZURE_AUTHORITY_HOST`)
//! 2. App Service managed identity: `IDENTITY_ENDPOINT`, `IDENTITY_HEADER`
//! 3. Instance metadata service managed identity (optionally user-assigned via
//!    `AZURE_CLIENT_ID`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};

use super::{strip_trailing_newline, SecretError, SecretResult, VaultSecretSource};

/// Key Vault data-plane API version
pub const KEY_VAULT_API_VERSION: &str = "7.4";

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const VAULT_RESOURCE: &str = "https://vault.azure.net";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential used to obtain a Key Vault access token
#[derive(Clone)]
pub enum AmbientCredential {
    /// OAuth2 client credentials grant for a service principal
    ClientSecret {
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// App Service / Functions managed identity endpoint
    AppServiceIdentity { endpoint: String, header: String },
    /// VM / AKS instance metadata service
    InstanceMetadata {
        endpoint: String,
        client_id: Option<String>,
    },
}

impl AmbientCredential {
    /// Pick a credential from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Pick a credential using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            get("AZURE_TENANT_ID"),
            get("AZURE_CLIENT_ID"),
            get("AZURE_CLIENT_SECRET"),
        ) {
            return AmbientCredential::ClientSecret {
                authority_host: get("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
                tenant_id,
                client_id,
                client_secret,
            };
        }

        if let (Some(endpoint), Some(header)) = (get("IDENTITY_ENDPOINT"), get("IDENTITY_HEADER")) {
            return AmbientCredential::AppServiceIdentity { endpoint, header };
        }

        AmbientCredential::InstanceMetadata {
            endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            client_id: get("AZURE_CLIENT_ID"),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AmbientCredential::ClientSecret { .. } => "client-secret",
            AmbientCredential::AppServiceIdentity { .. } => "app-service-identity",
            AmbientCredential::InstanceMetadata { .. } => "instance-metadata",
        }
    }

    /// Obtain a bearer token for the Key Vault resource
    async fn access_token(&self, client: &Client) -> SecretResult<String> {
        let request = match self {
            AmbientCredential::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                client_secret,
            } => client
                .post(format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority_host.trim_end_matches('/'),
                    tenant_id
                ))
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", VAULT_SCOPE),
                ]),
            AmbientCredential::AppServiceIdentity { endpoint, header } => client
                .get(endpoint)
                .header("X-IDENTITY-HEADER", header)
                .query(&[("api-version", "2019-08-01"), ("resource", VAULT_RESOURCE)]),
            AmbientCredential::InstanceMetadata {
                endpoint,
                client_id,
            } => {
                let mut request = client
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&[("api-version", "2018-02-01"), ("resource", VAULT_RESOURCE)]);
                if let Some(id) = client_id {
                    request = request.query(&[("client_id", id.as_str())]);
                }
                request
            }
        };

        let response = request.send().await.map_err(|e| {
            SecretError::Auth(format!("{} token request failed: {}", self.kind(), e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Auth(format!(
                "{} token request rejected: HTTP {} - {}",
                self.kind(),
                status,
                body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SecretError::Auth(format!("Failed to parse {} token response: {}", self.kind(), e))
        })?;

        trace!(credential = self.kind(), "Obtained Key Vault access token");
        Ok(token.access_token)
    }
}

impl std::fmt::Debug for AmbientCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmbientCredential::ClientSecret {
                authority_host,
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("authority_host", authority_host)
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            AmbientCredential::AppServiceIdentity { endpoint, .. } => f
                .debug_struct("AppServiceIdentity")
                .field("endpoint", endpoint)
                .finish_non_exhaustive(),
            AmbientCredential::InstanceMetadata {
                endpoint,
                client_id,
            } => f
                .debug_struct("InstanceMetadata")
                .field("endpoint", endpoint)
                .field("client_id", client_id)
                .finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// Azure Key Vault secret store
///
/// The credential is read from the environment on each lookup unless one was
/// supplied with [`AzureKeyVault::with_credential`].
#[derive(Debug, Clone)]
pub struct AzureKeyVault {
    client: Client,
    credential: Option<AmbientCredential>,
}

impl AzureKeyVault {
    /// Create a store using ambient credentials
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            credential: None,
        }
    }

    /// Use a fixed credential instead of the environment
    pub fn with_credential(mut self, credential: AmbientCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    fn secret_url(vault_uri: &str, secret_name: &str) -> String {
        format!(
            "{}/secrets/{}",
            vault_uri.trim_end_matches('/'),
            secret_name
        )
    }
}

impl Default for AzureKeyVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultSecretSource for AzureKeyVault {
    async fn get_token(&self, vault_uri: &str, secret_name: &str) -> SecretResult<String> {
        let credential = self
            .credential
            .clone()
            .unwrap_or_else(AmbientCredential::from_env);

        debug!(
            vault = %vault_uri,
            secret = %secret_name,
            credential = credential.kind(),
            "Fetching secret from Azure Key Vault"
        );

        let access_token = credential.access_token(&self.client).await?;

        let response = self
            .client
            .get(Self::secret_url(vault_uri, secret_name))
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SecretError::Request(format!("Failed to reach {}: {}", vault_uri, e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let status = response.status();
                return Err(SecretError::Auth(format!(
                    "Access to secret '{}' in {} denied: HTTP {}",
                    secret_name, vault_uri, status
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(SecretError::NotFound {
                    store: vault_uri.to_string(),
                    name: secret_name.to_string(),
                });
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(SecretError::Request(format!(
                    "Failed to fetch secret '{}': HTTP {} - {}",
                    secret_name, status, body
                )));
            }
            _ => {}
        }

        let bundle: SecretBundle = response.json().await.map_err(|e| {
            SecretError::Request(format!("Failed to parse secret response: {}", e))
        })?;

        let value = bundle.value.unwrap_or_default();
        let token = strip_trailing_newline(&value);
        if token.is_empty() {
            return Err(SecretError::EmptySecret {
                location: Self::secret_url(vault_uri, secret_name),
            });
        }

        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential_for(server: &MockServer) -> AmbientCredential {
        AmbientCredential::ClientSecret {
            authority_host: server.uri(),
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "vault-access-token"
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_credential_selection_order() {
        let vars: HashMap<&str, &str> = [
            ("AZURE_TENANT_ID", "t"),
            ("AZURE_CLIENT_ID", "c"),
            ("AZURE_CLIENT_SECRET", "s"),
            ("IDENTITY_ENDPOINT", "http://localhost:8081/msi/token"),
            ("IDENTITY_HEADER", "h"),
        ]
        .into_iter()
        .collect();
        let credential = AmbientCredential::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(matches!(credential, AmbientCredential::ClientSecret { .. }));

        let vars: HashMap<&str, &str> = [
            ("IDENTITY_ENDPOINT", "http://localhost:8081/msi/token"),
            ("IDENTITY_HEADER", "h"),
        ]
        .into_iter()
        .collect();
        let credential = AmbientCredential::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(matches!(credential, AmbientCredential::AppServiceIdentity { .. }));

        let credential = AmbientCredential::from_lookup(|_| None);
        match credential {
            AmbientCredential::InstanceMetadata { endpoint, client_id } => {
                assert_eq!(endpoint, IMDS_TOKEN_ENDPOINT);
                assert!(client_id.is_none());
            }
            other => panic!("unexpected credential {:?}", other),
        }
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = AmbientCredential::ClientSecret {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", credential).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_fetches_secret_value() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/secrets/do-auth-token"))
            .and(query_param("api-version", KEY_VAULT_API_VERSION))
            .and(header("authorization", "Bearer vault-access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "vault-token\n",
                "id": "https://example.vault.azure.net/secrets/do-auth-token/1"
            })))
            .mount(&server)
            .await;

        let vault = AzureKeyVault::new().with_credential(credential_for(&server));
        let uri = format!("{}/", server.uri());
        let token = vault.get_token(&uri, "do-auth-token").await.unwrap();

        assert_eq!(token, "vault-token");
    }

    #[tokio::test]
    async fn test_missing_secret_is_not_found() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/secrets/absent"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let vault = AzureKeyVault::new().with_credential(credential_for(&server));
        let err = vault.get_token(&server.uri(), "absent").await.unwrap_err();

        assert!(matches!(err, SecretError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_forbidden_secret_is_auth_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path("/secrets/locked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let vault = AzureKeyVault::new().with_credential(credential_for(&server));
        let err = vault.get_token(&server.uri(), "locked").await.unwrap_err();

        assert!(matches!(err, SecretError::Auth(_)));
    }

    #[tokio::test]
    async fn test_rejected_token_request_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let vault = AzureKeyVault::new().with_credential(credential_for(&server));
        let err = vault.get_token(&server.uri(), "anything").await.unwrap_err();

        assert!(matches!(err, SecretError::Auth(_)));
        assert!(err.to_string().contains("invalid_client"));
    }
}
