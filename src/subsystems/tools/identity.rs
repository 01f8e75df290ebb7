//! Bearer credentials for calls to sibling services.
//!
//! Either the caller's own `Authorization` header is forwarded verbatim, or
//! an identity token for the target URL is minted from the platform metadata
//! server.

use reqwest::Client;
use tracing::debug;

use super::ProxyError;

#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Forward the incoming request's `Authorization` value.
    PassThrough,
    /// Mint `Bearer <id-token>` with the target URL as audience.
    Metadata { client: Client, endpoint: String },
}

impl TokenSource {
    /// Minting applies only to explicitly configured targets outside local mode.
    pub fn select(explicit_target: bool, local: bool, client: Client, endpoint: &str) -> Self {
        if explicit_target && !local {
            TokenSource::Metadata { client, endpoint: endpoint.to_string() }
        } else {
            TokenSource::PassThrough
        }
    }

    /// Value for the outgoing `Authorization` header, if any.
    pub async fn authorization(
        &self,
        audience: &str,
        caller: Option<&str>,
    ) -> Result<Option<String>, ProxyError> {
        match self {
            TokenSource::PassThrough => Ok(caller.map(str::to_string)),
            TokenSource::Metadata { client, endpoint } => {
                debug!(%audience, "minting identity token");
                let response = client
                    .get(endpoint)
                    .header("Metadata-Flavor", "Google")
                    .query(&[("audience", audience)])
                    .send()
                    .await
                    .map_err(|e| ProxyError::Identity(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ProxyError::Identity(format!("metadata server returned {status}")));
                }
                let token = response
                    .text()
                    .await
                    .map_err(|e| ProxyError::Identity(e.to_string()))?;
                let token = token.trim();
                if token.is_empty() {
                    return Err(ProxyError::Identity("metadata server returned an empty token".into()));
                }
                Ok(Some(format!("Bearer {token}")))
            }
        }
    }
}
