//! Remote chain invocation over HTTP.
//!
//! `POST {base_url}/invoke` with `{message, session_id?}` and read the
//! `output` field of the JSON reply. One attempt, client-default timeouts;
//! every failure is returned to the caller unchanged.

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ProxyError;
use super::identity::TokenSource;

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InvokeReply {
    output: String,
}

/// A sibling service's invoke endpoint plus how to authenticate to it.
#[derive(Debug, Clone)]
pub struct RemoteChain {
    client: Client,
    base_url: String,
    tokens: TokenSource,
}

impl RemoteChain {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: TokenSource) -> Self {
        Self { client, base_url: base_url.into(), tokens }
    }

    fn invoke_url(&self) -> String {
        format!("{}/invoke", self.base_url.trim_end_matches('/'))
    }

    pub async fn invoke(
        &self,
        message: &str,
        session_id: Option<&str>,
        caller_auth: Option<&str>,
    ) -> Result<String, ProxyError> {
        let url = self.invoke_url();
        let auth = self.tokens.authorization(&self.base_url, caller_auth).await?;

        debug!(%url, message_len = message.len(), ?session_id, "invoking remote chain");

        let mut req = self.client.post(&url).json(&InvokeBody { message, session_id });
        if let Some(value) = auth {
            req = req.header(AUTHORIZATION, value);
        }
        let response = req.send().await.map_err(|e| {
            warn!(%url, error = %e, "remote chain unreachable");
            ProxyError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            warn!(%url, %status, "remote chain returned error status");
            return Err(ProxyError::Status { status: status.as_u16(), body });
        }

        let reply = response
            .json::<InvokeReply>()
            .await
            .map_err(|e| ProxyError::Decode(e.to_string()))?;
        Ok(reply.output)
    }
}
