//! External collaborator interface
//!
//! Authentication, user records, and message retention live on a hosted
//! platform; the relay core reaches it only through the narrow `Backend`
//! trait. `RestBackend` implements the trait against the platform's
//! PostgREST-style table API. All calls from the realtime path are
//! best-effort: a backend failure is logged, never fatal.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::chat_id::ChatId;
use crate::types::ParticipantId;

/// Identifier assigned by the platform to a persisted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(pub String);

/// A message row as returned by the platform's table API
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub chat_id: String,
    pub sender: String,
    pub body: String,
}

/// Errors from the external collaborator
///
/// Non-fatal to the relay core: persistence failures are logged only, and
/// an authorization-check failure rejects one connection attempt.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport or status error
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

/// Narrow contract the relay core requires from the platform
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Whether a user record exists for the participant (delegated
    /// authorization check for connect)
    async fn user_exists(&self, participant: &ParticipantId) -> Result<bool, BackendError>;

    /// Persist one message; fire-and-forget from the gateway
    async fn persist_message(
        &self,
        chat_id: &ChatId,
        sender: &ParticipantId,
        body: &str,
    ) -> Result<MessageId, BackendError>;

    /// Stored history for a chat, for caller-facing history surfaces.
    /// Not used by the realtime loop.
    async fn fetch_messages(&self, chat_id: &ChatId) -> Result<Vec<StoredMessage>, BackendError>;
}

/// HTTP client for the hosted platform's table API
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    /// Create a client for the given platform base URL and API key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn user_exists(&self, participant: &ParticipantId) -> Result<bool, BackendError> {
        // Same or-filter the platform uses for registration checks: the
        // participant id may be a username or an email.
        let filter = format!(
            "(username.eq.{id},email.eq.{id})",
            id = participant.as_str()
        );
        let rows: Vec<serde_json::Value> = self
            .request(self.client.get(self.table_url("user")))
            .query(&[("select", "username"), ("or", filter.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(!rows.is_empty())
    }

    async fn persist_message(
        &self,
        chat_id: &ChatId,
        sender: &ParticipantId,
        body: &str,
    ) -> Result<MessageId, BackendError> {
        let rows: Vec<StoredMessage> = self
            .request(self.client.post(self.table_url("message")))
            .header("Prefer", "return=representation")
            .json(&json!({
                "chat_id": chat_id.as_str(),
                "sender": sender.as_str(),
                "body": body,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let row = rows.first().ok_or_else(|| {
            BackendError::UnexpectedResponse("insert returned no rows".to_string())
        })?;
        Ok(MessageId(row.id.to_string()))
    }

    async fn fetch_messages(&self, chat_id: &ChatId) -> Result<Vec<StoredMessage>, BackendError> {
        let chat_filter = format!("eq.{}", chat_id.as_str());
        let rows: Vec<StoredMessage> = self
            .request(self.client.get(self.table_url("message")))
            .query(&[
                ("select", "id,chat_id,sender,body"),
                ("chat_id", chat_filter.as_str()),
                ("order", "id.asc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Scripted collaborator for gateway and handler tests
    #[derive(Debug, Default)]
    pub struct MockBackend {
        known_users: HashSet<String>,
        fail_persist: bool,
        persisted: Mutex<Vec<(String, String, String)>>,
    }

    impl MockBackend {
        pub fn with_users(users: &[&str]) -> Self {
            Self {
                known_users: users.iter().map(|u| u.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn failing_persist(mut self) -> Self {
            self.fail_persist = true;
            self
        }

        /// (chat_id, sender, body) triples handed to persist_message
        pub fn persisted(&self) -> Vec<(String, String, String)> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn user_exists(&self, participant: &ParticipantId) -> Result<bool, BackendError> {
            Ok(self.known_users.contains(participant.as_str()))
        }

        async fn persist_message(
            &self,
            chat_id: &ChatId,
            sender: &ParticipantId,
            body: &str,
        ) -> Result<MessageId, BackendError> {
            if self.fail_persist {
                return Err(BackendError::UnexpectedResponse(
                    "simulated persist failure".to_string(),
                ));
            }
            let mut persisted = self.persisted.lock().unwrap();
            persisted.push((
                chat_id.as_str().to_string(),
                sender.as_str().to_string(),
                body.to_string(),
            ));
            Ok(MessageId(persisted.len().to_string()))
        }

        async fn fetch_messages(
            &self,
            chat_id: &ChatId,
        ) -> Result<Vec<StoredMessage>, BackendError> {
            let persisted = self.persisted.lock().unwrap();
            Ok(persisted
                .iter()
                .filter(|(chat, _, _)| chat == chat_id.as_str())
                .enumerate()
                .map(|(i, (chat, sender, body))| StoredMessage {
                    id: i as i64,
                    chat_id: chat.clone(),
                    sender: sender.clone(),
                    body: body.clone(),
                })
                .collect())
        }
    }
}
