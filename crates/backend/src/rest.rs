//! HTTP client for the hosted data & auth service.
//!
//! The service exposes a GoTrue-style auth surface under `auth/v1` and
//! PostgREST-style table endpoints under `rest/v1`. Session-change events are
//! synthesized client-side after each successful auth call, so the controller
//! observes the same stream regardless of backend implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::sync::Mutex;
use tokio::sync::broadcast;

use quiz_core::model::{AttemptRecord, Role, UserId};

use crate::repository::{
    AuthEvent, AuthGateway, AuthSession, BackendError, NewAttemptRecord, ProfileRecord,
    ProfileRepository, ProfileUpdate, ProgressRepository, SignUpMetadata,
};

const EVENT_CAPACITY: usize = 16;

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub anon_key: String,
}

impl RestConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_BACKEND_URL").ok()?;
        let anon_key = env::var("QUIZ_BACKEND_ANON_KEY").ok()?;
        if base_url.trim().is_empty() || anon_key.trim().is_empty() {
            return None;
        }
        Some(Self { base_url, anon_key })
    }
}

pub struct RestBackend {
    client: Client,
    config: RestConfig,
    access_token: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestBackend {
    #[must_use]
    pub fn new(config: RestConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client: Client::new(),
            config,
            access_token: Mutex::new(None),
            events,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn table_url(&self, table: &str, filters: &str) -> String {
        format!(
            "{}/rest/v1/{table}?{filters}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn bearer(&self) -> String {
        self.access_token
            .lock()
            .ok()
            .and_then(|token| token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn store_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.lock() {
            *guard = token;
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

//
// ─── WIRE PAYLOADS ────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: UserId,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg.or(self.message).or(self.error_description)
    }
}

/// Auth failures carry the service's message verbatim so the UI can show it.
async fn check_auth(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("auth request failed with status {status}"));
    Err(BackendError::Auth(message))
}

async fn check_table(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("status {status}"));
    Err(BackendError::Connection(message))
}

fn transport(error: reqwest::Error) -> BackendError {
    BackendError::Connection(error.to_string())
}

//
// ─── AUTH ─────────────────────────────────────────────────────────────────────
//

#[async_trait]
impl AuthGateway for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let response = self
            .client
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", &self.config.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(transport)?;

        let body: TokenResponse = check_auth(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;

        let session = AuthSession {
            user_id: body.user.id,
            email: body.user.email,
        };
        self.store_token(Some(body.access_token));
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<AuthSession, BackendError> {
        let response = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&SignUpRequest {
                email,
                password,
                data: metadata,
            })
            .send()
            .await
            .map_err(transport)?;

        let body: TokenResponse = check_auth(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;

        let session = AuthSession {
            user_id: body.user.id,
            email: body.user.email,
        };
        // the service authenticates as the freshly created user
        self.store_token(Some(body.access_token));
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_auth(response).await?;

        self.store_token(None);
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

//
// ─── PROFILES ─────────────────────────────────────────────────────────────────
//

#[async_trait]
impl ProfileRepository for RestBackend {
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, BackendError> {
        let response = self
            .client
            .get(self.table_url("profiles", "select=*&order=name.asc"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_table(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))
    }

    async fn get_profile(&self, id: UserId) -> Result<ProfileRecord, BackendError> {
        let response = self
            .client
            .get(self.table_url("profiles", &format!("select=*&id=eq.{id}")))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<ProfileRecord> = check_table(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        rows.into_iter().next().ok_or(BackendError::NotFound)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<ProfileRecord>, BackendError> {
        let filters = format!("select=*&role=eq.{}&order=name.asc", role.as_str());
        let response = self
            .client
            .get(self.table_url("profiles", &filters))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_table(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))
    }

    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> Result<(), BackendError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut body = Map::new();
        if let Some(name) = update.name {
            body.insert("name".into(), Value::String(name));
        }
        if let Some(role) = update.role {
            body.insert("role".into(), Value::String(role.as_str().to_owned()));
        }
        if let Some(child_id) = update.child_id {
            let value = match child_id {
                Some(child) => Value::String(child.to_string()),
                None => Value::Null,
            };
            body.insert("child_id".into(), value);
        }

        let response = self
            .client
            .patch(self.table_url("profiles", &format!("id=eq.{id}")))
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer())
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(transport)?;
        check_table(response).await?;
        Ok(())
    }

    async fn delete_profile(&self, id: UserId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.table_url("profiles", &format!("id=eq.{id}")))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_table(response).await?;
        Ok(())
    }
}

//
// ─── PROGRESS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
impl ProgressRepository for RestBackend {
    async fn list_attempts(&self) -> Result<Vec<AttemptRecord>, BackendError> {
        // created_at order keeps the normalizer's last-write-wins stable
        let response = self
            .client
            .get(self.table_url("progress", "select=*&order=created_at.asc"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_table(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Serialization(e.to_string()))
    }

    async fn insert_attempt(&self, record: NewAttemptRecord) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.table_url("progress", "select=*"))
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(self.bearer())
            .json(&record)
            .send()
            .await
            .map_err(transport)?;
        check_table(response).await?;
        Ok(())
    }

    async fn delete_attempts(&self, user_id: UserId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.table_url("progress", &format!("user_id=eq.{user_id}")))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_table(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new(RestConfig {
            base_url: "https://example.supabase.co/".into(),
            anon_key: "anon".into(),
        })
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let backend = backend();
        assert_eq!(
            backend.auth_url("signup"),
            "https://example.supabase.co/auth/v1/signup"
        );
        assert_eq!(
            backend.table_url("progress", "select=*"),
            "https://example.supabase.co/rest/v1/progress?select=*"
        );
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let backend = backend();
        assert_eq!(backend.bearer(), "anon");
        backend.store_token(Some("jwt".into()));
        assert_eq!(backend.bearer(), "jwt");
    }

    #[test]
    fn error_body_prefers_first_message_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"msg":"Invalid login credentials"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));
    }
}
