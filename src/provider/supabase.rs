use anyhow::Context;
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{AuthPayload, AuthProvider, DataProvider, EqFilter, ProviderSession, ProviderUser};
use crate::error::AppError;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Client for a hosted Supabase project (GoTrue + PostgREST over HTTP).
///
/// Like the official SDK, the client remembers the session of the most recent
/// sign-in; `sign_out` ends that session.
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<ProviderSession>>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("userhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build supabase http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Mutex::new(None),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: String, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn rows(&self, method: Method, table: &str, filter: Option<EqFilter<'_>>) -> RequestBuilder {
        let mut req = self.request(method, self.rest_url(table), &self.anon_key);
        if let Some(f) = filter {
            req = req.query(&[(f.column, format!("eq.{}", f.value))]);
        }
        req
    }

    async fn remember(&self, session: Option<&ProviderSession>) {
        if let Some(s) = session {
            *self.session.lock().await = Some(s.clone());
        }
    }
}

async fn read_json(resp: Response) -> Result<Value, AppError> {
    let status = resp.status();
    let text = resp.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(provider_error(status.as_u16(), body))
    }
}

fn provider_error(status: u16, body: Value) -> AppError {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|k| body.get(k).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("provider responded with {}", status));
    warn!(%status, %message, "supabase error response");
    AppError::new(status, message).with_details(body)
}

fn is_dead_session(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    )
}

/// Sign-in and auto-confirmed sign-up answer with a session (user nested);
/// sign-up that still needs email confirmation answers with a bare user.
fn parse_auth_payload(body: Value) -> Result<AuthPayload, AppError> {
    if body.get("access_token").is_some() {
        let user = match body.get("user") {
            Some(u) if !u.is_null() => Some(serde_json::from_value::<ProviderUser>(u.clone())?),
            _ => None,
        };
        let session = serde_json::from_value::<ProviderSession>(body)?;
        return Ok(AuthPayload {
            user,
            session: Some(session),
        });
    }
    if body.get("id").is_some() {
        return Ok(AuthPayload {
            user: Some(serde_json::from_value(body)?),
            session: None,
        });
    }
    Ok(AuthPayload::default())
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, AppError> {
        let resp = self
            .request(Method::POST, self.auth_url("token"), &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let payload = parse_auth_payload(read_json(resp).await?)?;
        self.remember(payload.session.as_ref()).await;
        debug!(%email, "supabase sign-in ok");
        Ok(payload)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthPayload, AppError> {
        let resp = self
            .request(Method::POST, self.auth_url("signup"), &self.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        let payload = parse_auth_payload(read_json(resp).await?)?;
        self.remember(payload.session.as_ref()).await;
        debug!(%email, "supabase sign-up ok");
        Ok(payload)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let mut current = self.session.lock().await;
        let Some(session) = current.take() else {
            debug!("sign-out without a current session");
            return Ok(());
        };
        let sent = self
            .request(Method::POST, self.auth_url("logout"), &session.access_token)
            .send()
            .await;
        let result = match sent {
            Ok(resp) => read_json(resp).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => Ok(()),
            // the session is already dead on the provider side
            Err(e) if is_dead_session(e.status) => {
                debug!(status = %e.status, "provider no longer knows the session; cleared locally");
                Ok(())
            }
            Err(e) => {
                *current = Some(session);
                Err(e)
            }
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, AppError> {
        let resp = self
            .request(Method::GET, self.auth_url("user"), access_token)
            .send()
            .await?;
        match read_json(resp).await? {
            Value::Null => Ok(None),
            body => Ok(Some(serde_json::from_value(body)?)),
        }
    }
}

#[async_trait]
impl DataProvider for SupabaseClient {
    async fn select(&self, table: &str, filter: Option<EqFilter<'_>>) -> Result<Vec<Value>, AppError> {
        let resp = self
            .rows(Method::GET, table, filter)
            .query(&[("select", "*")])
            .send()
            .await?;
        Ok(serde_json::from_value(read_json(resp).await?)?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, AppError> {
        let resp = self
            .rows(Method::POST, table, None)
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(&row)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn update(&self, table: &str, filter: EqFilter<'_>, patch: Value) -> Result<Value, AppError> {
        let resp = self
            .rows(Method::PATCH, table, Some(filter))
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(&patch)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn delete(&self, table: &str, filter: EqFilter<'_>) -> Result<(), AppError> {
        let resp = self
            .rows(Method::DELETE, table, Some(filter))
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;
        read_json(resp).await?;
        Ok(())
    }
}
