//! Minimal XRPC client: session management and `app.bsky.graph.getList`.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use super::ListService;
use crate::error::IngestError;

const CREATE_SESSION: &str = "xrpc/com.atproto.server.createSession";
const REFRESH_SESSION: &str = "xrpc/com.atproto.server.refreshSession";
const GET_LIST: &str = "xrpc/app.bsky.graph.getList";
const EXPIRED_TOKEN: &str = "ExpiredToken";
const PAGE_LIMIT: &str = "100";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    refresh_jwt: String,
    did: String,
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    subject: ListSubject,
}

#[derive(Debug, Deserialize)]
struct ListSubject {
    did: String,
}

#[derive(Debug, Clone)]
struct Tokens {
    access: String,
    refresh: String,
}

impl From<Session> for Tokens {
    fn from(session: Session) -> Self {
        Self {
            access: session.access_jwt,
            refresh: session.refresh_jwt,
        }
    }
}

enum PageOutcome {
    Page(ListPage),
    Expired,
}

/// Authenticated XRPC client for a PDS.
///
/// Access tokens are short-lived. A request rejected with `ExpiredToken`
/// (or 401) renews the session through `refreshSession`, falling back to a
/// fresh `createSession`, and is retried once.
pub struct XrpcClient {
    http: Client,
    service: String,
    identifier: String,
    password: String,
    tokens: RwLock<Option<Tokens>>,
    renewal: Mutex<()>,
}

impl std::fmt::Debug for XrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrpcClient")
            .field("service", &self.service)
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl XrpcClient {
    /// Creates a client for `service` (e.g. `https://bsky.social`).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if the HTTP client cannot be built.
    pub fn new(
        service: impl Into<String>,
        identifier: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IngestError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            service: service.into().trim_end_matches('/').to_string(),
            identifier: identifier.into(),
            password: password.into(),
            tokens: RwLock::new(None),
            renewal: Mutex::new(()),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.service)
    }

    async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access.clone())
    }

    async fn refresh_session(&self, refresh_jwt: &str) -> Result<Tokens, IngestError> {
        let response = self
            .http
            .post(self.endpoint(REFRESH_SESSION))
            .bearer_auth(refresh_jwt)
            .send()
            .await
            .map_err(|e| IngestError::Auth(format!("refreshSession: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Auth(format!("refreshSession {status}: {body}")));
        }
        let session: Session = response
            .json()
            .await
            .map_err(|e| IngestError::Auth(format!("refreshSession response: {e}")))?;
        tracing::debug!(did = %session.did, "session refreshed");
        Ok(session.into())
    }

    /// Replaces the `expired` access token, returning the new one. Callers
    /// racing on the same expired token share a single renewal.
    async fn renew_session(&self, expired: &str) -> Result<String, IngestError> {
        let _renewal = self.renewal.lock().await;
        let current = self.tokens.read().await.clone();
        let Some(current) = current else {
            return Err(IngestError::Auth("not logged in".to_string()));
        };
        if current.access != expired {
            return Ok(current.access);
        }

        match self.refresh_session(&current.refresh).await {
            Ok(tokens) => {
                let access = tokens.access.clone();
                *self.tokens.write().await = Some(tokens);
                Ok(access)
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh failed, logging in again");
                self.login().await?;
                self.access_token()
                    .await
                    .ok_or_else(|| IngestError::Auth("login stored no session".to_string()))
            }
        }
    }

    async fn fetch_page(
        &self,
        list: &str,
        token: &str,
        cursor: Option<&str>,
    ) -> Result<PageOutcome, IngestError> {
        let fetch_err = |message: String| IngestError::ListFetch {
            list: list.to_string(),
            message,
        };

        let mut params = vec![("list", list), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        let url = Url::parse_with_params(&self.endpoint(GET_LIST), &params)
            .map_err(|e| fetch_err(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_expired(status, &body) {
                return Ok(PageOutcome::Expired);
            }
            return Err(fetch_err(format!("{status}: {body}")));
        }
        response
            .json::<ListPage>()
            .await
            .map(PageOutcome::Page)
            .map_err(|e| fetch_err(format!("bad response: {e}")))
    }
}

fn is_expired(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED
        || serde_json::from_str::<XrpcErrorBody>(body)
            .is_ok_and(|err| err.error.as_deref() == Some(EXPIRED_TOKEN))
}

impl ListService for XrpcClient {
    async fn login(&self) -> Result<(), IngestError> {
        let response = self
            .http
            .post(self.endpoint(CREATE_SESSION))
            .json(&json!({
                "identifier": self.identifier,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|e| IngestError::Auth(format!("createSession: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Auth(format!("createSession {status}: {body}")));
        }
        let session: Session = response
            .json()
            .await
            .map_err(|e| IngestError::Auth(format!("createSession response: {e}")))?;

        tracing::info!(did = %session.did, service = %self.service, "logged in");
        *self.tokens.write().await = Some(session.into());
        Ok(())
    }

    async fn list_members(&self, list: &str) -> Result<HashSet<String>, IngestError> {
        let Some(mut token) = self.access_token().await else {
            return Err(IngestError::Auth("not logged in".to_string()));
        };

        let mut renewed = false;
        let mut members = HashSet::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = match self.fetch_page(list, &token, cursor.as_deref()).await? {
                PageOutcome::Page(page) => page,
                PageOutcome::Expired if !renewed => {
                    token = self.renew_session(&token).await?;
                    renewed = true;
                    continue;
                }
                PageOutcome::Expired => {
                    return Err(IngestError::ListFetch {
                        list: list.to_string(),
                        message: "access token rejected after session renewal".to_string(),
                    });
                }
            };
            members.extend(page.items.into_iter().map(|item| item.subject.did));
            match page.cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        tracing::debug!(list, members = members.len(), "fetched list");
        Ok(members)
    }
}
