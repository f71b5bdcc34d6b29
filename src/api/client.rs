use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::api::Backend;
use crate::api::envelope::{Envelope, read_envelope};
use crate::api::models::{
    BookingRequest, Channel, Conversation, Identity, Message, OutgoingMessage, Professional, Profile,
    Registration, Role, SessionEntry, Slot, ThreadPayload, ThreadTarget, UserId, WireProfessional,
    WireProfile, WireRow, WireSession, WireUser,
};
use crate::app::AppConfig;
use crate::error::{ClientError, Result, ValidationError};
use crate::format;

const ADMIN_INBOX_LIMIT: &str = "100";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Route {
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
}

impl Route {
    fn new(path: &'static str) -> Self {
        Self { path, query: Vec::new() }
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    admin_username: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let base_url = crate::utils::normalize_url(&config.base_url);
        // Validate once so every later join is infallible in practice.
        Url::parse(&base_url)?;
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_username: config.admin_username.clone(),
        })
    }

    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    fn url(&self, route: &Route) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, route.path);
        let url = if route.query.is_empty() {
            Url::parse(&raw)?
        } else {
            Url::parse_with_params(&raw, route.query.iter().map(|(k, v)| (*k, v.as_str())))?
        };
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, route: Route) -> Result<Option<T>> {
        let url = self.url(&route)?;
        debug!("GET {}", route.path);
        let resp = self.http.get(url).send().await.map_err(|e| {
            warn!("GET {} failed: {e}", route.path);
            ClientError::from(e)
        })?;
        read_envelope(resp).await
    }

    async fn post_raw(&self, path: &'static str, body: &Value) -> Result<(u16, Vec<u8>)> {
        let url = self.url(&Route::new(path))?;
        debug!("POST {path}");
        let resp = self.http.post(url).json(body).send().await.map_err(|e| {
            warn!("POST {path} failed: {e}");
            ClientError::from(e)
        })?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    async fn post<T: DeserializeOwned>(&self, path: &'static str, body: &Value) -> Result<Option<T>> {
        let (status, bytes) = self.post_raw(path, body).await?;
        Envelope::<T>::decode(status, &bytes)
    }
}

pub(crate) fn conversations_route(identity: &Identity, admin_username: &str) -> Route {
    match identity.role {
        Role::Student => Route::new("/api/student/messages").param("user_id", &identity.id),
        Role::Professional => Route::new("/api/professional/messages").param("user_id", &identity.id),
        Role::Admin => Route::new("/api/admin/messages")
            .param("admin_username", admin_username)
            .param("limit", ADMIN_INBOX_LIMIT),
    }
}

pub(crate) fn profile_route(identity: &Identity) -> Result<Route> {
    let path = match identity.role {
        Role::Student => "/api/student/profile",
        Role::Professional => "/api/professional/profile",
        Role::Admin => return Err(ValidationError::NoProfile.into()),
    };
    Ok(Route::new(path).param("user_id", &identity.id))
}

pub(crate) fn thread_route(identity: &Identity, target: &ThreadTarget, admin_username: &str) -> Result<Route> {
    let peer = &target.peer;
    let route = match (identity.role, target.channel, peer.role) {
        (Role::Student, Channel::Peer, Role::Professional) => Route::new("/api/messages")
            .param("student_id", &identity.id)
            .param("professional_id", &peer.id),
        (Role::Professional, Channel::Peer, Role::Student) => Route::new("/api/messages")
            .param("student_id", &peer.id)
            .param("professional_id", &identity.id),
        (Role::Student, Channel::Admin, Role::Admin) => Route::new("/api/student/admin-messages")
            .param("user_id", &identity.id)
            .param("admin_username", admin_username),
        (Role::Professional, Channel::Admin, Role::Admin) => Route::new("/api/professional/admin-messages")
            .param("user_id", &identity.id)
            .param("admin_username", admin_username),
        (Role::Admin, Channel::Admin, Role::Student) => Route::new("/api/student/admin-messages")
            .param("user_id", &peer.id)
            .param("admin_username", admin_username),
        (Role::Admin, Channel::Admin, Role::Professional) => Route::new("/api/professional/admin-messages")
            .param("user_id", &peer.id)
            .param("admin_username", admin_username),
        _ => return Err(ValidationError::UnsupportedThread.into()),
    };
    Ok(route)
}

pub(crate) fn send_route(message: &OutgoingMessage, admin_username: &str) -> Result<(&'static str, Value)> {
    let me = &message.from;
    let peer = &message.to.peer;
    let text = &message.text;
    let routed = match (me.role, message.to.channel, peer.role) {
        (Role::Student, Channel::Peer, Role::Professional) => (
            "/api/messages",
            json!({
                "student_id": me.id,
                "professional_id": peer.id,
                "sender": Role::Student.label(),
                "message_text": text,
            }),
        ),
        (Role::Professional, Channel::Peer, Role::Student) => (
            "/api/messages",
            json!({
                "student_id": peer.id,
                "professional_id": me.id,
                "sender": Role::Professional.label(),
                "message_text": text,
            }),
        ),
        (Role::Student, Channel::Admin, Role::Admin) => (
            "/api/student/admin-messages",
            json!({ "student_id": me.id, "admin_username": admin_username, "message_text": text }),
        ),
        (Role::Professional, Channel::Admin, Role::Admin) => (
            "/api/professional/admin-messages",
            json!({ "professional_id": me.id, "admin_username": admin_username, "message_text": text }),
        ),
        (Role::Admin, Channel::Admin, Role::Student | Role::Professional) => (
            "/api/admin/messages",
            json!({
                "admin_username": admin_username,
                "target_type": peer.role.as_str(),
                "target_id": peer.id,
                "message_text": text,
            }),
        ),
        _ => return Err(ValidationError::UnsupportedThread.into()),
    };
    Ok(routed)
}

impl Backend for ApiClient {
    async fn conversations(&self, identity: &Identity) -> Result<Vec<Conversation>> {
        let route = conversations_route(identity, &self.admin_username);
        let rows: Vec<WireRow> = self.get(route).await?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_conversation(identity.role))
            .collect())
    }

    async fn thread(&self, identity: &Identity, target: &ThreadTarget) -> Result<Vec<Message>> {
        let route = thread_route(identity, target, &self.admin_username)?;
        let payload: Option<ThreadPayload> = self.get(route).await?;
        let rows = payload.map(ThreadPayload::into_rows).unwrap_or_default();
        let total = rows.len();
        let messages: Vec<Message> = rows.into_iter().filter_map(WireRow::into_message).collect();
        if messages.len() != total {
            warn!("dropped {} message rows without a known sender", total - messages.len());
        }
        Ok(messages)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let (path, body) = send_route(message, &self.admin_username)?;
        self.post::<Value>(path, &body).await?;
        Ok(())
    }

    async fn professionals(&self) -> Result<Vec<Professional>> {
        let rows: Vec<WireProfessional> = self.get(Route::new("/api/professionals")).await?.unwrap_or_default();
        Ok(rows.into_iter().map(Professional::from).collect())
    }

    async fn slots(&self, professional: &UserId, date: NaiveDate) -> Result<Vec<Slot>> {
        let route = Route::new("/api/sessions/slots")
            .param("professional_id", professional)
            .param("date", format::iso_date(date));
        Ok(self.get(route).await?.unwrap_or_default())
    }

    async fn book(&self, request: &BookingRequest) -> Result<()> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Transport(e.to_string()))?;
        self.post::<Value>("/api/sessions", &body).await?;
        Ok(())
    }

    async fn sessions(&self, identity: &Identity) -> Result<Vec<SessionEntry>> {
        let path = match identity.role {
            Role::Student => "/api/student/sessions",
            Role::Professional => "/api/professional/sessions",
            Role::Admin => return Ok(Vec::new()),
        };
        let route = Route::new(path).param("user_id", &identity.id);
        let rows: Vec<WireSession> = self.get(route).await?.unwrap_or_default();
        Ok(rows.into_iter().map(SessionEntry::from).collect())
    }

    async fn profile(&self, identity: &Identity) -> Result<Profile> {
        let route = profile_route(identity)?;
        let wire: Option<WireProfile> = self.get(route).await?;
        wire.map(|w| w.into_profile(identity.role))
            .ok_or_else(|| ClientError::Transport("profile response carried no profile".into()))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let body = json!({ "email": email, "password": password });
        let user: Option<WireUser> = self.post("/api/login", &body).await?;
        user.and_then(|u| u.into_identity(None))
            .ok_or_else(|| ClientError::Transport("login response carried no user".into()))
    }

    async fn register(&self, registration: &Registration) -> Result<Identity> {
        let body = serde_json::to_value(registration).map_err(|e| ClientError::Transport(e.to_string()))?;
        let (status, bytes) = self.post_raw("/api/register", &body).await?;
        Envelope::<Value>::decode(status, &bytes)?;
        // Registration reports the new id at the top level, beside `status`.
        serde_json::from_slice::<WireUser>(&bytes)
            .ok()
            .and_then(|u| u.into_identity(Some(registration.role)))
            .ok_or_else(|| ClientError::Transport("registration response carried no user id".into()))
    }

    async fn verify_otp(&self, pending: &Identity, code: &str) -> Result<()> {
        let body = json!({
            "user_id": pending.id,
            "user_type": pending.role.as_str(),
            "otp_code": code,
        });
        self.post::<Value>("/api/verify-otp", &body).await?;
        Ok(())
    }

    async fn fetch_user(&self, pending: &Identity) -> Result<Identity> {
        let route = Route::new("/api/user")
            .param("user_id", &pending.id)
            .param("user_type", pending.role.as_str());
        let user: Option<WireUser> = self.get(route).await?;
        user.and_then(|u| u.into_identity(Some(pending.role)))
            .ok_or_else(|| ClientError::Transport("user lookup returned no user".into()))
    }
}
