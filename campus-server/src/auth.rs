use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use campus_registry::{random_string, Identity, UserData};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::context::ServerContext;

const SESSION_DURATION_IN_DAYS: i64 = 7;

/// A logged in user, kept server-side and referenced by an opaque bearer
/// token. Sessions are presentation state, the registry itself only ever
/// sees the [Identity] carried here.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub token: String,
    pub user: UserData,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user.id,
            role: self.user.role,
        }
    }
}

/// In-memory session storage. The persisted contract stays the four
/// entity tables, so sessions do not survive a restart.
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Creates a session for a freshly authenticated user
    pub fn create(&self, user: UserData) -> SessionData {
        self.clear_expired();

        let session = SessionData {
            token: random_string(32),
            user,
            expires_at: Utc::now() + Duration::days(SESSION_DURATION_IN_DAYS),
        };

        self.sessions.insert(session.token.clone(), session.clone());

        session
    }

    /// Returns the session if it exists and has not expired
    pub fn get(&self, token: &str) -> Option<SessionData> {
        let session = self.sessions.get(token)?.clone();

        if session.expires_at <= Utc::now() {
            self.sessions.remove(token);
            return None;
        }

        Some(session)
    }

    /// Deletes the associated session, if it exists
    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn clear_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, s| s.expires_at > now);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn identity(&self) -> Identity {
        self.0.identity()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = state
            .sessions
            .get(token)
            .ok_or((StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}
