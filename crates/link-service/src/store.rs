//! # User Store
//!
//! Port for the user-record document store plus an in-memory adapter.
//! Handlers only need key-field lookups and single-field updates, so that
//! is all the port offers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use shared_types::Uin;
use std::collections::HashMap;
use uuid::Uuid;

/// One logged-in device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub device: String,
    pub created_at: DateTime<Utc>,
}

/// A stored user document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub uuid: Uuid,
    pub name: String,
    pub javaid: Option<String>,
    pub xboxid: Option<String>,
    pub qq: Option<Uin>,
    pub sessions: Vec<Session>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            javaid: None,
            xboxid: None,
            qq: None,
            sessions: Vec::new(),
        }
    }
}

/// A user resolved from a session token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    #[serde(flatten)]
    pub user: UserRecord,
    /// Session the token belongs to.
    pub current_session: String,
}

/// Uniqueness lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Name(String),
    /// Matches either the Java or the Xbox id.
    GameId(String),
    Qq(Uin),
}

impl UserFilter {
    fn matches(&self, user: &UserRecord) -> bool {
        match self {
            UserFilter::Name(name) => &user.name == name,
            UserFilter::GameId(id) => {
                user.javaid.as_ref() == Some(id) || user.xboxid.as_ref() == Some(id)
            }
            UserFilter::Qq(qq) => user.qq == Some(*qq),
        }
    }
}

/// Single-field updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserUpdate {
    Name(String),
    JavaId(String),
    XboxId(String),
    Qq(Uin),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Resolve a session token. `None` when the token is unknown.
    async fn verify_token(&self, token: &str) -> Result<Option<AuthenticatedUser>, StoreError>;

    /// Whether any user matches `filter`.
    async fn exists(&self, filter: &UserFilter) -> Result<bool, StoreError>;

    async fn update(&self, uuid: Uuid, update: UserUpdate) -> Result<(), StoreError>;

    /// Log a device out.
    async fn remove_session(&self, uuid: Uuid, session_id: &str) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) -> Uuid {
        let uuid = user.uuid;
        self.users.write().insert(uuid, user);
        uuid
    }

    /// Open a session for `uuid`; returns `(session_id, token)`.
    pub fn open_session(&self, uuid: Uuid, device: &str) -> Result<(String, String), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(&uuid).ok_or(StoreError::UserNotFound(uuid))?;
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            token: Uuid::new_v4().simple().to_string(),
            device: device.to_string(),
            created_at: Utc::now(),
        };
        let ids = (session.id.clone(), session.token.clone());
        user.sessions.push(session);
        Ok(ids)
    }

    pub fn get(&self, uuid: Uuid) -> Option<UserRecord> {
        self.users.read().get(&uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthenticatedUser>, StoreError> {
        let users = self.users.read();
        let found = users.values().find_map(|user| {
            user.sessions
                .iter()
                .find(|session| session.token == token)
                .map(|session| AuthenticatedUser {
                    user: user.clone(),
                    current_session: session.id.clone(),
                })
        });
        Ok(found)
    }

    async fn exists(&self, filter: &UserFilter) -> Result<bool, StoreError> {
        Ok(self.users.read().values().any(|user| filter.matches(user)))
    }

    async fn update(&self, uuid: Uuid, update: UserUpdate) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(&uuid).ok_or(StoreError::UserNotFound(uuid))?;
        match update {
            UserUpdate::Name(name) => user.name = name,
            UserUpdate::JavaId(id) => user.javaid = Some(id),
            UserUpdate::XboxId(id) => user.xboxid = Some(id),
            UserUpdate::Qq(qq) => user.qq = Some(qq),
        }
        Ok(())
    }

    async fn remove_session(&self, uuid: Uuid, session_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(&uuid).ok_or(StoreError::UserNotFound(uuid))?;
        let before = user.sessions.len();
        user.sessions.retain(|session| session.id != session_id);
        if user.sessions.len() == before {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }
}
