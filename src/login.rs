#![cfg(not(tarpaulin_include))]

#[cfg(feature = "web")]
use crate::app::{AppState, error_response};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "web")]
use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

#[cfg(feature = "web")]
use crate::error::RecetarioError;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides whether a presented secret grants administrator access.
///
/// The gate is pluggable so the plaintext shared password can be swapped for a
/// hashed one (or anything else) without touching the handlers.
pub trait AdminGate: Send + Sync {
    fn admit(&self, secret: &str) -> bool;
}

/// Single shared password compared in plaintext.
pub struct SharedSecret {
    password: String,
}

impl SharedSecret {
    pub fn new(password: impl Into<String>) -> Self {
        SharedSecret {
            password: password.into(),
        }
    }
}

impl AdminGate for SharedSecret {
    fn admit(&self, secret: &str) -> bool {
        !secret.is_empty() && secret == self.password
    }
}

/// Shared password stored as an Argon2 PHC string.
pub struct HashedSecret {
    hash: String,
}

impl HashedSecret {
    /// Fails if `hash` is not a valid PHC string.
    pub fn new(hash: impl Into<String>) -> Result<Self, String> {
        let hash = hash.into();
        PasswordHash::new(&hash).map_err(|_| "Invalid password hash format".to_string())?;
        Ok(HashedSecret { hash })
    }
}

impl AdminGate for HashedSecret {
    fn admit(&self, secret: &str) -> bool {
        verify_password(secret, &self.hash).unwrap_or(false)
    }
}

/// Hash a password using Argon2
///
/// Creates a PHC-format Argon2id hash suitable for [`HashedSecret`].
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, String>` - The password hash or an error
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Proof that the holder is a logged-in administrator. Only
/// [`SessionStore::admin`] and [`SessionStore::login`] hand these out, and every
/// mutating controller action requires one.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminToken {
    session_id: String,
}

impl AdminToken {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Active administrator sessions, keyed by session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SystemTime>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(duration: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Checks `secret` against `gate` and opens a session on success.
    pub fn login(&self, gate: &dyn AdminGate, secret: &str) -> Option<AdminToken> {
        if !gate.admit(secret) {
            log::warn!("rejected administrator login");
            return None;
        }

        let session_id = Uuid::new_v4().to_string();
        let expires_at = SystemTime::now() + self.duration;

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, expiry| *expiry > SystemTime::now());
        sessions.insert(session_id.clone(), expires_at);
        log::info!("administrator session opened");

        Some(AdminToken { session_id })
    }

    /// The token for `session_id` if that session exists and has not expired.
    pub fn admin(&self, session_id: &str) -> Option<AdminToken> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());

        match sessions.get(session_id) {
            Some(expires_at) if *expires_at > SystemTime::now() => Some(AdminToken {
                session_id: session_id.to_string(),
            }),
            _ => None,
        }
    }

    pub fn logout(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id).is_some()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(SESSION_DURATION)
    }
}

/// Login form data
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

// Web handler functions below (only compiled with "web" feature)

/// Handle administrator login
///
/// Verifies the password through the configured gate and sets the session cookie.
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> Response {
    match state.sessions.login(state.gate.as_ref(), &credentials.password) {
        Some(token) => {
            let mut cookie = Cookie::new(SESSION_COOKIE, token.session_id().to_string());
            cookie.set_path("/");
            cookie.set_http_only(true);
            (
                jar.add(cookie),
                Json(serde_json::json!({ "status": "ok" })),
            )
                .into_response()
        }
        None => error_response(StatusCode::UNAUTHORIZED, "Contraseña incorrecta."),
    }
}

/// Handle administrator logout
///
/// Drops the server-side session and clears the cookie.
#[cfg(feature = "web")]
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.logout(cookie.value());
    }

    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    (jar.remove(cookie), Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// Admin token for the request's session cookie, if any.
#[cfg(feature = "web")]
pub fn admin_from_jar(state: &AppState, jar: &CookieJar) -> Option<AdminToken> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.admin(cookie.value()))
}

/// Like [`admin_from_jar`] but fails with `Unauthorized`.
#[cfg(feature = "web")]
pub fn require_admin(state: &AppState, jar: &CookieJar) -> Result<AdminToken, RecetarioError> {
    admin_from_jar(state, jar).ok_or(RecetarioError::Unauthorized)
}
