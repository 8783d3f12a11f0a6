//! In-process identity backend.
//!
//! Issues an access/refresh cookie pair and rotates the access token when it
//! expires, which makes it a faithful stand-in for the hosted provider in
//! integration tests and local development. Not meant for production use:
//! everything lives in memory and secrets are compared directly.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use ulid::Ulid;
use uuid::Uuid;

use super::{
    events::{SessionEvent, SessionEvents, Subscription},
    AuthError, CookieJar, Identity, IdentityService,
};

pub const SESSION_COOKIE_NAME: &str = "soglia_session";
pub const REFRESH_COOKIE_NAME: &str = "soglia_refresh";

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

struct UserRecord {
    secret: SecretString,
    identity: Identity,
}

struct SessionEntry {
    identity: Identity,
    access_token: String,
    access_expires_at: Instant,
    refresh_token: String,
}

pub struct MemoryIdentity {
    users: Mutex<HashMap<String, UserRecord>>,
    sessions: Mutex<Vec<SessionEntry>>,
    access_ttl: Duration,
    events: SessionEvents,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new(events: SessionEvents) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            sessions: Mutex::new(Vec::new()),
            access_ttl: DEFAULT_ACCESS_TTL,
            events,
        }
    }

    /// Shorten (or zero) the access-token lifetime to exercise the refresh
    /// path.
    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Add a user that can sign in against this backend.
    pub async fn register(&self, email: &str, secret: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: normalize_email(email),
        };
        self.users.lock().await.insert(
            identity.email.clone(),
            UserRecord {
                secret: SecretString::from(secret.to_string()),
                identity: identity.clone(),
            },
        );
        identity
    }

    fn issue_cookies(&self, entry: &SessionEntry, jar: &mut CookieJar) {
        let ttl = self.access_ttl.as_secs();
        jar.apply_set_cookie(&session_cookie(SESSION_COOKIE_NAME, &entry.access_token, ttl));
        // The refresh token outlives the access token; a day is plenty for
        // a dev backend.
        jar.apply_set_cookie(&session_cookie(
            REFRESH_COOKIE_NAME,
            &entry.refresh_token,
            24 * 60 * 60,
        ));
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie(name: &str, token: &str, max_age: u64) -> String {
    format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn resolve_identity(&self, jar: &mut CookieJar) -> Result<Option<Identity>, AuthError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        if let Some(token) = jar.get(SESSION_COOKIE_NAME) {
            let live = sessions
                .iter()
                .find(|entry| entry.access_token == token && now < entry.access_expires_at);
            if let Some(entry) = live {
                return Ok(Some(entry.identity.clone()));
            }
        }

        // Access token missing or expired: try the refresh token.
        let Some(refresh) = jar.get(REFRESH_COOKIE_NAME).map(str::to_string) else {
            return Ok(None);
        };
        let Some(entry) = sessions
            .iter_mut()
            .find(|entry| entry.refresh_token == refresh)
        else {
            return Ok(None);
        };

        entry.access_token = Ulid::new().to_string();
        entry.access_expires_at = now + self.access_ttl;
        entry.refresh_token = Ulid::new().to_string();
        let identity = entry.identity.clone();
        let entry = &*entry;
        self.issue_cookies(entry, jar);
        Ok(Some(identity))
    }

    async fn sign_in(
        &self,
        email: &str,
        secret: &SecretString,
        jar: &mut CookieJar,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let users = self.users.lock().await;
        let Some(record) = users.get(&email) else {
            return Err(AuthError::InvalidCredentials);
        };
        if record.secret.expose_secret() != secret.expose_secret() {
            return Err(AuthError::InvalidCredentials);
        }
        let identity = record.identity.clone();
        drop(users);

        let entry = SessionEntry {
            identity: identity.clone(),
            access_token: Ulid::new().to_string(),
            access_expires_at: Instant::now() + self.access_ttl,
            refresh_token: Ulid::new().to_string(),
        };
        self.issue_cookies(&entry, jar);
        self.sessions.lock().await.push(entry);

        self.events
            .publish(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self, jar: &mut CookieJar) -> Result<(), AuthError> {
        let access = jar.get(SESSION_COOKIE_NAME).map(str::to_string);
        let refresh = jar.get(REFRESH_COOKIE_NAME).map(str::to_string);

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|entry| {
            Some(&entry.access_token) != access.as_ref()
                && Some(&entry.refresh_token) != refresh.as_ref()
        });
        drop(sessions);

        // Always clear the cookies, even when no session record matched.
        jar.apply_set_cookie(&clear_cookie(SESSION_COOKIE_NAME));
        jar.apply_set_cookie(&clear_cookie(REFRESH_COOKIE_NAME));
        self.events.publish(SessionEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}
