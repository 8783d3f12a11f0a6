//! Identity-service boundary.
//!
//! The identity provider owns the session credential end to end: it issues
//! it on sign-in, refreshes it when the access token has expired, and
//! revokes it on sign-out. Everything in this crate only reads the cookie
//! jar, forwards it, or asks the provider to act on it. The provider's
//! cookie mutations are recorded in the jar so callers can replay them on
//! whatever response they end up producing.

pub mod client;
pub mod events;
pub mod jar;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use uuid::Uuid;

pub use client::HttpIdentity;
pub use events::{SessionEvent, SessionEvents, Subscription};
pub use jar::CookieJar;
pub use memory::MemoryIdentity;

/// Resolved user record derived from a valid session credential.
///
/// Ephemeral: recomputed on every request or guard mount, never cached
/// across checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Errors surfaced by the auth boundary.
///
/// An expired session is not an error: resolution collapses it to
/// `Ok(None)` so callers fall through to their redirect path.
#[derive(Debug)]
pub enum AuthError {
    /// Sign-in rejected; safe to show to the user.
    InvalidCredentials,
    /// The identity provider could not be reached or misbehaved.
    UpstreamUnavailable(String),
    /// A route table rule set that cannot classify every path.
    MisconfiguredRoute(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::UpstreamUnavailable(detail) => {
                write!(f, "identity service unavailable: {detail}")
            }
            Self::MisconfiguredRoute(detail) => write!(f, "route table misconfigured: {detail}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Contract with the identity provider.
///
/// The provider is opaque: implementations validate or refresh credentials
/// and report the resolved identity, recording any cookie side effects in
/// the jar they were handed.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolve the jar's credential into an identity.
    ///
    /// When only the access token has expired the provider exchanges the
    /// refresh token and records the replacement cookies in `jar`. Missing,
    /// expired, and unrefreshable credentials all resolve to `Ok(None)`.
    async fn resolve_identity(&self, jar: &mut CookieJar) -> Result<Option<Identity>, AuthError>;

    /// Authenticate with an email/secret pair, setting the session cookies
    /// in `jar` on success.
    async fn sign_in(
        &self,
        email: &str,
        secret: &SecretString,
        jar: &mut CookieJar,
    ) -> Result<Identity, AuthError>;

    /// Invalidate the current session and clear its cookies.
    ///
    /// Idempotent: signing out without an active session is not an error.
    async fn sign_out(&self, jar: &mut CookieJar) -> Result<(), AuthError>;

    /// Subscribe to session transitions. Delivery stops when the returned
    /// handle is dropped or explicitly unsubscribed.
    fn subscribe(&self) -> Subscription;
}
