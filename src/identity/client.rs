//! HTTP client for the hosted identity provider.
//!
//! The provider exposes three endpoints: `GET /v1/auth/session` resolves
//! (and transparently refreshes) the credential carried in the `Cookie`
//! header, `POST /v1/auth/login` issues one, and `POST /v1/auth/logout`
//! revokes it. Cookie mutations arrive as `Set-Cookie` response headers and
//! are recorded in the caller's jar verbatim.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::{
    events::{SessionEvent, SessionEvents, Subscription},
    AuthError, CookieJar, Identity, IdentityService,
};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

const HTTP_TIMEOUT_SECONDS: u64 = 5;

pub struct HttpIdentity {
    client: Client,
    base_url: String,
    events: SessionEvents,
}

impl HttpIdentity {
    /// Build a client for the provider at `base_url`.
    ///
    /// # Errors
    /// Returns an error when the URL is unusable or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, events: SessionEvents) -> Result<Self, AuthError> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()
            .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            events,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn record_cookies(response: &reqwest::Response, jar: &mut CookieJar) {
        for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
            match value.to_str() {
                Ok(raw) => jar.apply_set_cookie(raw),
                Err(err) => error!("Ignoring non-ASCII Set-Cookie from provider: {err}"),
            }
        }
    }
}

/// Validate the provider URL and strip any trailing slash so endpoint
/// concatenation stays predictable.
fn normalize_base_url(base_url: &str) -> Result<String, AuthError> {
    let url = Url::parse(base_url)
        .map_err(|err| AuthError::UpstreamUnavailable(format!("invalid base URL: {err}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AuthError::UpstreamUnavailable(format!(
                "unsupported scheme: {other}"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(AuthError::UpstreamUnavailable(
            "base URL has no host".to_string(),
        ));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

fn parse_identity(body: &Value) -> Result<Identity, AuthError> {
    let id = body["user"]["id"]
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AuthError::UpstreamUnavailable("no user id in response".to_string()))?;
    let email = body["user"]["email"]
        .as_str()
        .ok_or_else(|| AuthError::UpstreamUnavailable("no user email in response".to_string()))?;
    Ok(Identity {
        id,
        email: email.to_string(),
    })
}

#[async_trait]
impl IdentityService for HttpIdentity {
    async fn resolve_identity(&self, jar: &mut CookieJar) -> Result<Option<Identity>, AuthError> {
        // No credential at all: skip the round trip, there is nothing to
        // refresh.
        let Some(cookie_header) = jar.cookie_header() else {
            return Ok(None);
        };

        let session_url = self.endpoint_url("/v1/auth/session");
        let response = self
            .client
            .get(&session_url)
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await
            .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;

        Self::record_cookies(&response, jar);

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;
                parse_identity(&body).map(Some)
            }
            // No session and expired-beyond-refresh look identical here.
            StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED => Ok(None),
            status => {
                debug!("Unexpected status from {session_url}: {status}");
                Err(AuthError::UpstreamUnavailable(format!(
                    "{session_url} - {status}"
                )))
            }
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        secret: &SecretString,
        jar: &mut CookieJar,
    ) -> Result<Identity, AuthError> {
        let login_url = self.endpoint_url("/v1/auth/login");
        let payload = json!({
            "email": email,
            "password": secret.expose_secret(),
        });

        let response = self
            .client
            .post(&login_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;

        Self::record_cookies(&response, jar);

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;
                let identity = parse_identity(&body)?;
                self.events
                    .publish(SessionEvent::SignedIn(identity.clone()));
                Ok(identity)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidCredentials),
            status => Err(AuthError::UpstreamUnavailable(format!(
                "{login_url} - {status}"
            ))),
        }
    }

    async fn sign_out(&self, jar: &mut CookieJar) -> Result<(), AuthError> {
        let logout_url = self.endpoint_url("/v1/auth/logout");
        let mut request = self.client.post(&logout_url);
        if let Some(cookie_header) = jar.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie_header);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AuthError::UpstreamUnavailable(err.to_string()))?;

        Self::record_cookies(&response, jar);

        // Any 2xx counts, including 204 for "there was no session".
        if response.status().is_success() {
            self.events.publish(SessionEvent::SignedOut);
            Ok(())
        } else {
            Err(AuthError::UpstreamUnavailable(format!(
                "{logout_url} - {}",
                response.status()
            )))
        }
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_base_url, parse_identity};
    use serde_json::json;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let url = normalize_base_url("https://id.example.com/").unwrap();
        assert_eq!(url, "https://id.example.com");
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        assert!(normalize_base_url("ftp://id.example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn identity_parses_from_user_object() {
        let body = json!({
            "user": {
                "id": "5f9c6f3e-52fa-4f2c-9d75-8f2f4c4b4a10",
                "email": "ops@example.com"
            }
        });
        let identity = parse_identity(&body).unwrap();
        assert_eq!(identity.email, "ops@example.com");
    }

    #[test]
    fn identity_parse_fails_without_id() {
        let body = json!({ "user": { "email": "ops@example.com" } });
        assert!(parse_identity(&body).is_err());
    }
}
