//! Request-scoped cookie jar.
//!
//! Parsed once from the inbound `Cookie` header and tied to that single
//! request: never cache a jar across requests. Only the identity service
//! writes to it; the gateway and handlers replay the recorded `Set-Cookie`
//! values onto whatever response they produce, redirects included.

use std::collections::BTreeMap;

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::error;

#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
    // Full Set-Cookie strings pending for the outgoing response, in the
    // order the provider issued them.
    pending: Vec<String>,
}

impl CookieJar {
    /// Parse the jar from inbound request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = BTreeMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(value) = header.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                let trimmed = pair.trim();
                let mut parts = trimmed.splitn(2, '=');
                let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let key = key.trim();
                if !key.is_empty() {
                    cookies.insert(key.to_string(), val.trim().to_string());
                }
            }
        }
        Self {
            cookies,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Rebuild a `Cookie` header value reflecting any refreshed values, for
    /// forwarding the request upstream or into page handlers.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Record a `Set-Cookie` produced by the identity provider.
    ///
    /// Updates the in-jar value as well so a forwarded request carries the
    /// refreshed credential instead of the one that just got rotated.
    pub(crate) fn apply_set_cookie(&mut self, raw: &str) {
        let first = raw.split(';').next().unwrap_or_default();
        let mut parts = first.splitn(2, '=');
        if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
            let name = name.trim();
            let value = value.trim();
            if !name.is_empty() {
                if value.is_empty() || expires_immediately(raw) {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }
        }
        self.pending.push(raw.to_string());
    }

    /// Whether the provider rotated or cleared anything during this request.
    #[must_use]
    pub fn refreshed(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn pending_cookies(&self) -> &[String] {
        &self.pending
    }

    /// Append every pending `Set-Cookie` to the outgoing response headers.
    pub fn write_to(&self, headers: &mut HeaderMap) {
        for raw in &self.pending {
            match HeaderValue::from_str(raw) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(err) => error!("Dropping malformed Set-Cookie value: {err}"),
            }
        }
    }
}

fn expires_immediately(raw: &str) -> bool {
    raw.split(';')
        .skip(1)
        .map(str::trim)
        .any(|attr| attr.eq_ignore_ascii_case("Max-Age=0"))
}

#[cfg(test)]
mod tests {
    use super::CookieJar;
    use axum::http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    };

    fn jar_from(value: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn parses_multiple_pairs() {
        let jar = jar_from("soglia_session=abc; soglia_refresh=def");
        assert_eq!(jar.get("soglia_session"), Some("abc"));
        assert_eq!(jar.get("soglia_refresh"), Some("def"));
        assert_eq!(jar.get("missing"), None);
    }

    #[test]
    fn empty_headers_yield_empty_jar() {
        let jar = CookieJar::from_headers(&HeaderMap::new());
        assert!(!jar.refreshed());
        assert_eq!(jar.cookie_header(), None);
    }

    #[test]
    fn set_cookie_updates_forwarded_header() {
        let mut jar = jar_from("soglia_session=old");
        jar.apply_set_cookie("soglia_session=new; Path=/; HttpOnly");
        assert_eq!(jar.get("soglia_session"), Some("new"));
        assert_eq!(jar.cookie_header().as_deref(), Some("soglia_session=new"));
        assert!(jar.refreshed());
    }

    #[test]
    fn clearing_cookie_removes_value_but_stays_pending() {
        let mut jar = jar_from("soglia_session=old");
        jar.apply_set_cookie("soglia_session=; Path=/; Max-Age=0");
        assert_eq!(jar.get("soglia_session"), None);
        assert_eq!(jar.pending_cookies().len(), 1);
    }

    #[test]
    fn write_to_appends_all_pending() {
        let mut jar = jar_from("soglia_session=old");
        jar.apply_set_cookie("soglia_session=new; Path=/");
        jar.apply_set_cookie("soglia_refresh=next; Path=/");
        let mut headers = HeaderMap::new();
        jar.write_to(&mut headers);
        let values: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
    }
}
