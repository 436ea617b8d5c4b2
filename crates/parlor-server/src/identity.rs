//! Identity of the person behind a connection.
//!
//! The login flow stores the user's profile in the `auth` cookie as
//! base64-encoded JSON. The room only reads it back; it does not decide who
//! may log in.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the cookie carrying the identity.
pub const AUTH_COOKIE: &str = "auth";

/// Identity errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No `auth` cookie on the request.
    #[error("Missing {AUTH_COOKIE} cookie")]
    MissingCookie,

    /// Cookie value is not valid base64.
    #[error("Invalid cookie encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Cookie payload is not an identity object.
    #[error("Invalid identity: {0}")]
    Payload(#[from] serde_json::Error),
}

/// User data stored in the auth cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name.
    pub name: String,
    /// Avatar URL supplied by the login provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stable user id (the Gravatar hash of the email).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
}

impl Identity {
    /// Decode an identity from a cookie value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not base64-encoded identity JSON.
    pub fn decode(value: &str) -> Result<Self, IdentityError> {
        let bytes = STANDARD.decode(value.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Encode this identity as a cookie value.
    #[cfg(test)]
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Read the identity from a request's cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie is missing or malformed.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, IdentityError> {
        let value = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(|h| cookie_value(h, AUTH_COOKIE))
            .ok_or(IdentityError::MissingCookie)?;

        Self::decode(value)
    }
}

/// Find a cookie by name in a `Cookie` header.
fn cookie_value<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == cookie_name).then_some(value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn alice() -> Identity {
        Identity {
            name: "alice".into(),
            avatar_url: Some("https://example.com/alice.png".into()),
            email: None,
            userid: Some("0bc83cb571cd1c50ba6f3e8a78ef1346".into()),
        }
    }

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; auth=abc==; lang=en";
        assert_eq!(cookie_value(header, "auth"), Some("abc=="));
        assert_eq!(cookie_value(header, "lang"), Some("en"));
        assert_eq!(cookie_value(header, "missing"), None);
    }

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; auth={}", alice().encode());
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());

        assert_eq!(Identity::from_headers(&headers).unwrap(), alice());
    }

    #[test]
    fn test_missing_cookie() {
        let headers = HeaderMap::new();
        assert!(matches!(
            Identity::from_headers(&headers),
            Err(IdentityError::MissingCookie)
        ));
    }

    #[test]
    fn test_invalid_cookie() {
        assert!(matches!(
            Identity::decode("%%%not-base64%%%"),
            Err(IdentityError::Encoding(_))
        ));

        let not_json = STANDARD.encode("hello");
        assert!(matches!(
            Identity::decode(&not_json),
            Err(IdentityError::Payload(_))
        ));
    }

    #[test]
    fn test_optional_fields_default() {
        let value = STANDARD.encode(r#"{"name":"bob"}"#);
        let identity = Identity::decode(&value).unwrap();
        assert_eq!(identity.name, "bob");
        assert!(identity.avatar_url.is_none());
        assert!(identity.userid.is_none());
    }
}
