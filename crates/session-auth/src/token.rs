//! Renewal exchange and token response parsing
//!
//! The server has answered token requests in three shapes over time:
//!
//! 1. `{"tokens": {"access": "...", "refresh": "..."}}`
//! 2. `{"access_token": "...", "refresh_token": "..."}`
//! 3. `{"access": "...", "refresh": "..."}`
//!
//! `TokenShape::PRIORITY` tries them in that order. Each shape either yields
//! a typed `CredentialPair` or fails over to the next. When a shape carries an
//! access token but no refresh token, the refresh token that was sent is kept.

use common::Secret;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Deserialize;
use tracing::debug;
use transport::{Transport, WireBody, WireRequest};

use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// A recognised token response layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// `{"tokens": {"access", "refresh"}}`
    Nested,
    /// `{"access_token", "refresh_token"}`
    OAuth,
    /// `{"access", "refresh"}`
    Short,
}

#[derive(Deserialize)]
struct ShortPair {
    access: String,
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct NestedPair {
    tokens: ShortPair,
}

#[derive(Deserialize)]
struct OAuthPair {
    access_token: String,
    refresh_token: Option<String>,
}

impl TokenShape {
    pub const PRIORITY: [TokenShape; 3] = [TokenShape::Nested, TokenShape::OAuth, TokenShape::Short];

    /// Try to read `(access, refresh)` out of `body` using this shape.
    fn extract(self, body: &serde_json::Value) -> Option<(String, Option<String>)> {
        let pair = match self {
            TokenShape::Nested => NestedPair::deserialize(body)
                .ok()
                .map(|p| (p.tokens.access, p.tokens.refresh)),
            TokenShape::OAuth => OAuthPair::deserialize(body)
                .ok()
                .map(|p| (p.access_token, p.refresh_token)),
            TokenShape::Short => ShortPair::deserialize(body)
                .ok()
                .map(|p| (p.access, p.refresh)),
        }?;
        if pair.0.is_empty() { None } else { Some(pair) }
    }
}

/// Parse a wire-case token response into a credential pair.
///
/// `previous_refresh` fills in the refresh token when the server did not
/// rotate it. Returns `None` if no shape matches, or if no refresh token is
/// available from either source.
pub fn parse_credential_pair(
    body: &serde_json::Value,
    previous_refresh: Option<&str>,
) -> Option<(TokenShape, CredentialPair)> {
    TokenShape::PRIORITY.iter().find_map(|shape| {
        let (access, refresh) = shape.extract(body)?;
        let refresh = refresh
            .filter(|r| !r.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))?;
        Some((*shape, CredentialPair::new(access, refresh)))
    })
}

/// Trade a refresh token for a new credential pair.
///
/// Sends exactly one `POST {refresh_path}` with `{"refresh": <token>}` and no
/// bearer credential. A 401/403 means the refresh token is revoked or expired.
pub async fn refresh_tokens(
    transport: &dyn Transport,
    refresh_path: &str,
    refresh: &Secret<String>,
) -> Result<CredentialPair> {
    let mut request = WireRequest::new(Method::POST, refresh_path);
    request
        .headers
        .insert(ACCEPT, HeaderValue::from_static("application/json"));
    request.body = WireBody::Json(serde_json::json!({ "refresh": refresh.expose_str() }));

    let response = transport
        .send(request)
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    if !response.is_success() {
        let body = String::from_utf8_lossy(&response.body);
        if response.status == 401 || response.status == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({}): {body}",
                response.status
            )));
        }
        return Err(Error::TokenExchange(format!(
            "token refresh returned {}: {body}",
            response.status
        )));
    }

    let body: serde_json::Value = serde_json::from_slice(&response.body)
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

    let (shape, pair) = parse_credential_pair(&body, Some(refresh.expose_str()))
        .ok_or_else(|| Error::TokenExchange("refresh response carried no access token".into()))?;
    debug!(?shape, "parsed refresh response");
    Ok(pair)
}
