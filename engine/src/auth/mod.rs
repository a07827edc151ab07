//! Authentication and authorization
//!
//! Outbound calls to skills carry a bearer token minted by the
//! [`CredentialProvider`]. Inbound calls on the skill channel service are
//! checked by the [`ClaimsValidator`] against the caller allow-list.
//!
//! Tokens are HS256 JWTs signed with the bot's app password, so the root and
//! its skills must share that secret. When no app id is configured, auth is
//! disabled in both directions (local development with the emulator).

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sdk::errors::HostError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Issuer stamped on minted tokens
pub const TOKEN_ISSUER: &str = "rootbot";

/// Allow-list entry that accepts any caller
pub const ANY_CALLER: &str = "*";

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Calling application id
    pub appid: String,
    /// Intended recipient application id
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub ver: String,
}

/// Mints outbound bearer tokens
pub struct CredentialProvider {
    app_id: String,
    encoding_key: EncodingKey,
    ttl_secs: u64,
}

impl CredentialProvider {
    pub fn new(app_id: impl Into<String>, app_password: &str, ttl_secs: u64) -> Self {
        Self {
            app_id: app_id.into(),
            encoding_key: EncodingKey::from_secret(app_password.as_bytes()),
            ttl_secs,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn is_enabled(&self) -> bool {
        !self.app_id.is_empty()
    }

    /// Token for calling the application `audience`
    ///
    /// Returns `None` when auth is disabled.
    pub fn token_for(&self, audience: &str) -> Result<Option<String>, HostError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            appid: self.app_id.clone(),
            aud: audience.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            exp: now + self.ttl_secs as i64,
            ver: "1.0".to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map(Some)
            .map_err(|e| HostError::Auth(format!("Token generation failed: {}", e)))
    }
}

/// Validates inbound bearer tokens
pub struct ClaimsValidator {
    app_id: String,
    decoding_key: DecodingKey,
    allowed_callers: HashSet<String>,
}

impl ClaimsValidator {
    pub fn new<I, S>(app_id: impl Into<String>, app_password: &str, allowed_callers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            app_id: app_id.into(),
            decoding_key: DecodingKey::from_secret(app_password.as_bytes()),
            allowed_callers: allowed_callers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.app_id.is_empty()
    }

    /// Check the `Authorization` header of a channel request
    ///
    /// Verifies signature, expiry and audience. Returns `None` when auth is
    /// disabled.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Option<Claims>, HostError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let token = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HostError::Auth("Missing bearer token".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.app_id.as_str()]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| Some(data.claims))
            .map_err(|e| HostError::Auth(format!("Token verification failed: {}", e)))
    }

    /// Check the `Authorization` header of a skill callback
    ///
    /// In addition to [`authenticate`](Self::authenticate), the caller's app
    /// id must be on the allow-list.
    pub fn authorize_skill(&self, authorization: Option<&str>) -> Result<Option<Claims>, HostError> {
        let claims = self.authenticate(authorization)?;

        if let Some(claims) = &claims {
            if !self.is_allowed(&claims.appid) {
                return Err(HostError::Auth(format!(
                    "Caller '{}' is not in the list of allowed callers",
                    claims.appid
                )));
            }
        }

        Ok(claims)
    }

    fn is_allowed(&self, caller: &str) -> bool {
        self.allowed_callers.contains(ANY_CALLER) || self.allowed_callers.contains(caller)
    }
}
