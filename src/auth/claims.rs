// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-token claims.
//!
//! The hosted identity service signs and verifies its own tokens; the
//! client only reads them. Claims are decoded without signature
//! verification to recover the principal and expiry when a redirect hands
//! over bare tokens.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::identity::{DisplayMetadata, IdentityError, Principal};
use crate::models::IdentityId;

/// Claims carried by an access token issued by the identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject - the canonical principal id
    pub sub: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    /// Session id assigned by the service
    #[serde(default)]
    pub session_id: Option<String>,

    /// Display metadata supplied at sign-up or by the OAuth provider
    #[serde(default)]
    pub user_metadata: DisplayMetadata,
}

impl AccessTokenClaims {
    /// Decode claims without verifying the signature.
    pub fn decode_unverified(token: &str) -> Result<Self, IdentityError> {
        let token_data = jsonwebtoken::dangerous::insecure_decode::<AccessTokenClaims>(token)
            .map_err(|e| IdentityError::InvalidResponse(format!("malformed access token: {e}")))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(IdentityError::InvalidResponse(
                "access token has no subject".to_string(),
            ));
        }

        Ok(token_data.claims)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: IdentityId::from(self.sub.clone()),
            email: self.email.clone(),
            metadata: self.user_metadata.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Unsigned token with the given claims, for tests.
    pub(crate) fn token_with(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signature = URL_SAFE_NO_PAD.encode("not-a-real-signature");
        format!("{header}.{payload}.{signature}")
    }

    #[test]
    fn decodes_subject_email_and_expiry() {
        let token = token_with(serde_json::json!({
            "sub": "3f4d6542-b8ce-4226-93d3-80d6f14d6db2",
            "exp": 1700003600,
            "email": "a@b.com",
            "user_metadata": { "full_name": "Asha", "avatar_url": "pic-1" }
        }));

        let claims = AccessTokenClaims::decode_unverified(&token).unwrap();
        let principal = claims.principal();

        assert_eq!(principal.id.as_str(), "3f4d6542-b8ce-4226-93d3-80d6f14d6db2");
        assert_eq!(principal.email.as_deref(), Some("a@b.com"));
        assert_eq!(principal.metadata.full_name.as_deref(), Some("Asha"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1700003600);
    }

    #[test]
    fn missing_optional_claims_default() {
        let token = token_with(serde_json::json!({ "sub": "user-1" }));
        let claims = AccessTokenClaims::decode_unverified(&token).unwrap();
        assert!(claims.expires_at().is_none());
        assert_eq!(claims.user_metadata, DisplayMetadata::default());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = AccessTokenClaims::decode_unverified("not-a-token").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidResponse(_)));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let token = token_with(serde_json::json!({ "sub": "" }));
        assert!(AccessTokenClaims::decode_unverified(&token).is_err());
    }
}
