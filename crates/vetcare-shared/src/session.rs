//! Signed session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(ed25519_signature)`.
//! The signature covers the encoded claims segment, so any change to the
//! claims invalidates it. Tokens carry only the user id and validity
//! window; role and active flag are read from the store on every request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SESSION_TTL_HOURS, SECRET_KEY_SIZE};
use crate::error::SessionError;
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub iat: DateTime<Utc>,
    pub exp: DateTime<Utc>,
}

/// Issues and verifies session tokens with one Ed25519 key.
#[derive(Clone)]
pub struct SessionSigner {
    signing_key: SigningKey,
    ttl: Duration,
}

impl SessionSigner {
    /// Random key; tokens do not survive a restart.
    pub fn generate(ttl: Duration) -> Self {
        Self::with_key(SigningKey::generate(&mut OsRng), ttl)
    }

    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_SIZE], ttl: Duration) -> Self {
        Self::with_key(SigningKey::from_bytes(secret), ttl)
    }

    /// Lifetimes are capped at [`MAX_SESSION_TTL_HOURS`].
    fn with_key(signing_key: SigningKey, ttl: Duration) -> Self {
        Self {
            signing_key,
            ttl: ttl.min(Duration::hours(MAX_SESSION_TTL_HOURS)),
        }
    }

    /// Parse a 64-char hex secret key.
    pub fn from_hex(hex_key: &str, ttl: Duration) -> Result<Self, SessionError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| SessionError::InvalidKey)?;
        let secret: [u8; SECRET_KEY_SIZE] =
            bytes.try_into().map_err(|_| SessionError::InvalidKey)?;
        Ok(Self::from_secret_bytes(&secret, ttl))
    }

    pub fn issue(&self, user: UserId) -> String {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: UserId, now: DateTime<Utc>) -> String {
        let claims = SessionClaims {
            sub: user,
            iat: now,
            exp: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        // Serializing a struct of ids and timestamps cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.signing_key.sign(encoded.as_bytes());
        format!("{}.{}", encoded, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let (encoded, sig_b64) = token.split_once('.').ok_or(SessionError::Malformed)?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| SessionError::Malformed)?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|_| SessionError::Malformed)?;

        self.signing_key
            .verifying_key()
            .verify(encoded.as_bytes(), &signature)
            .map_err(|_| SessionError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;

        if now >= claims.exp {
            return Err(SessionError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::generate(Duration::hours(1))
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let user = UserId::new();
        let token = signer.issue(user);

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.exp - claims.iat, Duration::hours(1));
    }

    #[test]
    fn test_ttl_is_capped() {
        let signer = SessionSigner::generate(Duration::days(365 * 1_000_000));
        let token = signer.issue(UserId::new());

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, Duration::hours(MAX_SESSION_TTL_HOURS));
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let issued = Utc::now() - Duration::hours(2);
        let token = signer.issue_at(UserId::new(), issued);
        assert_eq!(signer.verify(&token), Err(SessionError::Expired));
    }

    #[test]
    fn test_wrong_key() {
        let token = signer().issue(UserId::new());
        assert_eq!(signer().verify(&token), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_tampered_claims() {
        let signer = signer();
        let token = signer.issue(UserId::new());
        let (_, sig) = token.split_once('.').unwrap();

        let forged = SessionClaims {
            sub: UserId::new(),
            iat: Utc::now(),
            exp: Utc::now() + Duration::days(365),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{forged_payload}.{sig}");

        assert_eq!(signer.verify(&forged_token), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = signer();
        assert_eq!(signer.verify("not-a-token"), Err(SessionError::Malformed));
        assert_eq!(signer.verify("abc.!!!"), Err(SessionError::Malformed));
    }

    #[test]
    fn test_from_hex_is_deterministic() {
        let hex_key = "ab".repeat(32);
        let a = SessionSigner::from_hex(&hex_key, Duration::hours(1)).unwrap();
        let b = SessionSigner::from_hex(&hex_key, Duration::hours(1)).unwrap();
        let token = a.issue(UserId::new());
        assert!(b.verify(&token).is_ok());

        assert!(SessionSigner::from_hex("abcd", Duration::hours(1)).is_err());
    }
}
