//! Stateless password-reset tokens.
//!
//! A token is `base64url(claims) "." base64url(signature)` where the claims are
//! `{"sub": <user id>, "exp": <unix seconds>}` and the signature is Ed25519 over
//! the encoded claims. The signing key is derived from the process-wide secret,
//! so nothing about issued tokens is persisted.

use argon2::Argon2;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const KEY_DERIVATION_SALT: &[u8] = b"chirp.reset-password.v1";

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    exp: i64,
}

pub struct ResetTokenSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl_secs: i64,
}

impl ResetTokenSigner {
    pub fn from_secret(secret: &str, ttl_secs: i64) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Config("SECRET_KEY must not be empty".to_string()));
        }

        let mut seed = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), KEY_DERIVATION_SALT, &mut seed)
            .map_err(|e| AppError::Crypto(format!("Key derivation failed: {}", e)))?;

        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for `user_id` that expires `ttl_secs` from now.
    pub fn issue(&self, user_id: &str) -> Result<String, AppError> {
        self.issue_at(user_id, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, user_id: &str, now: i64) -> Result<String, AppError> {
        let claims = ResetClaims {
            sub: user_id.to_string(),
            exp: now + self.ttl_secs,
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Internal(format!("Failed to encode token claims: {}", e)))?;
        let encoded = base64_simd::URL_SAFE_NO_PAD.encode_to_string(&payload);
        let signature = self.signing_key.sign(encoded.as_bytes());

        Ok(format!(
            "{}.{}",
            encoded,
            base64_simd::URL_SAFE_NO_PAD.encode_to_string(signature.to_bytes())
        ))
    }

    /// Returns the token's subject, or `None` for any token that is malformed,
    /// signed with another secret or expired.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<String> {
        let (encoded, signature) = token.trim().split_once('.')?;

        let signature_bytes = base64_simd::URL_SAFE_NO_PAD
            .decode_to_vec(signature)
            .ok()?;
        let signature = Signature::from_slice(&signature_bytes).ok()?;
        self.verifying_key
            .verify(encoded.as_bytes(), &signature)
            .ok()?;

        let payload = base64_simd::URL_SAFE_NO_PAD.decode_to_vec(encoded).ok()?;
        let claims: ResetClaims = serde_json::from_slice(&payload).ok()?;

        if now > claims.exp {
            return None;
        }
        Some(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> ResetTokenSigner {
        ResetTokenSigner::from_secret(secret, 600).unwrap()
    }

    #[test]
    fn test_round_trip_within_ttl() {
        let signer = signer("secret");
        let now = 1_700_000_000;
        let token = signer.issue_at("user-1", now).unwrap();

        assert_eq!(signer.verify_at(&token, now).as_deref(), Some("user-1"));
        assert_eq!(signer.verify_at(&token, now + 599).as_deref(), Some("user-1"));
        assert_eq!(signer.verify_at(&token, now + 600).as_deref(), Some("user-1"));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let signer = signer("secret");
        let now = 1_700_000_000;
        let token = signer.issue_at("user-1", now).unwrap();

        assert!(signer.verify_at(&token, now + 601).is_none());
        assert!(signer.verify_at(&token, now + 3600).is_none());
    }

    #[test]
    fn test_foreign_secret_is_invalid() {
        let token = signer("secret").issue("user-1").unwrap();
        assert!(signer("another secret").verify(&token).is_none());
    }

    #[test]
    fn test_tampered_claims_are_invalid() {
        let signer = signer("secret");
        let token = signer.issue("user-1").unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = serde_json::to_vec(&ResetClaims {
            sub: "user-2".to_string(),
            exp: i64::MAX,
        })
        .unwrap();
        let forged = format!(
            "{}.{}",
            base64_simd::URL_SAFE_NO_PAD.encode_to_string(&forged_claims),
            signature
        );
        assert!(signer.verify(&forged).is_none());
    }

    #[test]
    fn test_malformed_tokens_are_invalid() {
        let signer = signer("secret");
        for token in ["", ".", "abc", "abc.def", "a.b.c", "!!!.???"] {
            assert!(signer.verify(token).is_none(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            ResetTokenSigner::from_secret("", 600),
            Err(AppError::Config(_))
        ));
    }
}
