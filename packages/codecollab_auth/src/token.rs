//! Access token: compact signed wire format for connection credentials.
//!
//! ## V1 format (89 bytes)
//! ```text
//! [1B version=1]
//! [8B user_id]      — big-endian i64, the subject
//! [8B issued_at]    — big-endian i64, unix seconds
//! [8B expires_at]   — big-endian i64, unix seconds
//! [64B signature]   — ed25519 over all preceding bytes by the server key
//! ```
//!
//! Encoded as URL-safe unpadded base64 (89 bytes → 119 chars), so a token can
//! ride in a `?token=` query parameter at WebSocket connect time.
//!
//! The token is deliberately minimal: no capability bits, no audience. The
//! server that signs is the only server that verifies, and everything about
//! the user beyond the id is looked up from storage at admission.

use crate::encoding::{base64_decode, base64_encode};
use crate::error::TokenError;
use crate::keys::{PublicKey, Signature, SigningKey, verify};

const VERSION_V1: u8 = 1;
const SIGNED_LEN: usize = 1 + 8 + 8 + 8;
const TOKEN_LEN: usize = SIGNED_LEN + 64;

/// A signed bearer token naming a user id and a validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub user_id: i64,
    pub issued_at: i64,
    pub expires_at: i64,
    signature: [u8; 64],
}

impl AccessToken {
    /// Issue a new token for `user_id`, valid for `ttl_secs` from `now`.
    pub fn issue(signing_key: &SigningKey, user_id: i64, now: i64, ttl_secs: i64) -> Self {
        let issued_at = now;
        let expires_at = now + ttl_secs;
        let message = signable_bytes(user_id, issued_at, expires_at);
        let signature = *signing_key.sign(&message).as_bytes();
        Self {
            user_id,
            issued_at,
            expires_at,
            signature,
        }
    }

    /// Serialize to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = signable_bytes(self.user_id, self.issued_at, self.expires_at);
        buf.extend_from_slice(&self.signature);
        buf
    }

    /// Deserialize from the binary wire format. Does not verify anything.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| TokenError::Malformed("empty token".into()))?;
        if version != VERSION_V1 {
            return Err(TokenError::UnsupportedVersion(version));
        }
        if rest.len() != TOKEN_LEN - 1 {
            return Err(TokenError::Malformed(format!(
                "expected {TOKEN_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let field = |range: std::ops::Range<usize>| -> i64 {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&rest[range]);
            i64::from_be_bytes(arr)
        };
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&rest[24..88]);
        Ok(Self {
            user_id: field(0..8),
            issued_at: field(8..16),
            expires_at: field(16..24),
            signature,
        })
    }

    /// Encode as URL-safe base64.
    pub fn encode(&self) -> String {
        base64_encode(&self.to_bytes())
    }

    /// Decode from URL-safe base64. Does not verify anything.
    pub fn decode(s: &str) -> Result<Self, TokenError> {
        let bytes = base64_decode(s).map_err(|e| TokenError::Malformed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Check the signature against the server key, then the validity window.
    pub fn verify(&self, public_key: &PublicKey, now: i64) -> Result<(), TokenError> {
        let message = signable_bytes(self.user_id, self.issued_at, self.expires_at);
        verify(public_key, &message, &Signature::from_bytes(self.signature))?;
        if now >= self.expires_at {
            return Err(TokenError::Expired {
                expired_at: self.expires_at,
            });
        }
        Ok(())
    }

    /// Decode and verify in one step — the shape the server admission path uses.
    pub fn decode_and_verify(
        s: &str,
        public_key: &PublicKey,
        now: i64,
    ) -> Result<Self, TokenError> {
        let token = Self::decode(s)?;
        token.verify(public_key, now)?;
        Ok(token)
    }
}

fn signable_bytes(user_id: i64, issued_at: i64, expires_at: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGNED_LEN);
    buf.push(VERSION_V1);
    buf.extend_from_slice(&user_id.to_be_bytes());
    buf.extend_from_slice(&issued_at.to_be_bytes());
    buf.extend_from_slice(&expires_at.to_be_bytes());
    buf
}
