//! Authentication: signed bearer tokens resolved to a user identity.
//!
//! A token is minted offline (`codecollab issue-token`) and carried either as
//! `?token=` on the WebSocket connect URL or as an `Authorization: Bearer`
//! header on HTTP routes. Verification is purely cryptographic plus one user
//! lookup; there is no session state to invalidate.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codecollab_auth::{AccessToken, PublicKey, TokenError};

use crate::models::{Identity, UserId};
use crate::repository::CollabRepository;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("token refers to unknown user {0}")]
    UnknownUser(UserId),
    #[error("storage error during authentication")]
    Storage(#[source] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidToken(_) | AuthError::UnknownUser(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Verifies access tokens and resolves them to a live user row.
pub struct IdentityResolver {
    verifying_key: PublicKey,
    repository: CollabRepository,
}

impl IdentityResolver {
    pub fn new(verifying_key: PublicKey, repository: CollabRepository) -> Self {
        Self {
            verifying_key,
            repository,
        }
    }

    /// Check signature and expiry, then resolve the embedded user id.
    ///
    /// A token signed by our key but pointing at a deleted user is rejected
    /// the same way a forged one is: the caller gets no identity.
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let token = AccessToken::decode_and_verify(token, &self.verifying_key, now)?;
        let user_id = UserId(token.user_id);

        let user = self
            .repository
            .get_user(user_id)
            .await
            .map_err(AuthError::Storage)?
            .ok_or(AuthError::UnknownUser(user_id))?;

        Ok(Identity {
            user_id: user.id,
            username: user.username,
        })
    }
}

/// Authenticated user for HTTP routes, extracted from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl axum::extract::FromRequestParts<crate::AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthError::InvalidToken(TokenError::Malformed(
                "missing bearer token".to_string(),
            )))?
            .to_string();

        let identity = state.resolver.verify(&token).await?;
        Ok(AuthUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_helpers;
    use codecollab_auth::SigningKey;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes([9u8; 32])
    }

    async fn resolver_with_user() -> (IdentityResolver, UserId) {
        let repo = test_helpers::test_repository().await;
        let user = repo.create_user("alice", "alice@example.com").await.unwrap();
        let resolver = IdentityResolver::new(signing_key().public_key(), repo);
        (resolver, user.id)
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let (resolver, user_id) = resolver_with_user().await;
        let token = AccessToken::issue(&signing_key(), user_id.0, now(), 3600).encode();

        let identity = resolver.verify(&token).await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn wrong_key_rejected() {
        let (resolver, user_id) = resolver_with_user().await;
        let other = SigningKey::from_bytes([200u8; 32]);
        let token = AccessToken::issue(&other, user_id.0, now(), 3600).encode();

        let err = resolver.verify(&token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidToken(TokenError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn unknown_user_rejected() {
        let (resolver, _) = resolver_with_user().await;
        let token = AccessToken::issue(&signing_key(), 9999, now(), 3600).encode();

        let err = resolver.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser(UserId(9999))));
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let (resolver, _) = resolver_with_user().await;

        let err = resolver.verify("not-a-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
