//! Token error types.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported token version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired at {expired_at}")]
    Expired { expired_at: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            TokenError::Malformed("too short".into()).to_string(),
            "malformed token: too short"
        );
        assert_eq!(
            TokenError::Expired { expired_at: 1700 }.to_string(),
            "token expired at 1700"
        );
    }
}
