//! Shared encoding helpers: URL-safe base64 (unpadded).
//!
//! Tokens travel in query strings, so the alphabet must be URL-safe.

/// URL-safe base64, unpadded.
pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    data_encoding::BASE64URL_NOPAD.encode(bytes)
}

/// Decode URL-safe base64, unpadded.
pub(crate) fn base64_decode(s: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    data_encoding::BASE64URL_NOPAD.decode(s.as_bytes())
}
