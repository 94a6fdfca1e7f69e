//! Signing keys and bearer access tokens for CodeCollab.
//!
//! The server holds an Ed25519 signing key; clients present compact signed
//! tokens as connection credentials. This crate knows nothing about users or
//! rooms — it only answers "is this token authentic and unexpired, and which
//! user id does it name?".

pub mod encoding;
pub mod error;
pub mod keys;
pub mod token;

pub use error::TokenError;
pub use keys::{PublicKey, Signature, SigningKey};
pub use token::AccessToken;
