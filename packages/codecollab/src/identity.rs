//! Server token key: a persistent ed25519 keypair used to sign and verify
//! the bearer access tokens that admit WebSocket connections.

use std::path::Path;

use anyhow::{Context, Result};
use codecollab_auth::{PublicKey, SigningKey};
use tracing::info;

/// Persistent token-signing identity backed by a single ed25519 keypair.
///
/// `codecollab issue-token` signs with it; the WebSocket admission path
/// verifies against its public half.
#[derive(Debug)]
pub struct TokenKey {
    signing_key: SigningKey,
    pub public_key: PublicKey,
}

const KEY_LEN: usize = 32;

impl TokenKey {
    /// Load from `path`, or generate and save a new keypair.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read token key: {}", path.display()))?;
            let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
                anyhow::anyhow!("token key must be {} bytes, got {}", KEY_LEN, v.len())
            })?;
            let signing_key = SigningKey::from_bytes(arr);
            let public_key = signing_key.public_key();
            Ok(Self {
                signing_key,
                public_key,
            })
        } else {
            let key = Self::generate();
            key.save(path)?;
            info!("Generated new token key: {}", key.public_key);
            Ok(key)
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Generate a fresh key (not persisted until `save` is called).
    pub(crate) fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rng());
        let public_key = signing_key.public_key();
        Self {
            signing_key,
            public_key,
        }
    }

    /// Write the 32-byte key seed to disk with mode 0600.
    fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.signing_key.to_bytes();
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write token key: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.key");

        let first = TokenKey::load_or_generate(&path).unwrap();
        assert!(path.exists());

        let second = TokenKey::load_or_generate(&path).unwrap();
        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn rejects_corrupt_key_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.key");
        std::fs::write(&path, b"short").unwrap();

        let err = TokenKey::load_or_generate(&path).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.key");
        TokenKey::load_or_generate(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
