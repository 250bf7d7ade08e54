//! Key provider abstraction for root key material.

use crate::error::KeyProviderError;
use secrecy::{ExposeSecret, SecretVec};
use zeroize::Zeroizing;

/// Supplies the root key every field and index key is derived from.
///
/// Implementations must be thread-safe (`Send + Sync`) since one provider
/// backs every interceptor thread.
///
/// # Example
///
/// ```rust,ignore
/// use fieldcipher::key_provider::KeyProvider;
///
/// struct VaultAgentProvider;
///
/// impl KeyProvider for VaultAgentProvider {
///     fn root_key(&self) -> Result<SecretVec<u8>, KeyProviderError> {
///         // Fetch from the secret store
///     }
/// }
/// ```
pub trait KeyProvider: Send + Sync {
    /// Returns the root key (32 bytes).
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::KeyUnavailable` if the key cannot be obtained.
    fn root_key(&self) -> Result<SecretVec<u8>, KeyProviderError>;
}

/// Key provider holding a fixed root key in memory.
///
/// The key length is not checked here; a wrong length surfaces as
/// `Error::InvalidKeyLength` when a field capability is first built.
pub struct StaticKeyProvider {
    key: SecretVec<u8>,
}

impl StaticKeyProvider {
    /// Creates a provider from raw key bytes.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self { key: SecretVec::new(key) }
    }

    /// Creates a provider from a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::InvalidKeyMaterial` if `encoded` is not valid hex.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyProviderError> {
        let key = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| KeyProviderError::InvalidKeyMaterial(e.to_string()))?,
        );
        Ok(Self::new(key.to_vec()))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn root_key(&self) -> Result<SecretVec<u8>, KeyProviderError> {
        Ok(SecretVec::new(self.key.expose_secret().clone()))
    }
}
