//! Per-field crypto capability.
//!
//! [`FieldCipher`] is everything the interceptor needs from cryptography:
//! decrypt a stored value, seal a plaintext together with its blind-index
//! tokens, and compute a single token for queries. [`CipherBackend`] builds
//! one capability per `(storage, field)`; the bundled [`CipherEngine`]
//! implements both on ChaCha20-Poly1305 and HMAC-SHA256 with keys derived
//! from a [`KeyProvider`].

use crate::blind_index::BlindIndex;
use crate::context::FieldContext;
use crate::error::Error;
use crate::header::{SealedValue, NONCE_SIZE};
use crate::kdf::{derive_blind_index_key, derive_encryption_key};
use crate::key_provider::KeyProvider;
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};
use secrecy::{ExposeSecret, SecretVec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Output of [`FieldCipher::prepare_for_storage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageValue {
    /// Ciphertext in its stored text form.
    pub ciphertext: String,
    /// Blind-index tokens keyed by index name.
    pub blind_indexes: BTreeMap<String, String>,
}

/// Crypto operations bound to one encrypted field.
pub trait FieldCipher: Send + Sync {
    /// Decrypts a stored value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed, was written for another
    /// field or key, or was tampered with.
    fn decrypt_value(&self, ciphertext: &str) -> Result<String, Error>;

    /// Encrypts `plaintext` and derives every declared blind index.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or token derivation fails.
    fn prepare_for_storage(&self, plaintext: &str) -> Result<StorageValue, Error>;

    /// Computes one blind-index token, e.g. for a `WHERE` clause.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownIndex` if `index_name` was never declared.
    fn blind_index(&self, plaintext: &str, index_name: &str) -> Result<String, Error>;
}

/// Factory for per-field capabilities.
pub trait CipherBackend: Send + Sync {
    /// Capability type produced for each field.
    type Field: FieldCipher + 'static;

    /// Builds the capability of `field_name` stored in `storage_name`.
    ///
    /// # Errors
    ///
    /// Construction-time failures such as unavailable or invalid key material.
    fn encrypted_field(
        &self,
        storage_name: &str,
        field_name: &str,
        blind_indexes: Vec<BlindIndex>,
    ) -> Result<Self::Field, Error>;
}

/// Bundled backend: keys come from a [`KeyProvider`], optionally scoped to a tenant.
///
/// # Example
///
/// ```
/// use fieldcipher::field::{CipherBackend, CipherEngine, FieldCipher};
/// use fieldcipher::key_provider::StaticKeyProvider;
///
/// let engine = CipherEngine::new(StaticKeyProvider::new(vec![7u8; 32]));
/// let field = engine.encrypted_field("messages", "text", Vec::new())?;
///
/// let stored = field.prepare_for_storage("This is a secret message.")?;
/// assert_eq!(field.decrypt_value(&stored.ciphertext)?, "This is a secret message.");
/// # Ok::<(), fieldcipher::error::Error>(())
/// ```
pub struct CipherEngine<P: KeyProvider> {
    provider: Arc<P>,
    tenant_id: Option<String>,
}

impl<P: KeyProvider> CipherEngine<P> {
    /// Creates an engine over `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider), tenant_id: None }
    }

    /// Scopes every derived key to `tenant_id`.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

impl<P: KeyProvider> Clone for CipherEngine<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider), tenant_id: self.tenant_id.clone() }
    }
}

impl<P: KeyProvider> CipherBackend for CipherEngine<P> {
    type Field = EncryptedField;

    fn encrypted_field(
        &self,
        storage_name: &str,
        field_name: &str,
        blind_indexes: Vec<BlindIndex>,
    ) -> Result<EncryptedField, Error> {
        let mut context = FieldContext::new(storage_name, field_name);
        if let Some(tenant_id) = &self.tenant_id {
            context = context.with_tenant(tenant_id.clone());
        }
        let root = self.provider.root_key()?;
        EncryptedField::new(&root, context, blind_indexes)
    }
}

struct KeyedIndex {
    index: BlindIndex,
    key: SecretVec<u8>,
}

/// ChaCha20-Poly1305 encryption plus HMAC blind indexes for one field.
pub struct EncryptedField {
    context: FieldContext,
    key: SecretVec<u8>,
    indexes: Vec<KeyedIndex>,
}

impl EncryptedField {
    /// Derives the field key and one key per blind index from `root`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKeyLength` if `root` is not 32 bytes
    /// - `Error::DuplicateBlindIndexName` if two indexes share a name
    pub fn new(
        root: &SecretVec<u8>,
        context: FieldContext,
        blind_indexes: Vec<BlindIndex>,
    ) -> Result<Self, Error> {
        let key = derive_encryption_key(root, &context)?;

        let mut indexes: Vec<KeyedIndex> = Vec::with_capacity(blind_indexes.len());
        for index in blind_indexes {
            if indexes.iter().any(|k| k.index.name() == index.name()) {
                return Err(Error::DuplicateBlindIndexName {
                    field: context.field_name().to_string(),
                    index: index.name().to_string(),
                });
            }
            let key = derive_blind_index_key(root, &context.index(index.name()))?;
            indexes.push(KeyedIndex { index, key });
        }

        Ok(Self { context, key, indexes })
    }

    /// Returns the field context.
    #[must_use]
    pub const fn context(&self) -> &FieldContext {
        &self.context
    }

    /// Returns the declared blind indexes in declaration order.
    pub fn blind_indexes(&self) -> impl Iterator<Item = &BlindIndex> {
        self.indexes.iter().map(|k| &k.index)
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, Error> {
        ChaCha20Poly1305::new_from_slice(self.key.expose_secret())
            .map_err(|e| Error::EncryptionFailed(format!("Invalid field key: {e}")))
    }
}

impl FieldCipher for EncryptedField {
    fn decrypt_value(&self, ciphertext: &str) -> Result<String, Error> {
        let sealed = SealedValue::decode(ciphertext)?;
        let nonce = Nonce::from(*sealed.nonce());

        // Context as associated data: a value copied into another field fails here
        let aad = self.context.to_string();

        let plaintext = Zeroizing::new(
            self.cipher()?
                .decrypt(&nonce, Payload { msg: sealed.body(), aad: aad.as_bytes() })
                .map_err(|_| Error::AuthenticationFailed)?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| Error::DecryptionFailed(format!("plaintext is not UTF-8: {e}")))
    }

    fn prepare_for_storage(&self, plaintext: &str) -> Result<StorageValue, Error> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let aad = self.context.to_string();

        let body = self
            .cipher()?
            .encrypt(&nonce, Payload { msg: plaintext.as_bytes(), aad: aad.as_bytes() })
            .map_err(|e| {
                Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}"))
            })?;

        let blind_indexes = self
            .indexes
            .iter()
            .map(|k| Ok((k.index.name().to_string(), k.index.token(&k.key, plaintext)?)))
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        Ok(StorageValue { ciphertext: SealedValue::new(nonce_bytes, body).encode(), blind_indexes })
    }

    fn blind_index(&self, plaintext: &str, index_name: &str) -> Result<String, Error> {
        let keyed = self
            .indexes
            .iter()
            .find(|k| k.index.name() == index_name)
            .ok_or_else(|| Error::UnknownIndex(index_name.to_string()))?;
        keyed.index.token(&keyed.key, plaintext)
    }
}

impl fmt::Debug for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedField")
            .field("context", &self.context)
            .field("blind_indexes", &self.blind_indexes().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
