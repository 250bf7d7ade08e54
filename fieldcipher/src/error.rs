//! Error types for `fieldcipher` operations.

use std::fmt;

/// Main error type for `fieldcipher` operations.
///
/// Variants fall into two groups, see [`Error::is_configuration`] and
/// [`Error::is_crypto`]. Both are fatal for the lifecycle event that raised
/// them and are never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A blind index references a transformer that was never registered
    #[error("unknown transformer: {0}")]
    UnknownTransformer(String),

    /// A transformer name is already bound in the registry
    #[error("transformer already registered: {0}")]
    DuplicateTransformer(String),

    /// A transformer registration does not satisfy the transformation contract
    #[error("invalid transformer: {0}")]
    InvalidTransformer(String),

    /// Two blind indexes on the same field share a name
    #[error("duplicate blind index name {index:?} on field {field:?}")]
    DuplicateBlindIndexName {
        /// Field carrying the declarations
        field: String,
        /// The colliding index name
        index: String,
    },

    /// A blind index declaration is malformed (empty name, bit length out of range)
    #[error("invalid blind index {index:?}: {reason}")]
    InvalidBlindIndex {
        /// Index name as declared
        index: String,
        /// What is wrong with it
        reason: String,
    },

    /// One field of an entity was declared twice with different settings
    #[error("field {field:?} of {entity} has conflicting encryption declarations")]
    ConflictingDeclaration {
        /// Entity type name
        entity: &'static str,
        /// Field declared more than once
        field: String,
    },

    /// A blind index was requested by a name the field never declared
    #[error("unknown blind index: {0}")]
    UnknownIndex(String),

    /// A field was requested that carries no encryption declaration
    #[error("field {field:?} of {entity} is not declared as encrypted")]
    UnknownField {
        /// Entity type name
        entity: &'static str,
        /// Requested field
        field: String,
    },

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption operation failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// Stored ciphertext could not be parsed
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Unsupported ciphertext version
    #[error("unsupported version: {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The version found in the ciphertext
        version: String,
        /// Supported versions
        supported: String,
    },

    /// Key material has the wrong length
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes
        expected: usize,
        /// Length supplied by the provider
        actual: usize,
    },

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivation,

    /// Blind index generation failed
    #[error("blind index generation failed: {0}")]
    IndexGenerationFailed(String),

    /// Key provider operation failed
    #[error("key provider error: {0}")]
    KeyProvider(#[from] KeyProviderError),
}

impl Error {
    /// Returns `true` for deployment or programming defects: unknown or
    /// duplicate transformers, malformed blind-index declarations, requests
    /// for undeclared fields or indexes.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownTransformer(_)
                | Self::DuplicateTransformer(_)
                | Self::InvalidTransformer(_)
                | Self::DuplicateBlindIndexName { .. }
                | Self::InvalidBlindIndex { .. }
                | Self::ConflictingDeclaration { .. }
                | Self::UnknownIndex(_)
                | Self::UnknownField { .. }
        )
    }

    /// Returns `true` for failures of the cryptographic operation itself,
    /// including key material problems.
    #[must_use]
    pub const fn is_crypto(&self) -> bool {
        !self.is_configuration()
    }
}

/// Errors specific to key provider operations.
#[derive(Debug)]
pub enum KeyProviderError {
    /// Root key is not available
    KeyUnavailable(String),

    /// Supplied key material could not be decoded
    InvalidKeyMaterial(String),
}

impl fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyUnavailable(msg) => write!(f, "root key not available: {msg}"),
            Self::InvalidKeyMaterial(msg) => write!(f, "invalid key material: {msg}"),
        }
    }
}

impl std::error::Error for KeyProviderError {}
