//! Static encryption declarations attached to entity types.
//!
//! Declarations are `'static` data built with `const fn`s, normally emitted
//! by `#[derive(Encrypted)]`:
//!
//! ```
//! use fieldcipher::declaration::{BlindIndexSpec, EncryptedFieldDeclaration};
//!
//! const SSN_INDEXES: &[BlindIndexSpec] = &[
//!     BlindIndexSpec::new("last_four").with_transformer("last-four-digits").with_bits(16),
//!     BlindIndexSpec::new("full").with_transformer("digits-only").with_fast(true),
//! ];
//! const SSN: EncryptedFieldDeclaration =
//!     EncryptedFieldDeclaration::new("users", "ssn").with_blind_indexes(SSN_INDEXES);
//!
//! assert_eq!(SSN.blind_indexes()[0].bits(), 16);
//! ```

use crate::blind_index::DEFAULT_BITS;

/// Declaration of one blind index on an encrypted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlindIndexSpec {
    name: &'static str,
    transformer: Option<&'static str>,
    bits: u32,
    fast: bool,
}

impl BlindIndexSpec {
    /// Declares an index with the identity transform, 256 bits, slow mode.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, transformer: None, bits: DEFAULT_BITS, fast: false }
    }

    /// Normalizes plaintext with the registered transformer `name` first.
    #[must_use]
    pub const fn with_transformer(mut self, name: &'static str) -> Self {
        self.transformer = Some(name);
        self
    }

    /// Sets the token length in bits.
    #[must_use]
    pub const fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Selects fast (single HMAC) or slow (stretched) derivation.
    #[must_use]
    pub const fn with_fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Returns the index name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the transformer name, if any.
    #[must_use]
    pub const fn transformer(&self) -> Option<&'static str> {
        self.transformer
    }

    /// Returns the token length in bits.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns `true` for fast derivation.
    #[must_use]
    pub const fn is_fast(&self) -> bool {
        self.fast
    }
}

/// Declaration of one encrypted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptedFieldDeclaration {
    storage_name: &'static str,
    field_name: &'static str,
    blind_indexes: &'static [BlindIndexSpec],
}

impl EncryptedFieldDeclaration {
    /// Declares `field_name`, stored in `storage_name`, with no blind indexes.
    #[must_use]
    pub const fn new(storage_name: &'static str, field_name: &'static str) -> Self {
        Self { storage_name, field_name, blind_indexes: &[] }
    }

    /// Attaches blind-index declarations, in derivation order.
    #[must_use]
    pub const fn with_blind_indexes(mut self, blind_indexes: &'static [BlindIndexSpec]) -> Self {
        self.blind_indexes = blind_indexes;
        self
    }

    /// Returns the storage (table) name.
    #[must_use]
    pub const fn storage_name(&self) -> &'static str {
        self.storage_name
    }

    /// Returns the field name.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        self.field_name
    }

    /// Returns the blind-index declarations.
    #[must_use]
    pub const fn blind_indexes(&self) -> &'static [BlindIndexSpec] {
        self.blind_indexes
    }
}
