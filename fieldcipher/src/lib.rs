//! # `fieldcipher`
//!
//! Transparent field-level encryption for persistent entities. Designated
//! fields are encrypted before they are written and decrypted after they are
//! read, and each field can carry blind indexes: deterministic, keyed
//! tokens that keep encrypted values searchable by equality.
//!
//! ## Features
//!
//! - AEAD encryption (ChaCha20-Poly1305) bound to table and field
//! - Blind indexes with pluggable normalization (case folding, last four digits, ...)
//! - Lifecycle interceptor for load, create, and update events
//! - Change-filtered updates: only modified fields are re-encrypted
//! - Per-type configuration cache, safe for concurrent use
//! - `#[derive(Encrypted)]` for declaring fields and index back-columns
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldcipher::prelude::*;
//!
//! #[derive(Encrypted)]
//! #[encrypted(table = "messages")]
//! struct Message {
//!     #[encrypted(blind_index(name = "insensitive", transformer = "case-insensitive"))]
//!     text: Option<String>,
//!     #[blind_index]
//!     text_blind_index_insensitive: Option<String>,
//! }
//!
//! let engine = CipherEngine::new(StaticKeyProvider::from_hex(&key_hex)?);
//! let interceptor = Interceptor::new(engine).with_transformer("case-insensitive", Lowercase)?;
//!
//! let mut message = Message { text: Some("This is a secret message.".into()), .. };
//! interceptor.on_before_create(&mut message)?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blind_index;
pub mod context;
pub mod declaration;
pub mod entity;
pub mod error;
pub mod field;
pub mod header;
pub mod interceptor;
pub mod kdf;
pub mod key_provider;
pub mod lifecycle;
pub mod resolver;
pub mod transform;

pub use declaration::{BlindIndexSpec, EncryptedFieldDeclaration};
pub use entity::EncryptedEntity;
pub use error::Error;
#[cfg(feature = "derive")]
pub use fieldcipher_derive::Encrypted;
pub use interceptor::Interceptor;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::declaration::{BlindIndexSpec, EncryptedFieldDeclaration};
    pub use crate::entity::EncryptedEntity;
    pub use crate::error::{Error, KeyProviderError};
    pub use crate::field::{CipherBackend, CipherEngine, FieldCipher};
    pub use crate::interceptor::Interceptor;
    pub use crate::key_provider::{KeyProvider, StaticKeyProvider};
    pub use crate::lifecycle::{ChangeSet, EntityListener};
    pub use crate::transform::{
        AlphaCharactersOnly, DigitsOnly, FirstCharacter, LastFourDigits, Lowercase,
        Transformation, TransformerRegistry,
    };
    #[cfg(feature = "derive")]
    pub use fieldcipher_derive::Encrypted;
}
