//! Entity-side metadata and storage slots.

use crate::declaration::EncryptedFieldDeclaration;

/// A persistent type with encrypted fields.
///
/// Normally derived with `#[derive(Encrypted)]`. A hand-written impl maps
/// names to slots explicitly:
///
/// ```
/// use fieldcipher::declaration::{BlindIndexSpec, EncryptedFieldDeclaration};
/// use fieldcipher::entity::EncryptedEntity;
///
/// struct Message {
///     text: Option<String>,
///     text_blind_index_insensitive: Option<String>,
/// }
///
/// impl EncryptedEntity for Message {
///     fn encrypted_fields() -> &'static [EncryptedFieldDeclaration] {
///         const INDEXES: &[BlindIndexSpec] =
///             &[BlindIndexSpec::new("insensitive").with_transformer("lowercase")];
///         const FIELDS: &[EncryptedFieldDeclaration] =
///             &[EncryptedFieldDeclaration::new("messages", "text").with_blind_indexes(INDEXES)];
///         FIELDS
///     }
///
///     fn encrypted_value_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
///         match field {
///             "text" => Some(&mut self.text),
///             _ => None,
///         }
///     }
///
///     fn blind_index_slot_mut(&mut self, field: &str, index: &str) -> Option<&mut Option<String>> {
///         match (field, index) {
///             ("text", "insensitive") => Some(&mut self.text_blind_index_insensitive),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait EncryptedEntity: 'static {
    /// Encrypted fields of the type, in processing order.
    fn encrypted_fields() -> &'static [EncryptedFieldDeclaration];

    /// Slot holding the field's plaintext in memory and ciphertext in storage.
    ///
    /// `None` for names that are not encrypted fields of this type.
    fn encrypted_value_mut(&mut self, field: &str) -> Option<&mut Option<String>>;

    /// Back-column receiving the token of `index` on `field`.
    ///
    /// `None` when the type has no such column; the token is then dropped.
    fn blind_index_slot_mut(&mut self, field: &str, index: &str) -> Option<&mut Option<String>>;
}

/// Conventional back-column name: `{field}_blind_index_{index}`.
///
/// ```
/// use fieldcipher::entity::blind_index_column_name;
///
/// assert_eq!(blind_index_column_name("ssn", "last_four"), "ssn_blind_index_last_four");
/// ```
#[must_use]
pub fn blind_index_column_name(field: &str, index: &str) -> String {
    format!("{field}_blind_index_{index}")
}
