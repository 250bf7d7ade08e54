//! Context types for field encryption and blind indexing.

use std::fmt;

/// Context binding key derivation and authenticated data to one field.
///
/// The context ensures that:
/// - Different tenants produce different ciphertexts and tokens
/// - Different tables/fields produce different ciphertexts and tokens
/// - Ciphertext moved to another field fails authentication
///
/// # Example
///
/// ```
/// use fieldcipher::context::FieldContext;
///
/// let ctx = FieldContext::new("users", "ssn").with_tenant("tenant_123");
/// assert_eq!(ctx.to_string(), "tenant_123|users|ssn");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldContext {
    tenant_id: Option<String>,
    storage_name: String,
    field_name: String,
}

impl FieldContext {
    /// Creates a new field context.
    ///
    /// # Arguments
    ///
    /// * `storage_name` - Table (or collection) the field is stored in
    /// * `field_name` - Name of the encrypted field
    #[must_use]
    pub fn new(storage_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self { tenant_id: None, storage_name: storage_name.into(), field_name: field_name.into() }
    }

    /// Sets the tenant ID for multi-tenant key separation.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Returns the tenant ID, if set.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Returns the storage name.
    #[must_use]
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Returns the field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Returns the context of one blind index on this field.
    #[must_use]
    pub fn index(&self, index_name: impl Into<String>) -> IndexContext {
        IndexContext { field: self.clone(), index_name: index_name.into() }
    }
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.tenant_id.as_deref().unwrap_or("default"),
            self.storage_name,
            self.field_name
        )
    }
}

/// Context for one named blind index of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexContext {
    field: FieldContext,
    index_name: String,
}

impl IndexContext {
    /// Returns the owning field context.
    #[must_use]
    pub const fn field(&self) -> &FieldContext {
        &self.field
    }

    /// Returns the index name.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

impl fmt::Display for IndexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|blind_index:{}", self.field, self.index_name)
    }
}
