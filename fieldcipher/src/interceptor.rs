//! Lifecycle interceptor: encrypts on the way to storage, decrypts on the
//! way back, and keeps blind-index columns in step.
//!
//! Every callback is one pass over the entity:
//!
//! 1. discover the fields to process and resolve their configurations
//!    (cached after the first pass for a type),
//! 2. run every crypto operation against the current slot values,
//! 3. write all results back.
//!
//! Nothing is written until step 2 has succeeded for every field, so a
//! failing field leaves the entity exactly as it was. No state survives
//! between passes.

use crate::declaration::EncryptedFieldDeclaration;
use crate::entity::EncryptedEntity;
use crate::error::Error;
use crate::field::{CipherBackend, FieldCipher, StorageValue};
use crate::lifecycle::{ChangeSet, EntityListener};
use crate::resolver::{FieldResolver, ResolvedField};
use crate::transform::{Transformation, TransformerRegistry};
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Transparent field encryption for every [`EncryptedEntity`].
///
/// Register transformers while the interceptor is still exclusively owned,
/// then hand it (typically in an `Arc`) to the persistence engine. From then
/// on it is only read, and may serve any number of threads.
///
/// # Example
///
/// ```
/// use fieldcipher::prelude::*;
///
/// let engine = CipherEngine::new(StaticKeyProvider::new(vec![7u8; 32]));
/// let interceptor = Interceptor::new(engine).with_transformer("case-insensitive", Lowercase)?;
/// # Ok::<(), fieldcipher::error::Error>(())
/// ```
pub struct Interceptor<B: CipherBackend> {
    backend: B,
    transformers: TransformerRegistry,
    resolver: FieldResolver<B::Field>,
}

type Resolved<B> = Arc<ResolvedField<<B as CipherBackend>::Field>>;

impl<B: CipherBackend> Interceptor<B> {
    /// Creates an interceptor with an empty transformer registry.
    pub fn new(backend: B) -> Self {
        Self::with_registry(backend, TransformerRegistry::new())
    }

    /// Creates an interceptor over a prepared registry.
    pub fn with_registry(backend: B, transformers: TransformerRegistry) -> Self {
        Self { backend, transformers, resolver: FieldResolver::new() }
    }

    /// Registers a transformer under `name`.
    ///
    /// # Errors
    ///
    /// `Error::DuplicateTransformer` or `Error::InvalidTransformer`, see
    /// [`TransformerRegistry::register`].
    pub fn add_transformer<T>(&mut self, name: impl Into<String>, transformer: T) -> Result<(), Error>
    where
        T: Transformation + 'static,
    {
        self.transformers.register(name, transformer)
    }

    /// Builder form of [`add_transformer`](Self::add_transformer).
    ///
    /// # Errors
    ///
    /// Same as [`add_transformer`](Self::add_transformer).
    pub fn with_transformer<T>(mut self, name: impl Into<String>, transformer: T) -> Result<Self, Error>
    where
        T: Transformation + 'static,
    {
        self.add_transformer(name, transformer)?;
        Ok(self)
    }

    /// Returns the transformer registry.
    #[must_use]
    pub const fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    /// Returns the configuration cache.
    #[must_use]
    pub const fn resolver(&self) -> &FieldResolver<B::Field> {
        &self.resolver
    }

    /// Resolves every encrypted field of `E` up front, surfacing
    /// configuration errors at startup instead of on the first write.
    ///
    /// # Errors
    ///
    /// The first resolution error encountered.
    pub fn preload<E: EncryptedEntity>(&self) -> Result<(), Error> {
        E::encrypted_fields().iter().try_for_each(|d| self.resolve::<E>(d).map(drop))
    }

    /// Returns the resolved configuration of `field` on `E`.
    ///
    /// # Errors
    ///
    /// `Error::UnknownField` if `field` is not declared on `E`, otherwise any
    /// resolution error.
    pub fn encrypted_field<E: EncryptedEntity>(&self, field: &str) -> Result<Resolved<B>, Error> {
        let declaration = E::encrypted_fields()
            .iter()
            .find(|d| d.field_name() == field)
            .ok_or_else(|| Error::UnknownField { entity: type_name::<E>(), field: field.to_string() })?;
        self.resolve::<E>(declaration)
    }

    /// Computes the blind-index token to search `field` of `E` for `plaintext`.
    ///
    /// # Errors
    ///
    /// `Error::UnknownField`, `Error::UnknownIndex`, or a resolution error.
    pub fn blind_index<E: EncryptedEntity>(
        &self,
        field: &str,
        index: &str,
        plaintext: &str,
    ) -> Result<String, Error> {
        self.encrypted_field::<E>(field)?.cipher().blind_index(plaintext, index)
    }

    fn resolve<E: EncryptedEntity>(
        &self,
        declaration: &EncryptedFieldDeclaration,
    ) -> Result<Resolved<B>, Error> {
        self.resolver.resolve::<E, B>(declaration, &self.transformers, &self.backend)
    }

    /// Encrypts the given fields and writes ciphertext and tokens back.
    fn seal<E: EncryptedEntity>(
        &self,
        entity: &mut E,
        declarations: &[&'static EncryptedFieldDeclaration],
    ) -> Result<(), Error> {
        let resolved = declarations
            .iter()
            .map(|d| self.resolve::<E>(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut sealed: Vec<(Resolved<B>, Option<StorageValue>)> =
            Vec::with_capacity(resolved.len());
        for field in resolved {
            let name = field.declaration().field_name();
            let value = value_slot(entity, name)?
                .as_deref()
                .map(|plaintext| field.cipher().prepare_for_storage(plaintext))
                .transpose()?;
            sealed.push((field, value));
        }

        for (field, value) in sealed {
            let declaration = field.declaration();
            let name = declaration.field_name();
            trace!(entity = type_name::<E>(), field = name, present = value.is_some(), "sealing field");

            let (ciphertext, mut tokens) = match value {
                Some(StorageValue { ciphertext, blind_indexes }) => (Some(ciphertext), blind_indexes),
                None => (None, Default::default()),
            };
            *value_slot(entity, name)? = ciphertext;

            for spec in declaration.blind_indexes() {
                match entity.blind_index_slot_mut(name, spec.name()) {
                    Some(slot) => *slot = tokens.remove(spec.name()),
                    None => trace!(
                        entity = type_name::<E>(),
                        field = name,
                        index = spec.name(),
                        "no back-column for blind index, skipping"
                    ),
                }
            }
        }

        Ok(())
    }
}

impl<B, E> EntityListener<E> for Interceptor<B>
where
    B: CipherBackend,
    E: EncryptedEntity,
{
    fn on_load(&self, entity: &mut E) -> Result<(), Error> {
        let resolved = E::encrypted_fields()
            .iter()
            .map(|d| self.resolve::<E>(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut opened = Vec::with_capacity(resolved.len());
        for field in &resolved {
            let name = field.declaration().field_name();
            // `None` and `""` were never written by us; leave them alone
            if let Some(ciphertext) = value_slot(entity, name)?.as_deref().filter(|c| !c.is_empty()) {
                opened.push((name, field.cipher().decrypt_value(ciphertext)?));
            }
        }

        for (name, plaintext) in opened {
            trace!(entity = type_name::<E>(), field = name, "decrypted field");
            *value_slot(entity, name)? = Some(plaintext);
        }

        Ok(())
    }

    fn on_before_create(&self, entity: &mut E) -> Result<(), Error> {
        let all: Vec<_> = E::encrypted_fields().iter().collect();
        self.seal(entity, &all)
    }

    fn on_before_update(
        &self,
        entity: &mut E,
        changes: &mut dyn ChangeSet<E>,
    ) -> Result<(), Error> {
        // Read the change set before anything is mutated
        let changed: Vec<_> = E::encrypted_fields()
            .iter()
            .filter(|d| changes.has_changed_field(d.field_name()))
            .collect();

        if changed.is_empty() {
            trace!(entity = type_name::<E>(), "no encrypted field changed");
            return Ok(());
        }

        self.seal(entity, &changed)?;

        // Ciphertext and tokens were written after change detection ran
        debug!(entity = type_name::<E>(), fields = changed.len(), "recomputing change set");
        changes.recompute(entity);

        Ok(())
    }
}

impl<B: CipherBackend> fmt::Debug for Interceptor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("transformers", &self.transformers)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

fn value_slot<'e, E: EncryptedEntity>(
    entity: &'e mut E,
    field: &str,
) -> Result<&'e mut Option<String>, Error> {
    entity
        .encrypted_value_mut(field)
        .ok_or_else(|| Error::UnknownField { entity: type_name::<E>(), field: field.to_string() })
}
