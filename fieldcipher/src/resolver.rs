//! Field configuration resolution and caching.
//!
//! Turning a declaration into a working capability means resolving
//! transformers, validating index names, and deriving keys. That happens
//! once per `(entity type, field)`; every later lifecycle event gets the
//! cached [`ResolvedField`].

use crate::blind_index::BlindIndex;
use crate::declaration::EncryptedFieldDeclaration;
use crate::entity::EncryptedEntity;
use crate::error::Error;
use crate::field::CipherBackend;
use crate::transform::TransformerRegistry;
use std::any::{type_name, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type CacheKey = (TypeId, &'static str);

/// A declaration together with the capability built for it. Immutable.
#[derive(Debug)]
pub struct ResolvedField<F> {
    declaration: EncryptedFieldDeclaration,
    cipher: F,
}

impl<F> ResolvedField<F> {
    /// Returns the declaration this configuration was built from.
    #[must_use]
    pub const fn declaration(&self) -> &EncryptedFieldDeclaration {
        &self.declaration
    }

    /// Returns the crypto capability.
    #[must_use]
    pub const fn cipher(&self) -> &F {
        &self.cipher
    }
}

/// Cache of resolved field configurations keyed by `(entity type, field)`.
///
/// Lookups take a read lock. On a miss the configuration is built without
/// holding any lock and inserted with insert-or-get, so concurrent first
/// accesses may build twice but always agree on the stored instance.
pub struct FieldResolver<F> {
    cache: RwLock<HashMap<CacheKey, Arc<ResolvedField<F>>>>,
}

impl<F> FieldResolver<F> {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self { cache: RwLock::new(HashMap::new()) }
    }

    /// Returns the configuration of `declaration` on `E`, building it on first use.
    ///
    /// # Errors
    ///
    /// - `Error::DuplicateBlindIndexName` if two index declarations share a name
    /// - `Error::UnknownTransformer` if a transformer is not in `registry`
    /// - `Error::InvalidBlindIndex` for malformed index declarations
    /// - `Error::ConflictingDeclaration` if another declaration of the same
    ///   field on `E` was resolved before
    /// - any construction error from `backend`
    ///
    /// Failed resolutions are not cached.
    pub fn resolve<E, B>(
        &self,
        declaration: &EncryptedFieldDeclaration,
        registry: &TransformerRegistry,
        backend: &B,
    ) -> Result<Arc<ResolvedField<F>>, Error>
    where
        E: EncryptedEntity,
        B: CipherBackend<Field = F>,
    {
        let key = (TypeId::of::<E>(), declaration.field_name());

        if let Some(resolved) =
            self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key)
        {
            return matching::<E, F>(resolved, declaration);
        }

        debug!(
            entity = type_name::<E>(),
            field = declaration.field_name(),
            indexes = declaration.blind_indexes().len(),
            "building encrypted field configuration"
        );

        let blind_indexes = build_blind_indexes(declaration, registry)?;
        let cipher = backend.encrypted_field(
            declaration.storage_name(),
            declaration.field_name(),
            blind_indexes,
        )?;
        let built = Arc::new(ResolvedField { declaration: *declaration, cipher });

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        matching::<E, F>(cache.entry(key).or_insert(built), declaration)
    }

    /// Number of cached configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F> Default for FieldResolver<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for FieldResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldResolver").field("cached", &self.len()).finish()
    }
}

/// Cache entries are keyed by field name only; a second, different
/// declaration of the same field is a configuration error.
fn matching<E, F>(
    resolved: &Arc<ResolvedField<F>>,
    declaration: &EncryptedFieldDeclaration,
) -> Result<Arc<ResolvedField<F>>, Error> {
    if resolved.declaration() == declaration {
        Ok(Arc::clone(resolved))
    } else {
        Err(Error::ConflictingDeclaration {
            entity: type_name::<E>(),
            field: declaration.field_name().to_string(),
        })
    }
}

fn build_blind_indexes(
    declaration: &EncryptedFieldDeclaration,
    registry: &TransformerRegistry,
) -> Result<Vec<BlindIndex>, Error> {
    let mut seen = HashSet::new();
    declaration
        .blind_indexes()
        .iter()
        .map(|spec| {
            if !seen.insert(spec.name()) {
                return Err(Error::DuplicateBlindIndexName {
                    field: declaration.field_name().to_string(),
                    index: spec.name().to_string(),
                });
            }
            let transformation =
                spec.transformer().map(|name| registry.resolve(name)).transpose()?;
            BlindIndex::new(spec.name(), transformation, spec.bits(), spec.is_fast())
        })
        .collect()
}
