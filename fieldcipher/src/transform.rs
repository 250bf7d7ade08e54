//! Plaintext normalization applied before blind-index derivation.
//!
//! A blind index only matches when the value being searched for normalizes
//! to exactly the same string as the stored one, so every [`Transformation`]
//! must be a pure, deterministic function of its input.

use crate::error::Error;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pure normalization of a plaintext value.
///
/// Implemented for any `Fn(&str) -> String + Send + Sync`, so closures can be
/// registered directly.
pub trait Transformation: Send + Sync {
    /// Returns the normalized form of `input`.
    fn transform(&self, input: &str) -> String;
}

impl<F> Transformation for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn transform(&self, input: &str) -> String {
        self(input)
    }
}

/// Unicode lowercase; makes an index case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl Transformation for Lowercase {
    fn transform(&self, input: &str) -> String {
        input.to_lowercase()
    }
}

/// Last four ASCII digits, left-padded with `0` when fewer are present.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastFourDigits;

impl Transformation for LastFourDigits {
    fn transform(&self, input: &str) -> String {
        let digits = DigitsOnly.transform(input);
        let tail = &digits[digits.len().saturating_sub(4)..];
        format!("{tail:0>4}")
    }
}

/// ASCII digits only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitsOnly;

impl Transformation for DigitsOnly {
    fn transform(&self, input: &str) -> String {
        input.chars().filter(char::is_ascii_digit).collect()
    }
}

/// Alphabetic characters only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaCharactersOnly;

impl Transformation for AlphaCharactersOnly {
    fn transform(&self, input: &str) -> String {
        input.chars().filter(|c| c.is_alphabetic()).collect()
    }
}

/// First character, or the empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCharacter;

impl Transformation for FirstCharacter {
    fn transform(&self, input: &str) -> String {
        input.chars().next().map(String::from).unwrap_or_default()
    }
}

/// Symbolic name → transformation table.
///
/// Registration is expected to finish before the owning interceptor is
/// shared; afterwards the registry is only read.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn Transformation>>,
}

impl TransformerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the bundled transformations:
    ///
    /// | name               | transformation          |
    /// |--------------------|-------------------------|
    /// | `lowercase`        | [`Lowercase`]           |
    /// | `last-four-digits` | [`LastFourDigits`]      |
    /// | `digits-only`      | [`DigitsOnly`]          |
    /// | `alpha-only`       | [`AlphaCharactersOnly`] |
    /// | `first-character`  | [`FirstCharacter`]      |
    #[must_use]
    pub fn with_builtins() -> Self {
        let builtins: [(&str, Arc<dyn Transformation>); 5] = [
            ("lowercase", Arc::new(Lowercase)),
            ("last-four-digits", Arc::new(LastFourDigits)),
            ("digits-only", Arc::new(DigitsOnly)),
            ("alpha-only", Arc::new(AlphaCharactersOnly)),
            ("first-character", Arc::new(FirstCharacter)),
        ];
        let transformers =
            builtins.into_iter().map(|(name, t)| (name.to_string(), t)).collect();
        Self { transformers }
    }

    /// Binds `name` to `transformer`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidTransformer` if `name` is empty or whitespace
    /// - `Error::DuplicateTransformer` if `name` is already bound
    pub fn register<T>(&mut self, name: impl Into<String>, transformer: T) -> Result<(), Error>
    where
        T: Transformation + 'static,
    {
        self.register_shared(name, Arc::new(transformer))
    }

    /// Like [`register`](Self::register), for an already shared transformation.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        transformer: Arc<dyn Transformation>,
    ) -> Result<(), Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidTransformer("transformer name must not be empty".into()));
        }
        if self.transformers.contains_key(&name) {
            return Err(Error::DuplicateTransformer(name));
        }
        self.transformers.insert(name, transformer);
        Ok(())
    }

    /// Looks up a transformation by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTransformer` if nothing is bound to `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Transformation>, Error> {
        self.transformers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTransformer(name.to_string()))
    }

    /// Returns `true` if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transformers.contains_key(name)
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transformers.keys().collect();
        names.sort();
        f.debug_struct("TransformerRegistry").field("transformers", &names).finish()
    }
}
