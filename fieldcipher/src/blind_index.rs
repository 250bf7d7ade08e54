//! Blind index generation for searchable encryption.
//!
//! Blind indexes allow equality queries on encrypted data without revealing
//! the plaintext value. A token is computed as
//! `HMAC-SHA256(index_key, transform(plaintext))`, truncated to the
//! configured bit length and hex encoded. `index_key` is derived per field
//! and per index name, so tokens never correlate across columns.

use crate::error::Error;
use crate::transform::Transformation;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Default (and maximum) token length in bits.
pub const DEFAULT_BITS: u32 = 256;

/// Chained HMAC rounds used when an index is not declared `fast`.
pub const SLOW_ROUNDS: u32 = 1024;

/// Runtime blind index: name, optional normalization, and output shape.
#[derive(Clone)]
pub struct BlindIndex {
    name: String,
    transformation: Option<Arc<dyn Transformation>>,
    bits: u32,
    fast: bool,
}

impl BlindIndex {
    /// Creates a blind index.
    ///
    /// # Arguments
    ///
    /// * `name` - Index name, unique within its field
    /// * `transformation` - Normalization applied before hashing (`None` = identity)
    /// * `bits` - Token length in bits, `1..=256`
    /// * `fast` - Single HMAC instead of stretched derivation
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBlindIndex` if the name is empty or `bits` is out of range.
    pub fn new(
        name: impl Into<String>,
        transformation: Option<Arc<dyn Transformation>>,
        bits: u32,
        fast: bool,
    ) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidBlindIndex {
                index: name,
                reason: "name must not be empty".to_string(),
            });
        }
        if !(1..=DEFAULT_BITS).contains(&bits) {
            return Err(Error::InvalidBlindIndex {
                index: name,
                reason: format!("bits must be within 1..={DEFAULT_BITS}, got {bits}"),
            });
        }
        Ok(Self { name, transformation, bits, fast })
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the token length in bits.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns `true` if the index uses a single HMAC.
    #[must_use]
    pub const fn is_fast(&self) -> bool {
        self.fast
    }

    /// Applies the index's normalization to `plaintext`.
    #[must_use]
    pub fn normalize<'a>(&self, plaintext: &'a str) -> Cow<'a, str> {
        match &self.transformation {
            Some(t) => Cow::Owned(t.transform(plaintext)),
            None => Cow::Borrowed(plaintext),
        }
    }

    /// Computes the token of `plaintext` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexGenerationFailed` if the key is rejected by HMAC.
    pub fn token(&self, key: &SecretVec<u8>, plaintext: &str) -> Result<String, Error> {
        let normalized = self.normalize(plaintext);
        let mut digest = hmac(key, normalized.as_bytes())?;

        if !self.fast {
            let mut block = digest;
            for _ in 1..SLOW_ROUNDS {
                block = hmac(key, &block)?;
                digest.iter_mut().zip(block.iter()).for_each(|(d, b)| *d ^= b);
            }
        }

        Ok(hex::encode(truncate(&digest, self.bits)))
    }
}

impl fmt::Debug for BlindIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindIndex")
            .field("name", &self.name)
            .field("transformed", &self.transformation.is_some())
            .field("bits", &self.bits)
            .field("fast", &self.fast)
            .finish()
    }
}

fn hmac(key: &SecretVec<u8>, message: &[u8]) -> Result<[u8; 32], Error> {
    let mut mac = HmacSha256::new_from_slice(key.expose_secret())
        .map_err(|e| Error::IndexGenerationFailed(format!("Invalid index key: {e}")))?;
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Keeps the leading `bits` bits; trailing bits of the last byte are zeroed.
#[allow(clippy::cast_possible_truncation)]
fn truncate(digest: &[u8], bits: u32) -> Vec<u8> {
    let bytes = bits.div_ceil(8) as usize;
    let mut out = digest[..bytes].to_vec();
    let spare = bytes as u32 * 8 - bits;
    if let Some(last) = out.last_mut() {
        *last &= 0xFF_u8 << spare;
    }
    out
}
