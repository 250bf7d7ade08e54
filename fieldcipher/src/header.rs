//! Text encoding of stored ciphertext.
//!
//! Encrypted fields live in string columns, so sealed values are rendered as
//! text:
//!
//! ```text
//! fc{version}:{base64url(nonce || aead_ciphertext)}
//! ```
//!
//! The version prefix lets a reader reject values written by an
//! incompatible format before attempting decryption.

use crate::error::Error;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Protocol version for the encryption format.
pub const PROTOCOL_VERSION: u8 = 1;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

const MAGIC: &str = "fc";

/// A parsed sealed value: nonce plus AEAD output (ciphertext || tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    nonce: [u8; NONCE_SIZE],
    body: Vec<u8>,
}

impl SealedValue {
    /// Creates a sealed value from its parts.
    #[must_use]
    pub const fn new(nonce: [u8; NONCE_SIZE], body: Vec<u8>) -> Self {
        Self { nonce, body }
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Returns the AEAD output.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Renders the value in its stored text form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(NONCE_SIZE + self.body.len());
        raw.extend_from_slice(&self.nonce);
        raw.extend_from_slice(&self.body);
        format!("{MAGIC}{PROTOCOL_VERSION}:{}", URL_SAFE_NO_PAD.encode(raw))
    }

    /// Parses a stored value.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The prefix is missing or malformed (`InvalidHeader`)
    /// - The prefix names another format version (`UnsupportedVersion`)
    /// - The payload is not base64url or too short to hold nonce and tag
    pub fn decode(stored: &str) -> Result<Self, Error> {
        let (prefix, payload) = stored
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeader("missing version prefix".to_string()))?;

        let version = prefix
            .strip_prefix(MAGIC)
            .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| Error::InvalidHeader(format!("unrecognized prefix: {prefix:?}")))?;

        if version != PROTOCOL_VERSION.to_string() {
            return Err(Error::UnsupportedVersion {
                version: version.to_string(),
                supported: PROTOCOL_VERSION.to_string(),
            });
        }

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::InvalidHeader(format!("invalid payload encoding: {e}")))?;

        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::InvalidHeader(format!("payload truncated: {} bytes", raw.len())));
        }

        let (nonce, body) = raw.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| Error::InvalidHeader("invalid nonce size".to_string()))?;

        Ok(Self { nonce, body: body.to_vec() })
    }
}
