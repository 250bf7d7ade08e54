//! Key derivation using HKDF (HMAC-based Key Derivation Function).
//!
//! Every encrypted field gets its own encryption key, and every blind index
//! of that field its own HMAC key, all expanded from the provider's root key
//! with HKDF-SHA256.

use crate::context::{FieldContext, IndexContext};
use crate::error::Error;
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;

/// Size of the root key and of every derived key, in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Derives the encryption key of a field.
///
/// The `info` parameter is `tenant|storage|field|encrypt`.
///
/// # Errors
///
/// Returns `Error::InvalidKeyLength` if the root key is not 32 bytes, or
/// `Error::KeyDerivation` if the expansion fails.
///
/// # Example
///
/// ```
/// use fieldcipher::kdf::derive_encryption_key;
/// use fieldcipher::context::FieldContext;
/// use secrecy::SecretVec;
///
/// let root = SecretVec::new(vec![0u8; 32]);
/// let context = FieldContext::new("users", "email");
/// let key = derive_encryption_key(&root, &context).expect("key derivation failed");
/// ```
pub fn derive_encryption_key(
    root: &SecretVec<u8>,
    context: &FieldContext,
) -> Result<SecretVec<u8>, Error> {
    expand(root, &format!("{context}|encrypt"))
}

/// Derives the HMAC key of one blind index.
///
/// The `info` parameter is `tenant|storage|field|blind_index:{name}`.
///
/// # Errors
///
/// Same as [`derive_encryption_key`].
pub fn derive_blind_index_key(
    root: &SecretVec<u8>,
    context: &IndexContext,
) -> Result<SecretVec<u8>, Error> {
    expand(root, &context.to_string())
}

fn expand(root: &SecretVec<u8>, info: &str) -> Result<SecretVec<u8>, Error> {
    let ikm = root.expose_secret();
    if ikm.len() != KEY_SIZE {
        return Err(Error::InvalidKeyLength { expected: KEY_SIZE, actual: ikm.len() });
    }

    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = vec![0u8; KEY_SIZE];
    hkdf.expand(info.as_bytes(), &mut okm).map_err(|_| Error::KeyDerivation)?;

    Ok(SecretVec::new(okm))
}
