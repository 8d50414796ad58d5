/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate, used by content-addressed stores.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate, used to seal commits.

use super::basic::SignatureBytes;

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// Sign an arbitrary `message` with `signing_key`.
pub(crate) fn sign(signing_key: &SigningKey, message: &[u8]) -> SignatureBytes {
    SignatureBytes::new(signing_key.sign(message).to_bytes())
}

/// Check that `signature` is a signature created by the owner of `verifying_key` over `message`.
pub(crate) fn is_correct(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &SignatureBytes,
) -> bool {
    let signature = Signature::from_bytes(&signature.bytes());
    verifying_key.verify(message, &signature).is_ok()
}

/// Get the lowercase hex SHA-256 digest of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = CryptoHasher::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
