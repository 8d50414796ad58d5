/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Text armoring of binary values (public keys, signatures) in PEM-style blocks:
//!
//! ```text
//! -----BEGIN ED25519 SIGNATURE-----
//! <base64, wrapped at 64 columns>
//! -----END ED25519 SIGNATURE-----
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

const LINE_WIDTH: usize = 64;

/// Armor `bytes` in a block labelled `label`.
pub fn armor(label: &str, bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII, so any chunk boundary is a char boundary.
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Find the first block labelled `label` in `text` and decode its contents. Blocks with other labels
/// are skipped.
pub fn dearmor(label: &str, text: &str) -> Result<Vec<u8>, ArmorError> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let start = text
        .find(&begin)
        .map(|index| index + begin.len())
        .ok_or(ArmorError::MissingBlock { label: label.to_string() })?;
    let length = text[start..]
        .find(&end)
        .ok_or(ArmorError::MissingBlock { label: label.to_string() })?;

    let body: String = text[start..start + length]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    Ok(STANDARD.decode(body)?)
}

/// Error when reading an armored value.
#[derive(Debug, Error)]
pub enum ArmorError {
    #[error("no armored block labelled {label}")]
    MissingBlock { label: String },

    #[error("armored block is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("armored {label} has unexpected length {length}")]
    BadLength { label: &'static str, length: usize },

    #[error("armored public key is not a valid Ed25519 point: {0}")]
    InvalidKey(ed25519_dalek::SignatureError),
}
