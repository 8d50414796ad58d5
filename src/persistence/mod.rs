/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Getting game chains into and out of the process.
//!
//! There are two representations:
//! 1. [`objects`]: every commit is a linked object in an [object store](crate::object_store). This is
//!    how games are shared between players: a game is identified by the hash of its head commit.
//! 2. [`file`]: a whole game as one flat JSON document, for local transfer and snapshots.
//!
//! Both are untrusted on the way in. Loading a game rebuilds every commit, re-verifies every signature,
//! and validates the chain before a [`Game`](crate::chain::game::Game) is handed back.

use thiserror::Error;

use crate::{
    chain::{commit::CommitError, invariants::ValidationError},
    object_store::pluggables::StoreError,
    types::basic::{ObjectHash, PlayerId},
};

use self::armor::ArmorError;

pub mod armor;

pub mod file;

pub mod objects;

/// Error when rebuilding a game from an object store or a JSON document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Armor(#[from] ArmorError),

    #[error("commit object {hash} has no {link} link")]
    MissingLink { hash: ObjectHash, link: &'static str },

    #[error("public key blob {hash} is not UTF-8 text")]
    KeyNotText { hash: ObjectHash },

    #[error("signature has {length} bytes, expected 64")]
    BadSignatureLength { length: usize },

    #[error("expected a {expected} commit at position {position}, found {found:?}")]
    UnexpectedCommitType {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("game document has no {record}")]
    MissingRecord { record: &'static str },

    #[error("game document has a {record} but no {requires}")]
    Orphan {
        record: &'static str,
        requires: &'static str,
    },

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("commit at position {position} declares ancestor hash {declared:?}, but its parent's hash is {actual:?}")]
    AncestorMismatch {
        position: usize,
        declared: String,
        actual: String,
    },

    #[error("commit at position {position} failed verification: {source}")]
    Verify {
        position: usize,
        #[source]
        source: CommitError,
    },

    #[error("loaded game is not valid: {0}")]
    Invalid(#[from] ValidationError),
}

/// Serde adapter for byte strings written as standard base64 text.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer, T: AsRef<[u8]>>(
        bytes: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
