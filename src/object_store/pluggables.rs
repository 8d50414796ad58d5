/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for a pluggable, content-addressed object store.

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use crate::types::basic::ObjectHash;

/// A content-addressed, append-only store of blobs and linked objects.
///
/// ## Requirements
///
/// - Content addressing: storing the same bytes (or the same object) twice must return the same
///   hash, and storing different bytes must return different hashes.
/// - Durability is up to the implementation. ipgs_rs never deletes anything it stores.
/// - Methods may block for as long as the backend needs. ipgs_rs does not retry failed calls; any
///   retry or backoff policy belongs in the implementation.
///
/// Methods take `&self`: a store is typically a cheap handle onto a shared backend (a daemon, a
/// mutex-guarded map, ...), so implementations provide their own interior synchronization.
pub trait ObjectStore {
    /// Store an opaque blob, returning its content hash.
    fn put(&self, bytes: &[u8]) -> Result<ObjectHash, StoreError>;

    /// Get a blob previously stored with [`put`](Self::put).
    fn get(&self, hash: &ObjectHash) -> Result<Vec<u8>, StoreError>;

    /// Store an object, returning its content hash.
    fn put_object(&self, object: &StoreObject) -> Result<ObjectHash, StoreError>;

    /// Get an object previously stored with [`put_object`](Self::put_object).
    fn get_object(&self, hash: &ObjectHash) -> Result<StoreObject, StoreError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn put(&self, bytes: &[u8]) -> Result<ObjectHash, StoreError> {
        (**self).put(bytes)
    }

    fn get(&self, hash: &ObjectHash) -> Result<Vec<u8>, StoreError> {
        (**self).get(hash)
    }

    fn put_object(&self, object: &StoreObject) -> Result<ObjectHash, StoreError> {
        (**self).put_object(object)
    }

    fn get_object(&self, hash: &ObjectHash) -> Result<StoreObject, StoreError> {
        (**self).get_object(hash)
    }
}

/// A named reference from one stored object to another stored object or blob.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Link {
    pub name: String,
    pub hash: ObjectHash,
}

/// An object with data and named links to other objects.
///
/// Build one with [`new`](Self::new), [`set_data`](Self::set_data) and [`add_link`](Self::add_link),
/// then hand it to [`ObjectStore::put_object`].
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoreObject {
    data: Vec<u8>,
    links: Vec<Link>,
}

impl StoreObject {
    pub fn new() -> StoreObject {
        StoreObject::default()
    }

    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.data = data.into();
        self
    }

    pub fn add_link(&mut self, name: impl Into<String>, hash: ObjectHash) -> &mut Self {
        self.links.push(Link {
            name: name.into(),
            hash,
        });
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Get the hash of the first link called `name`.
    pub fn link(&self, name: &str) -> Option<&ObjectHash> {
        self.links
            .iter()
            .find(|link| link.name == name)
            .map(|link| &link.hash)
    }
}

/// Error when reading from or writing to an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored under `hash`.
    #[error("no object found for hash {hash}")]
    NotFound { hash: ObjectHash },

    /// The backend could not be reached or refused the operation.
    #[error("object store backend failure: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("failed to encode or decode a stored value: {0}")]
    Codec(#[from] std::io::Error),
}
