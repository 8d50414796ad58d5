/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A simple, volatile, in-memory implementation of [`ObjectStore`].
//!
//! Hashes are the lowercase hex SHA-256 digest of the stored bytes (for blobs) or of the Borsh
//! serialization of the object (for objects).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{basic::ObjectHash, crypto_primitives::sha256_hex};

use super::pluggables::{ObjectStore, StoreError, StoreObject};

#[derive(Default)]
struct Contents {
    blobs: HashMap<ObjectHash, Vec<u8>>,
    objects: HashMap<ObjectHash, Vec<u8>>,
}

/// An in-memory implementation of [`ObjectStore`]. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemStore(Arc<Mutex<Contents>>);

impl MemStore {
    /// Create a new, empty `MemStore`.
    pub fn new() -> MemStore {
        MemStore::default()
    }

    /// Number of blobs and objects currently stored.
    pub fn len(&self) -> usize {
        self.lock()
            .map(|contents| contents.blobs.len() + contents.objects.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Contents>, StoreError> {
        self.0
            .lock()
            .map_err(|_| StoreError::Backend("mem store mutex poisoned".to_string()))
    }
}

impl ObjectStore for MemStore {
    fn put(&self, bytes: &[u8]) -> Result<ObjectHash, StoreError> {
        let hash = ObjectHash::new(sha256_hex(bytes));
        self.lock()?
            .blobs
            .entry(hash.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(hash)
    }

    fn get(&self, hash: &ObjectHash) -> Result<Vec<u8>, StoreError> {
        self.lock()?
            .blobs
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { hash: hash.clone() })
    }

    fn put_object(&self, object: &StoreObject) -> Result<ObjectHash, StoreError> {
        let bytes = object.try_to_vec()?;
        let hash = ObjectHash::new(sha256_hex(&bytes));
        self.lock()?.objects.entry(hash.clone()).or_insert(bytes);
        Ok(hash)
    }

    fn get_object(&self, hash: &ObjectHash) -> Result<StoreObject, StoreError> {
        let bytes = self
            .lock()?
            .objects
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { hash: hash.clone() })?;
        Ok(StoreObject::deserialize(&mut bytes.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_hash() {
        let store = MemStore::new();
        let a = store.put(b"hello").unwrap();
        let b = store.put(b"hello").unwrap();
        let c = store.put(b"hello!").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.get(&a).unwrap(), b"hello");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn objects_keep_data_and_links() {
        let store = MemStore::new();
        let blob = store.put(b"payload").unwrap();

        let mut object = StoreObject::new();
        object.set_data(b"meta".to_vec()).add_link("data", blob.clone());
        let hash = store.put_object(&object).unwrap();

        let fetched = store.get_object(&hash).unwrap();
        assert_eq!(fetched, object);
        assert_eq!(fetched.link("data"), Some(&blob));
        assert_eq!(fetched.link("parent"), None);
    }

    #[test]
    fn missing_hashes_are_not_found() {
        let store = MemStore::new();
        let hash = ObjectHash::new("nope");
        assert!(matches!(store.get(&hash), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.get_object(&hash), Err(StoreError::NotFound { .. })));
    }
}
