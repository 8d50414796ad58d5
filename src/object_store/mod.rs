//! The content-addressed object store that commit chains are persisted to and replicated through.
//!
//! # Pluggable persistence
//!
//! - ipgs_rs does not care how objects are stored or replicated, only that whatever the user provides
//!   behaves like a content-addressed store of blobs and of objects with named links.
//! - This abstract functionality is made concrete by the [`ObjectStore`](pluggables::ObjectStore) trait.
//! - Implement it on top of whatever backend you want (an IPFS daemon, a database, ...). A volatile
//!   [`MemStore`](mem_store::MemStore) is provided for tests and single-process use.

pub mod pluggables;

pub mod mem_store;
