/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signed, hash-linked commit chains for peer-to-peer, turn-based games.
//!
//! A game between players who do not trust each other is recorded as a chain of commits in a
//! content-addressed object store:
//!
//! ```text
//! Challenge ◀── Acceptance ◀── Confirmation ◀── Step ◀── Step ◀── ...
//! ```
//!
//! Every commit is signed by its committer over data that includes its parent's hash. Two players
//! (or one player's devices) can each extend their copy of a game, exchange head hashes, and
//! [merge](chain::merge) the copies as long as only one of them has moved on.
//!
//! ## Getting started
//!
//! 1. Implement [`ObjectStore`](object_store::pluggables::ObjectStore) for your storage backend, or
//!    use the in-memory [`MemStore`](object_store::mem_store::MemStore).
//! 2. Create the local [`Player`](types::player::Player) with
//!    [`Player::local`](types::player::Player::local).
//! 3. Play with [`Game`](chain::game::Game) directly, or hand games to a
//!    [`GameKeeper`](keeper::GameKeeper) that owns a game table on its own thread.

pub mod chain;

pub mod events;

pub(crate) mod event_bus;

pub mod keeper;

pub mod logging;

pub mod object_store;

pub mod persistence;

pub mod types;
