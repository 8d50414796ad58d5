/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Game chains: signed commits, the games built from them, and the rules that keep them consistent.
//!
//! A game is a chain of [commits](commit::Commit) that starts with a Challenge, is accepted by a second
//! player, confirmed by the challenger, and then grows one move at a time. Every commit is signed by
//! its committer over data that includes its parent's hash, so a chain cannot be altered without
//! invalidating the signatures of everything after the altered commit.
//!
//! The modules:
//! - `signing`: the bytes each kind of commit signs.
//! - [`commit`]: commit kinds, drafts and sealed commits.
//! - [`game`]: the [`Game`](game::Game) handle and its lifecycle operations.
//! - [`invariants`]: the shape every chain must have.
//! - [`merge`]: fast-forward merging of two copies of a game.

pub mod commit;

pub mod game;

pub mod invariants;

pub mod merge;

pub(crate) mod signing;
