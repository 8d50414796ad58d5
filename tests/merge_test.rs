/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests of fast-forward merging between independently extended copies of a game.

mod common;

use std::sync::{Arc, Mutex};

use ipgs_rs::{
    chain::{
        commit::CommitError,
        game::{Game, GameError, Stage},
        merge::{MergeError, MergeOutcome, Side},
    },
    object_store::{
        mem_store::MemStore,
        pluggables::{ObjectStore, StoreError, StoreObject},
    },
    persistence::objects::COMMITTER_PUBLIC_KEY_LINK,
    types::basic::ObjectHash,
};

use common::players::{confirmed_game, moves, players, step, TIMEOUT};

#[test]
fn fast_forward_then_no_op() {
    let store = MemStore::new();
    let pls = players(&store, 3);

    let mut g = Game::create(&pls[0], TIMEOUT, "test game").unwrap();
    g.publish(&store).unwrap();

    let mut o = g.clone();
    o.accept(&pls[1], TIMEOUT, "lets go").unwrap();
    o.publish(&store).unwrap();
    o.confirm(&pls[0], TIMEOUT, "go").unwrap();
    o.publish(&store).unwrap();
    step(&store, &mut o, &pls[1], b"move-1");

    assert_eq!(g.merge(&o).unwrap(), MergeOutcome::FastForwarded { appended: 3 });
    assert_eq!(g.head().hash(), o.head().hash());
    assert_eq!(g.id(), o.id());
    assert_eq!(moves(&g), vec![b"move-1".to_vec()]);
    // The merged commits are copies re-parented onto g's own chain.
    assert!(!Arc::ptr_eq(g.acceptance().unwrap(), o.acceptance().unwrap()));
    assert!(!Arc::ptr_eq(g.head(), o.head()));
    assert!(Arc::ptr_eq(g.challenge(), o.challenge()));
    assert!(g.verify().is_ok());

    let head = g.head().clone();
    assert_eq!(g.merge(&o).unwrap(), MergeOutcome::UpToDate);
    assert!(Arc::ptr_eq(g.head(), &head));
}

#[test]
fn divergent_acceptances_are_rejected() {
    let store = MemStore::new();
    let pls = players(&store, 3);

    let mut g = Game::create(&pls[0], TIMEOUT, "").unwrap();
    g.publish(&store).unwrap();
    let mut o2 = g.clone();

    g.accept(&pls[1], TIMEOUT, "lets go").unwrap();
    g.publish(&store).unwrap();
    o2.accept(&pls[2], TIMEOUT, "lets go too").unwrap();
    o2.publish(&store).unwrap();

    let head = g.head().clone();
    let error = g.merge(&o2).unwrap_err();
    assert!(error.is_merge_conflict());
    assert!(matches!(
        error,
        GameError::Merge(MergeError::Diverged {
            common_length: 1,
            ours: 1,
            theirs: 1
        })
    ));
    assert!(Arc::ptr_eq(g.head(), &head));
    assert_eq!(g.head().hash(), head.hash());
}

#[test]
fn unrelated_games_do_not_merge() {
    let store = MemStore::new();
    let pls = players(&store, 1);

    let mut g = Game::create(&pls[0], TIMEOUT, "one").unwrap();
    g.publish(&store).unwrap();
    let mut x = Game::create(&pls[0], TIMEOUT, "two").unwrap();
    x.publish(&store).unwrap();

    let error = g.merge(&x).unwrap_err();
    assert!(matches!(error, GameError::Merge(MergeError::NoCommonHistory)));
    assert!(error.is_merge_conflict());
}

#[test]
fn unpublished_games_do_not_merge() {
    let store = MemStore::new();
    let pls = players(&store, 2);

    let mut g = Game::create(&pls[0], TIMEOUT, "").unwrap();
    let o = g.clone();
    assert!(matches!(
        g.merge(&o),
        Err(GameError::Merge(MergeError::Unpublished {
            side: Side::Ours,
            position: 0,
            ..
        }))
    ));

    g.publish(&store).unwrap();
    let mut o = g.clone();
    o.accept(&pls[1], TIMEOUT, "").unwrap();
    let error = g.merge(&o).unwrap_err();
    assert!(matches!(
        error,
        GameError::Merge(MergeError::Unpublished {
            side: Side::Theirs,
            position: 1,
            ..
        })
    ));
    assert!(!error.is_merge_conflict());
}

#[test]
fn stale_copies_are_up_to_date() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let mut g = confirmed_game(&store, &pls[0], &pls[1]);
    let stale = g.clone();
    step(&store, &mut g, &pls[0], b"move 1");

    let head = g.head().clone();
    assert_eq!(g.merge(&stale).unwrap(), MergeOutcome::UpToDate);
    assert!(Arc::ptr_eq(g.head(), &head));
}

#[test]
fn steps_fast_forward_and_play_continues() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let mut g = confirmed_game(&store, &pls[0], &pls[1]);
    step(&store, &mut g, &pls[0], b"move 1");

    let mut o = g.clone();
    step(&store, &mut o, &pls[1], b"move 2");
    step(&store, &mut o, &pls[0], b"move 3");

    assert_eq!(g.merge(&o).unwrap(), MergeOutcome::FastForwarded { appended: 2 });
    assert!(g.verify().is_ok());

    step(&store, &mut g, &pls[1], b"move 4");
    assert_eq!(
        moves(&g),
        vec![
            b"move 1".to_vec(),
            b"move 2".to_vec(),
            b"move 3".to_vec(),
            b"move 4".to_vec()
        ]
    );

    // Meanwhile o moved on differently: o and g have now diverged.
    step(&store, &mut o, &pls[1], b"move 4'");
    assert!(g.merge(&o).unwrap_err().is_merge_conflict());
}

// A store that answers the next commit it is given with a chosen hash instead of the real one.
struct CollidingStore {
    inner: MemStore,
    next_commit_hash: Mutex<Option<ObjectHash>>,
}

impl ObjectStore for CollidingStore {
    fn put(&self, bytes: &[u8]) -> Result<ObjectHash, StoreError> {
        self.inner.put(bytes)
    }

    fn get(&self, hash: &ObjectHash) -> Result<Vec<u8>, StoreError> {
        self.inner.get(hash)
    }

    fn put_object(&self, object: &StoreObject) -> Result<ObjectHash, StoreError> {
        let hash = self.inner.put_object(object)?;
        if object.link(COMMITTER_PUBLIC_KEY_LINK).is_none() {
            return Ok(hash);
        }
        let forged = self
            .next_commit_hash
            .lock()
            .map_err(|_| StoreError::Backend("poisoned".to_string()))?
            .take();
        Ok(forged.unwrap_or(hash))
    }

    fn get_object(&self, hash: &ObjectHash) -> Result<StoreObject, StoreError> {
        self.inner.get_object(hash)
    }
}

#[test]
fn copies_are_reverified_on_their_new_parent() {
    let store = MemStore::new();
    let pls = players(&store, 3);

    let mut g = Game::create(&pls[0], TIMEOUT, "").unwrap();
    let challenge_hash = g.publish(&store).unwrap();

    // A different challenge published under g's challenge hash, then accepted.
    let colliding = CollidingStore {
        inner: store.clone(),
        next_commit_hash: Mutex::new(Some(challenge_hash.clone())),
    };
    let mut o = Game::create(&pls[2], TIMEOUT, "").unwrap();
    assert_eq!(o.publish(&colliding).unwrap(), challenge_hash);
    o.accept(&pls[1], TIMEOUT, "").unwrap();
    o.publish(&colliding).unwrap();

    let head = g.head().clone();
    assert!(matches!(
        g.merge(&o),
        Err(GameError::Commit {
            stage: Stage::MergeClone,
            source: CommitError::BadSignature { .. },
        })
    ));
    assert!(Arc::ptr_eq(g.head(), &head));
    assert!(g.acceptance().is_none());
}
