/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests of the game lifecycle: the handshake, moves, derived ids and who may do what.

mod common;

use std::sync::Arc;

use ipgs_rs::{
    chain::{
        commit::CommitKind,
        game::{Game, GameError, PreconditionError, Role},
    },
    object_store::mem_store::MemStore,
    types::player::Player,
};

use common::players::{confirmed_game, moves, players, step, TIMEOUT};

#[test]
fn lifecycle_scenario() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let (p1, p2) = (&pls[0], &pls[1]);

    let mut game = Game::create(p1, TIMEOUT, "test game").unwrap();
    let challenge = game.challenge().clone();
    let challenge_id = format!("{}|{}", p1.id(), challenge.timestamp().rfc3339_nano());
    assert_eq!(game.id().as_str(), challenge_id);
    assert_eq!(challenge.comment(), Some("test game"));
    assert_eq!(
        challenge.timeout(),
        challenge.timestamp().checked_add(TIMEOUT)
    );
    game.publish(&store).unwrap();

    game.accept(p2, TIMEOUT, "lets go").unwrap();
    let game_id = format!("{}|{}", challenge_id, p2.id());
    assert_eq!(game.id().as_str(), game_id);
    game.publish(&store).unwrap();

    game.confirm(p1, TIMEOUT, "go").unwrap();
    assert_eq!(game.id().as_str(), game_id);
    game.publish(&store).unwrap();

    step(&store, &mut game, p1, b"move-1");
    step(&store, &mut game, p2, b"move-2");

    assert_eq!(moves(&game), vec![b"move-1".to_vec(), b"move-2".to_vec()]);
    let steps = game.steps();
    assert!(steps[0].timestamp() < steps[1].timestamp());
    assert_eq!(steps[0].committer().id(), p1.id());
    assert!(Arc::ptr_eq(steps[0].parent().unwrap(), game.confirmation().unwrap()));
    assert!(Arc::ptr_eq(steps[1].parent().unwrap(), &steps[0]));
}

#[test]
fn id_is_stable_after_acceptance() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let mut game = confirmed_game(&store, &pls[0], &pls[1]);
    for i in 0..4u8 {
        step(&store, &mut game, &pls[(i % 2) as usize], &[i]);
    }

    let acceptance_id = game.acceptance().unwrap().id();
    assert_eq!(game.id(), acceptance_id);
    for commit in game.commits().iter().skip(1) {
        assert_eq!(commit.id(), acceptance_id);
    }
    assert_ne!(game.challenge().id(), acceptance_id);
    assert_eq!(game.commits().len(), 7);
}

#[test]
fn only_the_challenger_may_confirm() {
    let store = MemStore::new();
    let pls = players(&store, 3);

    let mut game = Game::create(&pls[0], TIMEOUT, "").unwrap();
    game.publish(&store).unwrap();
    game.accept(&pls[1], TIMEOUT, "").unwrap();
    game.publish(&store).unwrap();
    let head = game.head().clone();

    for outsider in [&pls[1], &pls[2]] {
        let error = game.confirm(outsider, TIMEOUT, "").unwrap_err();
        assert!(matches!(
            error,
            GameError::Precondition(PreconditionError::NotChallenger { .. })
        ));
        assert!(Arc::ptr_eq(game.head(), &head));
    }

    game.confirm(&pls[0], TIMEOUT, "").unwrap();
    assert!(matches!(
        game.confirm(&pls[0], TIMEOUT, ""),
        Err(GameError::Precondition(PreconditionError::AlreadyConfirmed))
    ));
}

#[test]
fn any_player_may_step_once_confirmed() {
    let store = MemStore::new();
    let pls = players(&store, 3);
    let mut game = confirmed_game(&store, &pls[0], &pls[1]);

    step(&store, &mut game, &pls[2], b"barging-in");

    assert_eq!(moves(&game), vec![b"barging-in".to_vec()]);
    assert_eq!(game.players().len(), 3);
}

#[test]
fn remote_players_cannot_author_commits() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let mut game = confirmed_game(&store, &pls[0], &pls[1]);
    let remote = Arc::new(pls[1].to_remote());

    let error = game.step(&remote, b"x").unwrap_err();
    assert_eq!(
        error.to_string(),
        format!("missing player private key for {}", pls[1].id())
    );
    assert!(matches!(
        error,
        GameError::Precondition(PreconditionError::MissingPrivateKey {
            role: Role::Player,
            ..
        })
    ));
}

#[test]
fn players_need_an_id() {
    let store = MemStore::new();
    let pls = players(&store, 1);
    let anonymous = Arc::new(Player::new(
        ipgs_rs::types::player::PublicKey::new(*pls[0].key().key(), Default::default()),
        pls[0].private_key().cloned(),
    ));

    assert!(matches!(
        Game::create(&anonymous, TIMEOUT, ""),
        Err(GameError::Precondition(PreconditionError::MissingPlayerId {
            role: Role::Challenger
        }))
    ));
}

#[test]
fn accessors_return_copies() {
    let store = MemStore::new();
    let pls = players(&store, 2);
    let mut game = confirmed_game(&store, &pls[0], &pls[1]);
    step(&store, &mut game, &pls[0], b"e4");
    let head = game.head().clone();

    let mut signature = head.signature().bytes();
    signature[0] ^= 0xff;
    assert_ne!(head.signature().bytes(), signature);

    let mut data = head.data().unwrap().to_vec();
    data[0] = b'x';
    assert_eq!(head.data(), Some(&b"e4"[..]));

    assert!(head.verify().is_ok());
    assert!(game.verify().is_ok());
}

#[test]
fn timeout_follows_the_latest_terms() {
    let store = MemStore::new();
    let pls = players(&store, 2);

    let mut game = Game::create(&pls[0], TIMEOUT, "").unwrap();
    assert_eq!(game.timeout(), game.challenge().timeout());
    game.publish(&store).unwrap();
    game.accept(&pls[1], TIMEOUT * 2, "").unwrap();
    assert_eq!(game.timeout(), game.acceptance().unwrap().timeout());
    assert!(game.timeout() > game.challenge().timeout());
    game.publish(&store).unwrap();
    game.confirm(&pls[0], TIMEOUT, "").unwrap();
    assert_eq!(game.timeout(), game.confirmation().unwrap().timeout());
    game.publish(&store).unwrap();

    step(&store, &mut game, &pls[0], b"1");
    assert_eq!(game.timeout(), None);
    assert!(matches!(game.head().kind(), CommitKind::GameStep(_)));
}
