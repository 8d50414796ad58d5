use std::{sync::Arc, time::Duration};

use ed25519_dalek::SigningKey;
use ipgs_rs::{
    chain::game::Game,
    object_store::mem_store::MemStore,
    types::player::{Player, PlayerRoster, PrivateKey},
};
use rand_core::OsRng;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(5 * 60 * 60);

// Create `n` local players whose public keys are published to `store`.
pub(crate) fn players(store: &MemStore, n: usize) -> Vec<Arc<Player>> {
    (0..n)
        .map(|_| {
            let private_key = PrivateKey::new(SigningKey::generate(&mut OsRng));
            Arc::new(Player::local(private_key, store).unwrap())
        })
        .collect()
}

pub(crate) fn roster(players: &[Arc<Player>]) -> PlayerRoster {
    players.iter().cloned().collect()
}

// A published game challenged by `challenger`, accepted by `accepter` and confirmed.
pub(crate) fn confirmed_game(
    store: &MemStore,
    challenger: &Arc<Player>,
    accepter: &Arc<Player>,
) -> Game {
    let mut game = Game::create(challenger, TIMEOUT, "test game").unwrap();
    game.publish(store).unwrap();
    game.accept(accepter, TIMEOUT, "lets go").unwrap();
    game.publish(store).unwrap();
    game.confirm(challenger, TIMEOUT, "go").unwrap();
    game.publish(store).unwrap();
    game
}

// Append a step and publish it.
pub(crate) fn step(store: &MemStore, game: &mut Game, player: &Arc<Player>, data: &[u8]) {
    game.step(player, data).unwrap();
    game.publish(store).unwrap();
}

pub(crate) fn moves(game: &Game) -> Vec<Vec<u8>> {
    game.steps()
        .iter()
        .map(|step| step.data().unwrap().to_vec())
        .collect()
}
