/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The game keeper: a thread that owns a player's table of games.
//!
//! [`Game`] has no internal locking, and two copies of a game must never be extended concurrently
//! without a merge in between. The keeper makes this structural: one thread owns the game table, and
//! everyone else talks to it over a channel through a [`GameKeeper`] handle:
//!
//! 1. [`checkout`](GameKeeper::checkout) a copy of a stored game,
//! 2. extend the copy locally (e.g., [`Game::step`]),
//! 3. [`checkin`](GameKeeper::checkin) the copy. The keeper publishes it to the object store, then
//!    either adopts it (a game it has not seen) or merges it into the stored game. A checkin that does
//!    not fast-forward the stored game is rejected, and the stored game stays as it was.
//!
//! Games received from peers as a head hash go through [`fetch`](GameKeeper::fetch), which loads the
//! chain from the object store and checks it in.
//!
//! Games are keyed by the id of their root Challenge, so two different acceptances of the same
//! challenge are the same game to the keeper, and the second is rejected as divergent.
//!
//! ## Starting a keeper
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use ipgs_rs::{keeper::{Configuration, GameKeeperSpec}, object_store::mem_store::MemStore};
//! # use ipgs_rs::types::player::{Player, PrivateKey};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemStore::new();
//! let me = Arc::new(Player::local(PrivateKey::generate(), &store)?);
//! let configuration = Configuration::builder()
//!     .me(me)
//!     .log_events(true)
//!     .build();
//!
//! let keeper = GameKeeperSpec::builder()
//!     .store(store)
//!     .configuration(configuration)
//!     .on_merge_game(|event| println!("{} moved forward by {}", event.game, event.appended))
//!     .build()
//!     .start();
//! # Ok(())
//! # }
//! ```
//!
//! Dropping the [`GameKeeper`] stops its threads.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::SystemTime,
};

use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::{
    chain::{
        game::{Game, GameError},
        merge::MergeOutcome,
    },
    event_bus::{start_event_bus, EventHandlers, HandlerPtr},
    events::*,
    object_store::pluggables::ObjectStore,
    types::{
        basic::{GameId, ObjectHash},
        player::{Player, PlayerRoster},
    },
};

/// Parameters that define the behavior of a game keeper.
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.log_events(...)`

    Optional:
    - `.known_players(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the local operator's player, which must hold a private key. Required."))]
    pub me: Arc<Player>,
    #[builder(default, setter(doc = "Set the players to resolve committers against when fetching games. Optional."))]
    pub known_players: PlayerRoster,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run a [GameKeeper].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [GameKeeperSpec]. On the builder call the following methods to construct a valid [GameKeeperSpec].

    Required:
    - `.store(...)`
    - `.configuration(...)`

    Optional:
    - `.on_adopt_game(...)`
    - `.on_merge_game(...)`
    - `.on_reject_game(...)`
    - `.on_publish_game(...)`
"))]
pub struct GameKeeperSpec<S: ObjectStore + Send + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the object store games are published to and fetched from. Required."))]
    store: S,
    #[builder(setter(doc = "Set the [configuration](Configuration) of the keeper. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&AdoptGameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AdoptGameEvent>),
    doc = "Register a handler closure to be invoked after a new game is added to the game table. Optional."))]
    on_adopt_game: Option<HandlerPtr<AdoptGameEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&MergeGameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<MergeGameEvent>),
    doc = "Register a handler closure to be invoked after a stored game is fast-forwarded. Optional."))]
    on_merge_game: Option<HandlerPtr<MergeGameEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectGameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectGameEvent>),
    doc = "Register a handler closure to be invoked after a checked-in or fetched game is rejected. Optional."))]
    on_reject_game: Option<HandlerPtr<RejectGameEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PublishGameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PublishGameEvent>),
    doc = "Register a handler closure to be invoked after a checked-in game is published. Optional."))]
    on_publish_game: Option<HandlerPtr<PublishGameEvent>>,
}

impl<S: ObjectStore + Send + 'static> GameKeeperSpec<S> {
    /// Starts the keeper thread (and the event bus thread, if any handlers are registered), and returns
    /// a handle to them.
    pub fn start(self) -> GameKeeper {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_adopt_game,
            self.on_merge_game,
            self.on_reject_game,
            self.on_publish_game,
        );

        let (event_publisher, event_bus) = if event_handlers.is_empty() {
            (None, None)
        } else {
            let (event_publisher, event_subscriber) = mpsc::channel();
            (
                Some(event_publisher),
                Some(start_event_bus(event_handlers, event_subscriber)),
            )
        };

        let me = self.configuration.me.clone();
        let keeper = Keeper {
            store: self.store,
            me: self.configuration.me,
            known_players: self.configuration.known_players,
            games: HashMap::new(),
            event_publisher,
        };
        let (requests, request_receiver) = mpsc::channel();
        let keeper = thread::spawn(move || keeper.run(request_receiver));

        GameKeeper {
            me,
            requests,
            keeper: Some(keeper),
            event_bus,
        }
    }
}

/// A handle to the background threads of a game keeper. When this value is dropped, all background
/// threads are gracefully shut down.
pub struct GameKeeper {
    me: Arc<Player>,
    requests: Sender<Request>,
    keeper: Option<JoinHandle<()>>,
    event_bus: Option<JoinHandle<()>>,
}

impl GameKeeper {
    /// Get the local operator's player.
    pub fn me(&self) -> &Arc<Player> {
        &self.me
    }

    /// Get a copy of the stored game with `id`, which may be either the id of its challenge or its
    /// current id.
    pub fn checkout(&self, id: &GameId) -> Result<Option<Game>, KeeperError> {
        self.request(|reply| Request::Checkout {
            id: id.clone(),
            reply,
        })
    }

    /// Publish `game` and add it to the game table, merging it into the stored copy if there is one.
    /// Returns the stored game afterwards.
    pub fn checkin(&self, game: Game) -> Result<Game, KeeperError> {
        Ok(self.request(|reply| Request::Checkin { game, reply })??)
    }

    /// Load the game whose head is stored under `head` and check it in.
    pub fn fetch(&self, head: &ObjectHash) -> Result<Game, KeeperError> {
        Ok(self.request(|reply| Request::Fetch {
            head: head.clone(),
            reply,
        })??)
    }

    /// Get the current ids of every stored game, sorted.
    pub fn game_ids(&self) -> Result<Vec<GameId>, KeeperError> {
        self.request(|reply| Request::GameIds { reply })
    }

    fn request<T>(&self, request: impl FnOnce(Sender<T>) -> Request) -> Result<T, KeeperError> {
        let (reply, response) = mpsc::channel();
        self.requests
            .send(request(reply))
            .map_err(|_| KeeperError::Disconnected)?;
        response.recv().map_err(|_| KeeperError::Disconnected)
    }
}

impl Drop for GameKeeper {
    fn drop(&mut self) {
        // The event bus stops once the keeper thread, its only publisher, has exited.
        let _ = self.requests.send(Request::Shutdown);
        if let Some(keeper) = self.keeper.take() {
            let _ = keeper.join();
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}

/// Error when talking to a [GameKeeper].
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("the game keeper thread has stopped")]
    Disconnected,

    #[error(transparent)]
    Game(#[from] GameError),
}

enum Request {
    Checkout {
        id: GameId,
        reply: Sender<Option<Game>>,
    },
    Checkin {
        game: Game,
        reply: Sender<Result<Game, GameError>>,
    },
    Fetch {
        head: ObjectHash,
        reply: Sender<Result<Game, GameError>>,
    },
    GameIds {
        reply: Sender<Vec<GameId>>,
    },
    Shutdown,
}

struct Keeper<S: ObjectStore> {
    store: S,
    me: Arc<Player>,
    known_players: PlayerRoster,
    games: HashMap<GameId, Game>,
    event_publisher: Option<Sender<Event>>,
}

impl<S: ObjectStore> Keeper<S> {
    fn run(mut self, requests: Receiver<Request>) {
        // A failed reply means the requester gave up waiting, which does not concern the keeper.
        while let Ok(request) = requests.recv() {
            match request {
                Request::Checkout { id, reply } => {
                    let _ = reply.send(self.checkout(&id));
                }
                Request::Checkin { game, reply } => {
                    let _ = reply.send(self.checkin(game));
                }
                Request::Fetch { head, reply } => {
                    let _ = reply.send(self.fetch(&head));
                }
                Request::GameIds { reply } => {
                    let mut ids: Vec<GameId> = self.games.values().map(Game::id).collect();
                    ids.sort();
                    let _ = reply.send(ids);
                }
                Request::Shutdown => return,
            }
        }
    }

    fn checkout(&self, id: &GameId) -> Option<Game> {
        self.games
            .get(id)
            .or_else(|| self.games.values().find(|game| &game.id() == id))
            .cloned()
    }

    fn checkin(&mut self, game: Game) -> Result<Game, GameError> {
        let key = game.challenge().id();
        let result = self.store_game(key, game.clone());
        if let Err(error) = &result {
            Event::publish(
                &self.event_publisher,
                Event::RejectGame(RejectGameEvent {
                    timestamp: SystemTime::now(),
                    game: game.id(),
                    reason: error.to_string(),
                }),
            );
        }
        result
    }

    fn store_game(&mut self, key: GameId, game: Game) -> Result<Game, GameError> {
        let head = game.publish(&self.store)?;
        Event::publish(
            &self.event_publisher,
            Event::PublishGame(PublishGameEvent {
                timestamp: SystemTime::now(),
                game: game.id(),
                head: head.clone(),
            }),
        );

        match self.games.get_mut(&key) {
            None => {
                Event::publish(
                    &self.event_publisher,
                    Event::AdoptGame(AdoptGameEvent {
                        timestamp: SystemTime::now(),
                        game: game.id(),
                        head,
                        length: game.len(),
                    }),
                );
                self.games.insert(key, game.clone());
                Ok(game)
            }
            Some(stored) => {
                if let MergeOutcome::FastForwarded { appended } = stored.merge(&game)? {
                    Event::publish(
                        &self.event_publisher,
                        Event::MergeGame(MergeGameEvent {
                            timestamp: SystemTime::now(),
                            game: stored.id(),
                            head,
                            appended,
                        }),
                    );
                }
                Ok(stored.clone())
            }
        }
    }

    fn fetch(&mut self, head: &ObjectHash) -> Result<Game, GameError> {
        let mut roster = self.known_players.clone();
        roster.extend(
            self.games
                .values()
                .flat_map(|game| game.players())
                .collect::<Vec<_>>(),
        );
        roster.insert(self.me.clone());

        let game = Game::fetch(head, &self.store, &roster);
        match game {
            Ok(game) => self.checkin(game),
            Err(error) => {
                Event::publish(
                    &self.event_publisher,
                    Event::RejectGame(RejectGameEvent {
                        timestamp: SystemTime::now(),
                        game: GameId::new(head.as_str()),
                        reason: error.to_string(),
                    }),
                );
                Err(error)
            }
        }
    }
}
