/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by a [game keeper](crate::keeper::GameKeeper), for event handling
//! and logging.
//!
//! An event for a given action indicates that the action has been completed.

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::types::basic::{GameId, ObjectHash};

pub enum Event {
    // Events that change the game table.
    AdoptGame(AdoptGameEvent),
    MergeGame(MergeGameEvent),
    RejectGame(RejectGameEvent),
    // Events that write to the object store.
    PublishGame(PublishGameEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only stops after every publisher is dropped, so this cannot fail while the
            // keeper runs.
            let _ = event_publisher.send(event);
        }
    }
}

/// A game the keeper had not seen before was added to its game table.
pub struct AdoptGameEvent {
    pub timestamp: SystemTime,
    pub game: GameId,
    pub head: ObjectHash,
    pub length: usize,
}

/// A stored game was fast-forwarded by merging a checked-in copy.
pub struct MergeGameEvent {
    pub timestamp: SystemTime,
    pub game: GameId,
    pub head: ObjectHash,
    pub appended: usize,
}

/// A checked-in or fetched game was refused. The stored copy, if any, is unchanged.
pub struct RejectGameEvent {
    pub timestamp: SystemTime,
    pub game: GameId,
    pub reason: String,
}

/// The commits of a checked-in game were written to the object store.
pub struct PublishGameEvent {
    pub timestamp: SystemTime,
    pub game: GameId,
    pub head: ObjectHash,
}
