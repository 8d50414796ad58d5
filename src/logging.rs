/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the keeper's
//! [config](crate::keeper::Configuration).
//!
//! ipgs_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [MergeGame](crate::events::MergeGameEvent) is printed:
//!
//! ```text
//! MergeGame, 1701329264, 3f9a0c1, 2
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the hash of the game's new head.
//! - The fourth value is the number of commits the merge appended.

use std::time::SystemTime;

use log;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const ADOPT_GAME: &str = "AdoptGame";
pub const MERGE_GAME: &str = "MergeGame";
pub const REJECT_GAME: &str = "RejectGame";
pub const PUBLISH_GAME: &str = "PublishGame";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for AdoptGameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |adopt_game_event: &AdoptGameEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ADOPT_GAME,
                secs_since_unix_epoch(adopt_game_event.timestamp),
                first_seven_chars(adopt_game_event.head.as_str()),
                adopt_game_event.length
            )
        };
        Box::new(logger)
    }
}

impl Logger for MergeGameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |merge_game_event: &MergeGameEvent| {
            log::info!(
                "{}, {}, {}, {}",
                MERGE_GAME,
                secs_since_unix_epoch(merge_game_event.timestamp),
                first_seven_chars(merge_game_event.head.as_str()),
                merge_game_event.appended
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectGameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_game_event: &RejectGameEvent| {
            log::warn!(
                "{}, {}, {}, {}",
                REJECT_GAME,
                secs_since_unix_epoch(reject_game_event.timestamp),
                reject_game_event.game,
                reject_game_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for PublishGameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |publish_game_event: &PublishGameEvent| {
            log::info!(
                "{}, {}, {}",
                PUBLISH_GAME,
                secs_since_unix_epoch(publish_game_event.timestamp),
                first_seven_chars(publish_game_event.head.as_str())
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a hash by taking its first 7 characters.
fn first_seven_chars(text: &str) -> String {
    text.chars().take(7).collect()
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
