/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which runs the handlers registered for each kind of [event](crate::events).

use std::{
    sync::mpsc::Receiver,
    thread::{self, JoinHandle},
};

use crate::{events::*, logging::Logger};

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) adopt_game_handlers: Vec<HandlerPtr<AdoptGameEvent>>,
    pub(crate) merge_game_handlers: Vec<HandlerPtr<MergeGameEvent>>,
    pub(crate) reject_game_handlers: Vec<HandlerPtr<RejectGameEvent>>,
    pub(crate) publish_game_handlers: Vec<HandlerPtr<PublishGameEvent>>,
}

impl EventHandlers {
    /// Collect the user's handlers, adding the default loggers in front of them if `log_events` is set.
    pub(crate) fn new(
        log_events: bool,
        on_adopt_game: Option<HandlerPtr<AdoptGameEvent>>,
        on_merge_game: Option<HandlerPtr<MergeGameEvent>>,
        on_reject_game: Option<HandlerPtr<RejectGameEvent>>,
        on_publish_game: Option<HandlerPtr<PublishGameEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(
            log_events: bool,
            handler: Option<HandlerPtr<T>>,
        ) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(handler);
            handlers
        }

        EventHandlers {
            adopt_game_handlers: handlers(log_events, on_adopt_game),
            merge_game_handlers: handlers(log_events, on_merge_game),
            reject_game_handlers: handlers(log_events, on_reject_game),
            publish_game_handlers: handlers(log_events, on_publish_game),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.adopt_game_handlers.is_empty()
            && self.merge_game_handlers.is_empty()
            && self.reject_game_handlers.is_empty()
            && self.publish_game_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::AdoptGame(adopt_game_event) => self
                .adopt_game_handlers
                .iter()
                .for_each(|handler| handler(&adopt_game_event)),

            Event::MergeGame(merge_game_event) => self
                .merge_game_handlers
                .iter()
                .for_each(|handler| handler(&merge_game_event)),

            Event::RejectGame(reject_game_event) => self
                .reject_game_handlers
                .iter()
                .for_each(|handler| handler(&reject_game_event)),

            Event::PublishGame(publish_game_event) => self
                .publish_game_handlers
                .iter()
                .for_each(|handler| handler(&publish_game_event)),
        }
    }
}

/// Start the event bus thread. It stops once every publisher of `event_subscriber` has been dropped and
/// every event they sent has been handled.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(event) = event_subscriber.recv() {
            event_handlers.fire_handlers(event)
        }
    })
}
