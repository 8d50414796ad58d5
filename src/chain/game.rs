/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Game`] handle: a single head commit, and the lifecycle operations that extend it.
//!
//! ```text
//! create ──▶ Challenge ──accept──▶ Acceptance ──confirm──▶ Confirmation ──step──▶ Step ──step──▶ ...
//! ```
//!
//! Each lifecycle operation checks its preconditions, signs exactly one new commit on top of the head,
//! and [validates](super::invariants::validate) the resulting chain before moving the head. If any of
//! these fails the head is left untouched.
//!
//! Signing a commit weaves its parent's hash into the signature data, so the head must be
//! [published](Game::publish) before the next operation can succeed.
//!
//! Every view (`challenge`, `steps`, `players`, ...) is computed by walking parent links from the head.

use std::{
    fmt::{self, Display, Formatter},
    iter,
    sync::Arc,
    time::Duration,
};

use thiserror::Error;

use crate::{
    object_store::pluggables::ObjectStore,
    persistence::LoadError,
    types::{
        basic::{GameId, ObjectHash, PlayerId, Timestamp},
        player::Player,
    },
};

use super::{
    commit::{Commit, CommitDraft, CommitError, CommitKind, Terms},
    invariants::{self, ValidationError},
    merge::MergeError,
};

/// A game session, identified by its head commit.
///
/// Cloning a `Game` is cheap: clones share every commit, and extending one clone never changes another.
#[derive(Clone, Debug)]
pub struct Game {
    head: Arc<Commit>,
}

impl Game {
    /// Start a new game with a signed Challenge by `challenger` that stands for `expires_in`.
    pub fn create(
        challenger: &Arc<Player>,
        expires_in: Duration,
        comment: impl Into<String>,
    ) -> Result<Game, GameError> {
        check_author(challenger, Role::Challenger)?;

        let now = Timestamp::now();
        let terms = Terms::new(timeout_after(now, expires_in)?, comment);
        let challenge = sign(CommitDraft::new(
            CommitKind::Challenge(terms),
            challenger.clone(),
            now,
            None,
        ))?;

        Game::with_head(Arc::new(challenge)).map_err(GameError::from)
    }

    /// Accept the challenge as `accepter`.
    pub fn accept(
        &mut self,
        accepter: &Arc<Player>,
        expires_in: Duration,
        comment: impl Into<String>,
    ) -> Result<(), GameError> {
        if self.acceptance().is_some() {
            return Err(PreconditionError::AlreadyAccepted.into());
        }
        check_author(accepter, Role::Accepter)?;

        let now = self.next_timestamp();
        let terms = Terms::new(timeout_after(now, expires_in)?, comment);
        self.advance(CommitDraft::new(
            CommitKind::ChallengeAcceptance(terms),
            accepter.clone(),
            now,
            Some(self.head.clone()),
        ))
    }

    /// Confirm the acceptance as `confirmer`, who must be the challenger.
    pub fn confirm(
        &mut self,
        confirmer: &Arc<Player>,
        expires_in: Duration,
        comment: impl Into<String>,
    ) -> Result<(), GameError> {
        if self.confirmation().is_some() {
            return Err(PreconditionError::AlreadyConfirmed.into());
        }
        if self.acceptance().is_none() {
            return Err(PreconditionError::NotAccepted.into());
        }
        check_author(confirmer, Role::Confirmer)?;

        let challenger = self.challenge().committer().id();
        if confirmer.id() != challenger {
            return Err(PreconditionError::NotChallenger {
                challenger: challenger.clone(),
                confirmer: confirmer.id().clone(),
            }
            .into());
        }

        let now = self.next_timestamp();
        let terms = Terms::new(timeout_after(now, expires_in)?, comment);
        self.advance(CommitDraft::new(
            CommitKind::ChallengeConfirmation(terms),
            confirmer.clone(),
            now,
            Some(self.head.clone()),
        ))
    }

    /// Append a move by `player`. Any player that can sign may move once the game is confirmed.
    pub fn step(&mut self, player: &Arc<Player>, data: &[u8]) -> Result<(), GameError> {
        if self.confirmation().is_none() {
            return Err(PreconditionError::NotConfirmed.into());
        }
        check_author(player, Role::Player)?;

        self.advance(CommitDraft::new(
            CommitKind::GameStep(data.to_vec()),
            player.clone(),
            self.next_timestamp(),
            Some(self.head.clone()),
        ))
    }

    /// Store every unpublished commit of the game in `store`, and return the head's hash.
    pub fn publish<S: ObjectStore>(&self, store: &S) -> Result<ObjectHash, GameError> {
        self.head.publish(store).map_err(|source| GameError::Commit {
            stage: Stage::Publish,
            source,
        })
    }

    /// Check the signature of every commit of the game, head first.
    pub fn verify(&self) -> Result<(), GameError> {
        self.chain().try_for_each(|commit| {
            commit.verify().map_err(|source| GameError::Commit {
                stage: Stage::Verify,
                source,
            })
        })
    }

    pub fn head(&self) -> &Arc<Commit> {
        &self.head
    }

    /// Get the id of the game, which is the id of its head.
    pub fn id(&self) -> GameId {
        self.head.id()
    }

    /// Get the timestamp of the head.
    pub fn timestamp(&self) -> Timestamp {
        self.head.timestamp()
    }

    /// Get the timeout of the latest negotiated terms, or `None` once moves have started.
    pub fn timeout(&self) -> Option<Timestamp> {
        self.head.timeout()
    }

    /// Get the root Challenge.
    pub fn challenge(&self) -> &Arc<Commit> {
        // Invariant: a Game always holds a validated chain, whose root is a Challenge.
        let mut root = &self.head;
        while let Some(parent) = root.parent() {
            root = parent;
        }
        root
    }

    pub fn acceptance(&self) -> Option<&Arc<Commit>> {
        self.find(|kind| matches!(kind, CommitKind::ChallengeAcceptance(_)))
    }

    pub fn confirmation(&self) -> Option<&Arc<Commit>> {
        self.find(|kind| matches!(kind, CommitKind::ChallengeConfirmation(_)))
    }

    /// Get the moves of the game, oldest first.
    pub fn steps(&self) -> Vec<Arc<Commit>> {
        let mut steps: Vec<Arc<Commit>> = self
            .chain()
            .take_while(|commit| matches!(commit.kind(), CommitKind::GameStep(_)))
            .cloned()
            .collect();
        steps.reverse();
        steps
    }

    /// Get every commit of the game, root first.
    pub fn commits(&self) -> Vec<Arc<Commit>> {
        let mut commits: Vec<Arc<Commit>> = self.chain().cloned().collect();
        commits.reverse();
        commits
    }

    /// Get the distinct committers of the game, in the order they first appear from the root.
    pub fn players(&self) -> Vec<Arc<Player>> {
        let mut players: Vec<Arc<Player>> = Vec::new();
        for commit in self.commits() {
            if !players.iter().any(|player| player.id() == commit.committer().id()) {
                players.push(commit.committer().clone());
            }
        }
        players
    }

    /// Number of commits in the game.
    pub fn len(&self) -> usize {
        self.chain().count()
    }

    /// Wrap a chain whose head is `head`, after validating it.
    pub(crate) fn with_head(head: Arc<Commit>) -> Result<Game, ValidationError> {
        invariants::validate(&head)?;
        Ok(Game { head })
    }

    /// Move the head to `head`. Callers must have validated the chain.
    pub(crate) fn set_head(&mut self, head: Arc<Commit>) {
        self.head = head;
    }

    /// Iterate from the head to the root.
    pub(crate) fn chain(&self) -> impl Iterator<Item = &Arc<Commit>> {
        iter::successors(Some(&self.head), |commit| commit.parent())
    }

    fn find(&self, predicate: impl Fn(&CommitKind) -> bool) -> Option<&Arc<Commit>> {
        self.chain().find(|commit| predicate(commit.kind()))
    }

    // New commits are strictly later than the head, even if the wall clock is not.
    fn next_timestamp(&self) -> Timestamp {
        Timestamp::now().max(self.head.timestamp().next_nanosecond())
    }

    fn advance(&mut self, draft: CommitDraft) -> Result<(), GameError> {
        let candidate = Arc::new(sign(draft)?);
        invariants::validate(&candidate)?;
        self.head = candidate;
        Ok(())
    }
}

fn sign(draft: CommitDraft) -> Result<Commit, GameError> {
    draft.sign().map_err(|source| GameError::Commit {
        stage: Stage::Sign,
        source,
    })
}

fn check_author(player: &Player, role: Role) -> Result<(), PreconditionError> {
    if player.id().is_empty() {
        return Err(PreconditionError::MissingPlayerId { role });
    }
    if player.private_key().is_none() {
        return Err(PreconditionError::MissingPrivateKey {
            role,
            player: player.id().clone(),
        });
    }
    Ok(())
}

fn timeout_after(now: Timestamp, expires_in: Duration) -> Result<Timestamp, PreconditionError> {
    now.checked_add(expires_in)
        .ok_or(PreconditionError::TimeoutOutOfRange { expires_in })
}

/// The part a player plays in a lifecycle operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Challenger,
    Accepter,
    Confirmer,
    Player,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Challenger => "challenger",
            Role::Accepter => "accepter",
            Role::Confirmer => "confirmer",
            Role::Player => "player",
        })
    }
}

/// The step of an operation that failed on a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Sign,
    Verify,
    Publish,
    MergeClone,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Sign => "sign",
            Stage::Verify => "verify",
            Stage::Publish => "publish",
            Stage::MergeClone => "merge-clone",
        })
    }
}

/// A lifecycle operation was called on a game, or by a player, that is not ready for it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("game has already been accepted")]
    AlreadyAccepted,

    #[error("game has already been confirmed")]
    AlreadyConfirmed,

    #[error("challenge has not been accepted yet")]
    NotAccepted,

    #[error("game has not been confirmed yet")]
    NotConfirmed,

    #[error("{role} has an empty id")]
    MissingPlayerId { role: Role },

    #[error("missing {role} private key for {player}")]
    MissingPrivateKey { role: Role, player: PlayerId },

    #[error("only the challenger ({challenger}) may confirm a challenge, not {confirmer}")]
    NotChallenger {
        challenger: PlayerId,
        confirmer: PlayerId,
    },

    #[error("a timeout {expires_in:?} from now is out of range")]
    TimeoutOutOfRange { expires_in: Duration },
}

/// Error from an operation on a [`Game`]. Whatever the error, the game's head is unchanged.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("failed to {stage} commit: {source}")]
    Commit {
        stage: Stage,
        #[source]
        source: CommitError,
    },

    #[error("game is not valid: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to merge games: {0}")]
    Merge(#[from] MergeError),

    #[error("failed to load game: {0}")]
    Load(#[from] LoadError),
}

impl GameError {
    /// Check whether this error reports two games with incompatible histories, rather than an integrity
    /// or backend failure.
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, GameError::Merge(error) if error.is_conflict())
    }
}
