/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Fast-forward merging of two copies of the same game.
//!
//! Two [`Game`]s obtained independently (e.g., one built locally and one fetched from a peer) are
//! compared by the hashes of their commits, root first. Merging `other` into `self`:
//!
//! 1. Fails if any commit on either side is unpublished.
//! 2. Fails with [`MergeError::NoCommonHistory`] if the roots differ.
//! 3. Is a no-op if `other` has nothing past the common prefix.
//! 4. Fails with [`MergeError::Diverged`] if both sides have commits past the common prefix.
//! 5. Otherwise copies `other`'s new commits onto `self`'s chain one by one, checking that each copy
//!    may follow its new parent and that its signature still verifies there, then validates the
//!    resulting chain.
//!
//! A merge is all-or-nothing: `self`'s head only moves once every check has passed.

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use thiserror::Error;

use crate::types::basic::GameId;

use super::{
    commit::{Commit, CommitKind},
    game::{Game, GameError, Stage},
    invariants,
};

/// What a successful merge did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The other game had nothing new.
    UpToDate,

    /// The head moved forward by `appended` commits.
    FastForwarded { appended: usize },
}

impl Game {
    /// Merge `other` into this game. See the [module-level docs](self).
    pub fn merge(&mut self, other: &Game) -> Result<MergeOutcome, GameError> {
        let ours = self.commits();
        let theirs = other.commits();
        require_published(&ours, Side::Ours)?;
        require_published(&theirs, Side::Theirs)?;

        let common_length = ours
            .iter()
            .zip(theirs.iter())
            .take_while(|(our, their)| our.hash() == their.hash())
            .count();
        if common_length == 0 {
            return Err(MergeError::NoCommonHistory.into());
        }

        let our_tail = &ours[common_length..];
        let their_tail = &theirs[common_length..];
        if their_tail.is_empty() {
            return Ok(MergeOutcome::UpToDate);
        }
        if !our_tail.is_empty() {
            return Err(MergeError::Diverged {
                common_length,
                ours: our_tail.len(),
                theirs: their_tail.len(),
            }
            .into());
        }

        let mut head = ours[common_length - 1].clone();
        for commit in their_tail {
            check_attachable(commit, &head)?;

            let copy = commit.reparent(head);
            copy.verify().map_err(|source| GameError::Commit {
                stage: Stage::MergeClone,
                source,
            })?;
            head = Arc::new(copy);
        }
        invariants::validate(&head)?;

        self.set_head(head);
        Ok(MergeOutcome::FastForwarded {
            appended: their_tail.len(),
        })
    }
}

fn require_published(commits: &[Arc<Commit>], side: Side) -> Result<(), MergeError> {
    match commits
        .iter()
        .position(|commit| !commit.is_published())
    {
        Some(position) => Err(MergeError::Unpublished {
            side,
            position,
            id: commits[position].id(),
        }),
        None => Ok(()),
    }
}

fn check_attachable(commit: &Commit, parent: &Commit) -> Result<(), MergeError> {
    if matches!(commit.kind(), CommitKind::Challenge(_)) {
        return Err(MergeError::ChallengeInTail);
    }
    if !commit.kind().may_follow(Some(parent.kind())) {
        return Err(MergeError::IncompatibleParent {
            commit_type: commit.commit_type(),
            parent_type: parent.commit_type(),
        });
    }
    Ok(())
}

/// Which of the two games being merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Ours,
    Theirs,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Ours => "this",
            Side::Theirs => "the other",
        })
    }
}

/// Error when merging two games.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("commit {position} of {side} game ({id}) has not been published")]
    Unpublished {
        side: Side,
        position: usize,
        id: GameId,
    },

    #[error("the games do not share a common history")]
    NoCommonHistory,

    #[error("the games have diverged after {common_length} common commits ({ours} commits here, {theirs} there)")]
    Diverged {
        common_length: usize,
        ours: usize,
        theirs: usize,
    },

    #[error("found a challenge after the common history; copy the game instead of merging it")]
    ChallengeInTail,

    #[error("a {commit_type} commit cannot follow a {parent_type} commit")]
    IncompatibleParent {
        commit_type: &'static str,
        parent_type: &'static str,
    },
}

impl MergeError {
    /// Check whether the two games have incompatible histories, as opposed to one of them being
    /// unpublished or malformed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MergeError::NoCommonHistory | MergeError::Diverged { .. })
    }
}
