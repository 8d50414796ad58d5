/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules that every game chain must satisfy.
//!
//! # Chain shape
//!
//! Reading a chain from its root, the commit at position:
//! - 0 is a Challenge,
//! - 1 (if present) is a Challenge Acceptance,
//! - 2 (if present) is a Challenge Confirmation,
//! - 3 and beyond (if present) are Game Steps.
//!
//! # Confirmation authority
//!
//! If the chain has a Challenge Confirmation, its committer is the committer of the Challenge. Only the
//! player who issued the offer may agree to play against the accepter.
//!
//! # Where these are checked
//!
//! [`validate`] runs against the candidate head every time a [`Game`](super::game::Game) would move to
//! a new head: after every lifecycle operation, after a merge, and when a chain is rebuilt from the
//! object store or a JSON file. A failed check leaves the game's head where it was.
//!
//! Signatures are checked separately, by [`Commit::verify`](super::commit::Commit::verify).

use thiserror::Error;

use crate::types::basic::PlayerId;

use super::commit::{
    Commit, CommitKind, CHALLENGE_ACCEPTANCE_TYPE, CHALLENGE_CONFIRMATION_TYPE, CHALLENGE_TYPE,
    GAME_STEP_TYPE,
};

/// Check the chain ending at `head` against the rules in the [module-level docs](self).
pub fn validate(head: &Commit) -> Result<(), ValidationError> {
    let mut chain: Vec<&Commit> = head.ancestry().collect();
    chain.reverse();

    for (position, commit) in chain.iter().enumerate() {
        let expected = expected_type(position);
        if commit.commit_type() != expected {
            return Err(ValidationError::UnexpectedCommitType {
                position,
                expected,
                found: commit.commit_type(),
            });
        }
    }

    if let (Some(challenge), Some(confirmation)) = (chain.first(), chain.get(2)) {
        debug_assert!(matches!(confirmation.kind(), CommitKind::ChallengeConfirmation(_)));
        if confirmation.committer().id() != challenge.committer().id() {
            return Err(ValidationError::NotConfirmedByChallenger {
                challenger: challenge.committer().id().clone(),
                confirmer: confirmation.committer().id().clone(),
            });
        }
    }

    Ok(())
}

/// Get the type tag a commit must have at `position`, counting from the root.
pub(crate) fn expected_type(position: usize) -> &'static str {
    match position {
        0 => CHALLENGE_TYPE,
        1 => CHALLENGE_ACCEPTANCE_TYPE,
        2 => CHALLENGE_CONFIRMATION_TYPE,
        _ => GAME_STEP_TYPE,
    }
}

/// A game chain that breaks one of the rules in the [module-level docs](self).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected a {expected} commit at position {position}, found a {found} commit")]
    UnexpectedCommitType {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("the challenge by {challenger} was confirmed by a different player, {confirmer}")]
    NotConfirmedByChallenger {
        challenger: PlayerId,
        confirmer: PlayerId,
    },
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use crate::{
        chain::commit::{CommitDraft, Terms},
        object_store::mem_store::MemStore,
        types::{
            basic::Timestamp,
            player::{Player, PrivateKey},
        },
    };

    use super::*;

    fn terms() -> Terms {
        Terms::new(Timestamp::now().checked_add(Duration::from_secs(60)).unwrap(), "")
    }

    fn append(
        store: &MemStore,
        kind: CommitKind,
        by: &Arc<Player>,
        parent: Option<Arc<Commit>>,
    ) -> Arc<Commit> {
        let commit = Arc::new(
            CommitDraft::new(kind, by.clone(), Timestamp::now(), parent)
                .sign()
                .unwrap(),
        );
        commit.publish(store).unwrap();
        commit
    }

    #[test]
    fn steps_cannot_skip_the_handshake() {
        let store = MemStore::new();
        let alice = Arc::new(Player::local(PrivateKey::generate(), &store).unwrap());
        let challenge = append(&store, CommitKind::Challenge(terms()), &alice, None);
        assert_eq!(validate(&challenge), Ok(()));

        let step = append(&store, CommitKind::GameStep(vec![1]), &alice, Some(challenge));
        assert_eq!(
            validate(&step),
            Err(ValidationError::UnexpectedCommitType {
                position: 1,
                expected: CHALLENGE_ACCEPTANCE_TYPE,
                found: GAME_STEP_TYPE,
            })
        );
    }

    #[test]
    fn only_the_challenger_confirms() {
        let store = MemStore::new();
        let alice = Arc::new(Player::local(PrivateKey::generate(), &store).unwrap());
        let bob = Arc::new(Player::local(PrivateKey::generate(), &store).unwrap());

        let challenge = append(&store, CommitKind::Challenge(terms()), &alice, None);
        let acceptance = append(
            &store,
            CommitKind::ChallengeAcceptance(terms()),
            &bob,
            Some(challenge),
        );
        let confirmation = append(
            &store,
            CommitKind::ChallengeConfirmation(terms()),
            &bob,
            Some(acceptance.clone()),
        );
        assert!(matches!(
            validate(&confirmation),
            Err(ValidationError::NotConfirmedByChallenger { .. })
        ));

        let confirmation = append(
            &store,
            CommitKind::ChallengeConfirmation(terms()),
            &alice,
            Some(acceptance),
        );
        assert_eq!(validate(&confirmation), Ok(()));
    }
}
