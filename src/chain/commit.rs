/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signed, hash-linked commits.
//!
//! A [`Commit`] is one signed entry in a game's chain. Every commit is one of four [kinds](CommitKind),
//! and points to its parent through a shared [`Arc`]. A game's chain is therefore a persistent linked
//! list: extending a game allocates one new commit and shares every ancestor with the previous head.
//!
//! ## Lifecycle of a commit
//!
//! 1. A [`CommitDraft`] is assembled from a kind, a committer, a timestamp and an optional parent.
//! 2. [`CommitDraft::sign`] seals the draft into a [`Commit`]. This requires the committer's private key
//!    and a published parent (see [`signing`](super::signing)).
//! 3. [`Commit::publish`] stores the commit (and every unpublished ancestor, root first) in an
//!    [`ObjectStore`], recording the hash the store returns. The hash is write-once: publishing a
//!    published commit is a no-op that returns the recorded hash.
//!
//! A `Commit` is immutable apart from its write-once hash. Signing a commit again is impossible by
//! construction, since `sign` consumes the draft.

use std::{
    fmt::{self, Debug, Formatter},
    iter,
    sync::{Arc, OnceLock},
};

use thiserror::Error;

use crate::{
    object_store::pluggables::{ObjectStore, StoreError},
    persistence::objects,
    types::{
        basic::{GameId, ObjectHash, PlayerId, SignatureBytes, Timestamp},
        crypto_primitives,
        player::Player,
    },
};

use super::signing;

/// Type tag of a [`CommitKind::Challenge`] in the object store.
pub const CHALLENGE_TYPE: &str = "challenge-offer";

/// Type tag of a [`CommitKind::ChallengeAcceptance`] in the object store.
pub const CHALLENGE_ACCEPTANCE_TYPE: &str = "challenge-accept";

/// Type tag of a [`CommitKind::ChallengeConfirmation`] in the object store.
pub const CHALLENGE_CONFIRMATION_TYPE: &str = "challenge-confirm";

/// Type tag of a [`CommitKind::GameStep`] in the object store.
pub const GAME_STEP_TYPE: &str = "game-step";

/// The terms attached to the handshake commits: until when the offer stands, and a free-form note.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Terms {
    timeout: Timestamp,
    comment: String,
}

impl Terms {
    pub fn new(timeout: Timestamp, comment: impl Into<String>) -> Terms {
        Terms {
            timeout,
            comment: comment.into(),
        }
    }

    pub fn timeout(&self) -> Timestamp {
        self.timeout
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

/// What a commit says.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitKind {
    /// The root of every game: a player offers to play.
    Challenge(Terms),

    /// Another player takes up the offer.
    ChallengeAcceptance(Terms),

    /// The challenger agrees to play against the accepter.
    ChallengeConfirmation(Terms),

    /// One opaque move.
    GameStep(Vec<u8>),
}

impl CommitKind {
    /// Get the type tag written to the object store for this kind.
    pub fn type_tag(&self) -> &'static str {
        match self {
            CommitKind::Challenge(_) => CHALLENGE_TYPE,
            CommitKind::ChallengeAcceptance(_) => CHALLENGE_ACCEPTANCE_TYPE,
            CommitKind::ChallengeConfirmation(_) => CHALLENGE_CONFIRMATION_TYPE,
            CommitKind::GameStep(_) => GAME_STEP_TYPE,
        }
    }

    pub fn terms(&self) -> Option<&Terms> {
        match self {
            CommitKind::Challenge(terms)
            | CommitKind::ChallengeAcceptance(terms)
            | CommitKind::ChallengeConfirmation(terms) => Some(terms),
            CommitKind::GameStep(_) => None,
        }
    }

    /// Check whether a commit of this kind may directly follow a commit of kind `parent` (`None` for
    /// the root position).
    pub fn may_follow(&self, parent: Option<&CommitKind>) -> bool {
        matches!(
            (self, parent),
            (CommitKind::Challenge(_), None)
                | (CommitKind::ChallengeAcceptance(_), Some(CommitKind::Challenge(_)))
                | (
                    CommitKind::ChallengeConfirmation(_),
                    Some(CommitKind::ChallengeAcceptance(_))
                )
                | (
                    CommitKind::GameStep(_),
                    Some(CommitKind::ChallengeConfirmation(_) | CommitKind::GameStep(_))
                )
        )
    }
}

/// An unsigned commit.
pub struct CommitDraft {
    kind: CommitKind,
    committer: Arc<Player>,
    timestamp: Timestamp,
    parent: Option<Arc<Commit>>,
}

impl CommitDraft {
    pub fn new(
        kind: CommitKind,
        committer: Arc<Player>,
        timestamp: Timestamp,
        parent: Option<Arc<Commit>>,
    ) -> CommitDraft {
        CommitDraft {
            kind,
            committer,
            timestamp,
            parent,
        }
    }

    /// Get the id the commit will have once signed. See [`Commit::id`].
    pub fn id(&self) -> GameId {
        derive_id(
            &self.kind,
            self.committer.id(),
            &self.timestamp,
            self.parent.as_deref(),
        )
    }

    /// Sign the draft with the committer's private key, sealing it into a [`Commit`].
    ///
    /// # Errors
    ///
    /// - [`CommitError::MissingPrivateKey`] if the committer is a remote player.
    /// - [`CommitError::UnpublishedParent`] if the draft has a parent that has no hash (or needs a
    ///   parent and has none).
    pub fn sign(self) -> Result<Commit, CommitError> {
        let private_key = self
            .committer
            .private_key()
            .ok_or_else(|| CommitError::MissingPrivateKey {
                player: self.committer.id().clone(),
            })?;
        let data = signing::signature_data(
            &self.id(),
            &self.kind,
            &self.timestamp,
            self.parent.as_deref(),
        )?;
        let signature = private_key.sign(&data);

        Ok(Commit::assemble(
            self.kind,
            self.committer,
            self.timestamp,
            self.parent,
            signature,
            None,
        ))
    }
}

/// A sealed commit. See the [module-level docs](self).
pub struct Commit {
    kind: CommitKind,
    committer: Arc<Player>,
    timestamp: Timestamp,
    parent: Option<Arc<Commit>>,
    signature: SignatureBytes,
    hash: OnceLock<ObjectHash>,
}

impl Commit {
    /// Put together a commit from parts, without checking its signature.
    pub(crate) fn assemble(
        kind: CommitKind,
        committer: Arc<Player>,
        timestamp: Timestamp,
        parent: Option<Arc<Commit>>,
        signature: SignatureBytes,
        hash: Option<ObjectHash>,
    ) -> Commit {
        let cell = OnceLock::new();
        if let Some(hash) = hash {
            let _ = cell.set(hash);
        }

        Commit {
            kind,
            committer,
            timestamp,
            parent,
            signature,
            hash: cell,
        }
    }

    /// Put together a commit read back from untrusted input, and [verify](Self::verify) it.
    pub(crate) fn load(
        kind: CommitKind,
        committer: Arc<Player>,
        timestamp: Timestamp,
        parent: Option<Arc<Commit>>,
        signature: SignatureBytes,
        hash: Option<ObjectHash>,
    ) -> Result<Commit, CommitError> {
        let commit = Commit::assemble(kind, committer, timestamp, parent, signature, hash);
        commit.verify()?;
        Ok(commit)
    }

    /// Copy this commit onto a different parent, keeping its signature and hash.
    ///
    /// The copy's signature is only valid if `parent` has the same hash as the original parent.
    /// Callers must [verify](Self::verify) the copy.
    pub(crate) fn reparent(&self, parent: Arc<Commit>) -> Commit {
        Commit::assemble(
            self.kind.clone(),
            self.committer.clone(),
            self.timestamp,
            Some(parent),
            self.signature,
            self.hash().cloned(),
        )
    }

    pub fn kind(&self) -> &CommitKind {
        &self.kind
    }

    pub fn commit_type(&self) -> &'static str {
        self.kind.type_tag()
    }

    pub fn committer(&self) -> &Arc<Player> {
        &self.committer
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn parent(&self) -> Option<&Arc<Commit>> {
        self.parent.as_ref()
    }

    pub fn signature(&self) -> SignatureBytes {
        self.signature
    }

    /// Get the hash recorded when the commit was published, if it has been.
    pub fn hash(&self) -> Option<&ObjectHash> {
        self.hash.get()
    }

    pub fn is_published(&self) -> bool {
        self.hash.get().is_some()
    }

    pub fn terms(&self) -> Option<&Terms> {
        self.kind.terms()
    }

    /// Get the offer timeout of a handshake commit, or `None` for a game step.
    pub fn timeout(&self) -> Option<Timestamp> {
        self.terms().map(Terms::timeout)
    }

    pub fn comment(&self) -> Option<&str> {
        self.terms().map(Terms::comment)
    }

    /// Get the move carried by a game step, or `None` for a handshake commit.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.kind {
            CommitKind::GameStep(data) => Some(data),
            _ => None,
        }
    }

    /// Get the id derived from this commit's ancestry:
    ///
    /// |Kind|Id|
    /// |---|---|
    /// |Challenge|`challenger id\|timestamp`|
    /// |Challenge Acceptance|`challenge id\|accepter id`|
    /// |Challenge Confirmation|the parent's id|
    /// |Game Step|the parent's id|
    ///
    /// All commits after the acceptance therefore share the acceptance's id, which is the id of the game.
    pub fn id(&self) -> GameId {
        // Confirmations and steps inherit their id, so only the nearest acceptance or challenge matters.
        self.ancestry()
            .find(|commit| {
                matches!(
                    commit.kind,
                    CommitKind::Challenge(_) | CommitKind::ChallengeAcceptance(_)
                )
            })
            .map(|anchor| {
                derive_id(
                    &anchor.kind,
                    anchor.committer.id(),
                    &anchor.timestamp,
                    anchor.parent.as_deref(),
                )
            })
            .unwrap_or_default()
    }

    /// Iterate from this commit to the root, this commit first.
    pub fn ancestry(&self) -> impl Iterator<Item = &Commit> {
        iter::successors(Some(self), |commit| commit.parent.as_deref())
    }

    /// Get the bytes this commit's signature is over.
    pub fn signature_data(&self) -> Result<Vec<u8>, CommitError> {
        signing::signature_data(&self.id(), &self.kind, &self.timestamp, self.parent.as_deref())
    }

    /// Check the signature against the committer's public key and the current signature data.
    pub fn verify(&self) -> Result<(), CommitError> {
        let data = self.signature_data()?;
        if crypto_primitives::is_correct(self.committer.key().key(), &data, &self.signature) {
            Ok(())
        } else {
            Err(CommitError::BadSignature {
                commit_type: self.commit_type(),
                id: self.id(),
            })
        }
    }

    /// Store this commit and every unpublished ancestor in `store`, root first, and return this
    /// commit's hash.
    pub fn publish<S: ObjectStore>(&self, store: &S) -> Result<ObjectHash, CommitError> {
        if let Some(hash) = self.hash() {
            return Ok(hash.clone());
        }

        let unpublished_ancestors: Vec<&Commit> = self
            .ancestry()
            .skip(1)
            .take_while(|commit| !commit.is_published())
            .collect();
        for ancestor in unpublished_ancestors.into_iter().rev() {
            let hash = objects::put_commit(ancestor, store)?;
            ancestor.hash.get_or_init(|| hash);
        }

        let hash = objects::put_commit(self, store)?;
        Ok(self.hash.get_or_init(|| hash).clone())
    }
}

impl Debug for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("type", &self.commit_type())
            .field("id", &self.id())
            .field("committer", self.committer.id())
            .field("timestamp", &self.timestamp)
            .field("hash", &self.hash())
            .finish()
    }
}

impl Drop for Commit {
    // Unlink the chain iteratively so that dropping a long game does not recurse once per commit.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(commit) = parent {
            match Arc::try_unwrap(commit) {
                Ok(mut commit) => parent = commit.parent.take(),
                Err(_) => break,
            }
        }
    }
}

fn derive_id(
    kind: &CommitKind,
    committer: &PlayerId,
    timestamp: &Timestamp,
    parent: Option<&Commit>,
) -> GameId {
    match kind {
        CommitKind::Challenge(_) => {
            GameId::new(format!("{}|{}", committer, timestamp.rfc3339_nano()))
        }
        CommitKind::ChallengeAcceptance(_) => {
            let challenge_id = parent.map(Commit::id).unwrap_or_default();
            GameId::new(format!("{}|{}", challenge_id, committer))
        }
        CommitKind::ChallengeConfirmation(_) | CommitKind::GameStep(_) => {
            parent.map(Commit::id).unwrap_or_default()
        }
    }
}

/// Error when signing, verifying or publishing a commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The parent of a non-root commit is missing or has not been published, so the commit's signature
    /// data cannot be built.
    #[error("the parent of a {commit_type} commit must be published before the commit can be signed or verified")]
    UnpublishedParent { commit_type: &'static str },

    #[error("player {player} has no private key to sign with")]
    MissingPrivateKey { player: PlayerId },

    #[error("signature on {commit_type} commit {id} is not valid")]
    BadSignature { commit_type: &'static str, id: GameId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode commit metadata: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        object_store::mem_store::MemStore,
        types::player::{PrivateKey, PublicKey},
    };

    use super::*;

    fn player(store: &MemStore) -> Arc<Player> {
        Arc::new(Player::local(PrivateKey::generate(), store).unwrap())
    }

    fn terms() -> Terms {
        Terms::new(
            Timestamp::now().checked_add(Duration::from_secs(60)).unwrap(),
            "hi",
        )
    }

    #[test]
    fn challenge_id_is_challenger_and_timestamp() {
        let store = MemStore::new();
        let alice = player(&store);
        let timestamp = Timestamp::now();
        let challenge =
            CommitDraft::new(CommitKind::Challenge(terms()), alice.clone(), timestamp, None)
                .sign()
                .unwrap();

        assert_eq!(
            challenge.id().as_str(),
            format!("{}|{}", alice.id(), timestamp.rfc3339_nano())
        );
        assert!(challenge.verify().is_ok());
        assert!(!challenge.is_published());
    }

    #[test]
    fn signing_needs_private_key_and_published_parent() {
        let store = MemStore::new();
        let alice = player(&store);
        let remote = Arc::new(alice.to_remote());

        let result =
            CommitDraft::new(CommitKind::Challenge(terms()), remote, Timestamp::now(), None).sign();
        assert!(matches!(result, Err(CommitError::MissingPrivateKey { .. })));

        let challenge = Arc::new(
            CommitDraft::new(CommitKind::Challenge(terms()), alice.clone(), Timestamp::now(), None)
                .sign()
                .unwrap(),
        );
        let result = CommitDraft::new(
            CommitKind::ChallengeAcceptance(terms()),
            player(&store),
            Timestamp::now(),
            Some(challenge.clone()),
        )
        .sign();
        assert!(matches!(result, Err(CommitError::UnpublishedParent { .. })));

        challenge.publish(&store).unwrap();
        let acceptance = CommitDraft::new(
            CommitKind::ChallengeAcceptance(terms()),
            player(&store),
            Timestamp::now(),
            Some(challenge),
        )
        .sign()
        .unwrap();
        assert!(acceptance.verify().is_ok());
    }

    #[test]
    fn publish_is_idempotent_and_root_first() {
        let store = MemStore::new();
        let alice = player(&store);
        let bob = player(&store);

        let challenge = Arc::new(
            CommitDraft::new(CommitKind::Challenge(terms()), alice, Timestamp::now(), None)
                .sign()
                .unwrap(),
        );
        let challenge_hash = challenge.publish(&store).unwrap();
        assert_eq!(challenge.publish(&store).unwrap(), challenge_hash);

        let acceptance = Arc::new(
            CommitDraft::new(
                CommitKind::ChallengeAcceptance(terms()),
                bob.clone(),
                Timestamp::now(),
                Some(challenge.clone()),
            )
            .sign()
            .unwrap(),
        );
        let acceptance_hash = acceptance.publish(&store).unwrap();
        assert_ne!(acceptance_hash, challenge_hash);
        assert_eq!(acceptance.hash(), Some(&acceptance_hash));
        assert_eq!(
            acceptance.id().as_str(),
            format!("{}|{}", challenge.id(), bob.id())
        );
    }

    #[test]
    fn verify_fails_for_a_different_key() {
        let store = MemStore::new();
        let alice = player(&store);
        let challenge = CommitDraft::new(
            CommitKind::Challenge(terms()),
            alice.clone(),
            Timestamp::now(),
            None,
        )
        .sign()
        .unwrap();

        let impostor = Arc::new(Player::remote(PublicKey::new(
            PrivateKey::generate().public(),
            alice.id().clone(),
        )));
        let forged = Commit::assemble(
            challenge.kind().clone(),
            impostor,
            challenge.timestamp(),
            None,
            challenge.signature(),
            None,
        );
        assert!(matches!(forged.verify(), Err(CommitError::BadSignature { .. })));
    }

    #[test]
    fn kinds_follow_the_handshake_order() {
        let challenge = CommitKind::Challenge(terms());
        let acceptance = CommitKind::ChallengeAcceptance(terms());
        let confirmation = CommitKind::ChallengeConfirmation(terms());
        let step = CommitKind::GameStep(vec![1]);

        assert!(challenge.may_follow(None));
        assert!(acceptance.may_follow(Some(&challenge)));
        assert!(confirmation.may_follow(Some(&acceptance)));
        assert!(step.may_follow(Some(&confirmation)));
        assert!(step.may_follow(Some(&step)));

        assert!(!challenge.may_follow(Some(&step)));
        assert!(!step.may_follow(Some(&acceptance)));
        assert!(!confirmation.may_follow(Some(&challenge)));
        assert!(!acceptance.may_follow(None));
    }
}
