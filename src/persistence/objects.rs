/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Layout of commits in an [`ObjectStore`].
//!
//! Every commit is stored as a metadata object:
//!
//! ```text
//! data:  {"Timestamp": "...", "CommitType": "game-step", "Signature": "-----BEGIN ED25519 SIGNATURE-----..."}
//! links: committer-public-key ──▶ armored public key blob (its hash is the committer's id)
//!        data                 ──▶ payload object
//!        parent               ──▶ parent commit (absent on the challenge)
//! ```
//!
//! The payload object's data is `{"Timeout": "...", "Comment": "..."}` for the three handshake commits
//! and `{"Data": "<base64>"}` for game steps.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    chain::{
        commit::{Commit, CommitError, CommitKind, Terms},
        game::{Game, GameError},
        invariants,
    },
    object_store::pluggables::{ObjectStore, StoreObject},
    types::{
        basic::{ObjectHash, PlayerId, SignatureBytes, Timestamp},
        player::{Player, PlayerRoster, PublicKey},
    },
};

use super::{armor, base64_bytes, LoadError};

pub const COMMITTER_PUBLIC_KEY_LINK: &str = "committer-public-key";
pub const DATA_LINK: &str = "data";
pub const PARENT_LINK: &str = "parent";

/// Armor label of a commit signature.
pub const SIGNATURE_LABEL: &str = "ED25519 SIGNATURE";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommitMetadata {
    timestamp: Timestamp,
    commit_type: String,
    signature: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TermsPayload {
    timeout: Timestamp,
    comment: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StepPayload {
    #[serde(with = "base64_bytes")]
    data: Vec<u8>,
}

/// Store a single commit whose parent (if any) is already published, and return its hash.
pub(crate) fn put_commit<S: ObjectStore>(
    commit: &Commit,
    store: &S,
) -> Result<ObjectHash, CommitError> {
    let payload = match commit.kind() {
        CommitKind::Challenge(terms)
        | CommitKind::ChallengeAcceptance(terms)
        | CommitKind::ChallengeConfirmation(terms) => serde_json::to_vec(&TermsPayload {
            timeout: terms.timeout(),
            comment: terms.comment().to_string(),
        })?,
        CommitKind::GameStep(data) => serde_json::to_vec(&StepPayload { data: data.clone() })?,
    };
    let mut payload_object = StoreObject::new();
    payload_object.set_data(payload);
    let data_hash = store.put_object(&payload_object)?;

    let key_hash = store.put(commit.committer().key().armored().as_bytes())?;

    let metadata = serde_json::to_vec(&CommitMetadata {
        timestamp: commit.timestamp(),
        commit_type: commit.commit_type().to_string(),
        signature: armor::armor(SIGNATURE_LABEL, &commit.signature().bytes()),
    })?;

    let mut object = StoreObject::new();
    object
        .set_data(metadata)
        .add_link(COMMITTER_PUBLIC_KEY_LINK, key_hash)
        .add_link(DATA_LINK, data_hash);
    if let Some(parent) = commit.parent() {
        let parent_hash = parent.hash().ok_or(CommitError::UnpublishedParent {
            commit_type: commit.commit_type(),
        })?;
        object.add_link(PARENT_LINK, parent_hash.clone());
    }

    Ok(store.put_object(&object)?)
}

impl Game {
    /// Rebuild the game whose head commit is stored under `head`.
    ///
    /// Committers are looked up in `roster` first. A committer that is not in the roster is read from
    /// the public key the commit links to, and becomes a remote player.
    pub fn fetch<S: ObjectStore>(
        head: &ObjectHash,
        store: &S,
        roster: &PlayerRoster,
    ) -> Result<Game, GameError> {
        Ok(load_game(head, store, roster)?)
    }
}

/// A commit object as stored, before its payload and committer are resolved.
struct RawCommit {
    hash: ObjectHash,
    timestamp: Timestamp,
    commit_type: String,
    signature: SignatureBytes,
    committer: ObjectHash,
    data: ObjectHash,
    parent: Option<ObjectHash>,
}

fn load_game<S: ObjectStore>(
    head: &ObjectHash,
    store: &S,
    roster: &PlayerRoster,
) -> Result<Game, LoadError> {
    let mut raw_commits = Vec::new();
    let mut next = Some(head.clone());
    while let Some(hash) = next {
        let raw = get_raw_commit(hash, store)?;
        next = raw.parent.clone();
        raw_commits.push(raw);
    }
    raw_commits.reverse();

    let mut roster = roster.clone();
    let mut parent: Option<Arc<Commit>> = None;
    for (position, raw) in raw_commits.into_iter().enumerate() {
        let expected = invariants::expected_type(position);
        if raw.commit_type != expected {
            return Err(LoadError::UnexpectedCommitType {
                position,
                expected,
                found: raw.commit_type,
            });
        }

        let committer = resolve_committer(&raw.committer, store, &mut roster)?;
        let payload = store.get_object(&raw.data)?;
        let kind = match position {
            0 => CommitKind::Challenge(read_terms(payload.data())?),
            1 => CommitKind::ChallengeAcceptance(read_terms(payload.data())?),
            2 => CommitKind::ChallengeConfirmation(read_terms(payload.data())?),
            _ => CommitKind::GameStep(serde_json::from_slice::<StepPayload>(payload.data())?.data),
        };

        let commit = Commit::load(
            kind,
            committer,
            raw.timestamp,
            parent.take(),
            raw.signature,
            Some(raw.hash),
        )
        .map_err(|source| LoadError::Verify { position, source })?;
        parent = Some(Arc::new(commit));
    }

    let head = parent.ok_or(LoadError::MissingRecord { record: "challenge" })?;
    Ok(Game::with_head(head)?)
}

fn get_raw_commit<S: ObjectStore>(hash: ObjectHash, store: &S) -> Result<RawCommit, LoadError> {
    let object = store.get_object(&hash)?;
    let metadata: CommitMetadata = serde_json::from_slice(object.data())?;

    let signature = armor::dearmor(SIGNATURE_LABEL, &metadata.signature)?;
    let signature = SignatureBytes::from_slice(&signature).ok_or(LoadError::BadSignatureLength {
        length: signature.len(),
    })?;

    let link = |name: &'static str| {
        object.link(name).cloned().ok_or_else(|| LoadError::MissingLink {
            hash: hash.clone(),
            link: name,
        })
    };
    let committer = link(COMMITTER_PUBLIC_KEY_LINK)?;
    let data = link(DATA_LINK)?;
    let parent = object.link(PARENT_LINK).cloned();

    Ok(RawCommit {
        hash,
        timestamp: metadata.timestamp,
        commit_type: metadata.commit_type,
        signature,
        committer,
        data,
        parent,
    })
}

fn resolve_committer<S: ObjectStore>(
    key_hash: &ObjectHash,
    store: &S,
    roster: &mut PlayerRoster,
) -> Result<Arc<Player>, LoadError> {
    let id = PlayerId::from(key_hash.clone());
    if let Some(player) = roster.get(&id) {
        return Ok(player.clone());
    }

    let blob = store.get(key_hash)?;
    let text = String::from_utf8(blob).map_err(|_| LoadError::KeyNotText {
        hash: key_hash.clone(),
    })?;
    let player = Arc::new(Player::remote(PublicKey::from_armored(&text, id)?));
    roster.insert(player.clone());
    Ok(player)
}

fn read_terms(payload: &[u8]) -> Result<Terms, LoadError> {
    let TermsPayload { timeout, comment } = serde_json::from_slice(payload)?;
    Ok(Terms::new(timeout, comment))
}
