/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A whole game as one flat JSON document.
//!
//! ```text
//! {
//!   "Challenge":    {"Timeout", "Comment", "ChallengerID", "Timestamp", "Signature", "Hash"},
//!   "Acceptance":   {"Timeout", "Comment", "ChallengeHash", "AccepterID", "Timestamp", "Signature", "Hash"},
//!   "Confirmation": {"Timeout", "Comment", "AcceptanceHash", "ConfirmerID", "Timestamp", "Signature", "Hash"},
//!   "Steps":        [{"PlayerID", "Data", "ParentHash", "Timestamp", "Signature", "Hash"}, ...]
//! }
//! ```
//!
//! Records the game has not reached yet are `null`. Byte strings (`Signature`, `Data`) are base64, and
//! unpublished commits have an empty `Hash`.
//!
//! Each record names the hash of the commit it follows. When reading, that hash must equal the hash of
//! the commit actually rebuilt before it.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    chain::{
        commit::{Commit, CommitKind, Terms},
        game::{Game, GameError},
    },
    types::{
        basic::{ObjectHash, PlayerId, SignatureBytes, Timestamp},
        player::{Player, PlayerRoster},
    },
};

use super::{base64_bytes, LoadError};

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GameDocument {
    challenge: Option<ChallengeRecord>,
    acceptance: Option<AcceptanceRecord>,
    confirmation: Option<ConfirmationRecord>,
    steps: Option<Vec<StepRecord>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChallengeRecord {
    timeout: Timestamp,
    comment: String,
    #[serde(rename = "ChallengerID")]
    challenger_id: PlayerId,
    timestamp: Timestamp,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    hash: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AcceptanceRecord {
    timeout: Timestamp,
    comment: String,
    challenge_hash: String,
    #[serde(rename = "AccepterID")]
    accepter_id: PlayerId,
    timestamp: Timestamp,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    hash: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmationRecord {
    timeout: Timestamp,
    comment: String,
    acceptance_hash: String,
    #[serde(rename = "ConfirmerID")]
    confirmer_id: PlayerId,
    timestamp: Timestamp,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    hash: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StepRecord {
    #[serde(rename = "PlayerID")]
    player_id: PlayerId,
    #[serde(with = "base64_bytes")]
    data: Vec<u8>,
    parent_hash: String,
    timestamp: Timestamp,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    hash: String,
}

impl Game {
    /// Write the game to `writer` as a flat JSON document.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        let mut document = GameDocument::default();

        for commit in self.commits() {
            let parent_hash = commit.parent().map(|parent| hash_text(parent)).unwrap_or_default();
            let signature = commit.signature().bytes().to_vec();

            match commit.kind() {
                CommitKind::Challenge(terms) => {
                    document.challenge = Some(ChallengeRecord {
                        timeout: terms.timeout(),
                        comment: terms.comment().to_string(),
                        challenger_id: commit.committer().id().clone(),
                        timestamp: commit.timestamp(),
                        signature,
                        hash: hash_text(&commit),
                    });
                }
                CommitKind::ChallengeAcceptance(terms) => {
                    document.acceptance = Some(AcceptanceRecord {
                        timeout: terms.timeout(),
                        comment: terms.comment().to_string(),
                        challenge_hash: parent_hash,
                        accepter_id: commit.committer().id().clone(),
                        timestamp: commit.timestamp(),
                        signature,
                        hash: hash_text(&commit),
                    });
                }
                CommitKind::ChallengeConfirmation(terms) => {
                    document.confirmation = Some(ConfirmationRecord {
                        timeout: terms.timeout(),
                        comment: terms.comment().to_string(),
                        acceptance_hash: parent_hash,
                        confirmer_id: commit.committer().id().clone(),
                        timestamp: commit.timestamp(),
                        signature,
                        hash: hash_text(&commit),
                    });
                }
                CommitKind::GameStep(data) => {
                    document.steps.get_or_insert_with(Vec::new).push(StepRecord {
                        player_id: commit.committer().id().clone(),
                        data: data.clone(),
                        parent_hash,
                        timestamp: commit.timestamp(),
                        signature,
                        hash: hash_text(&commit),
                    });
                }
            }
        }

        serde_json::to_writer(writer, &document)
    }

    /// Read a game written by [`write_json`](Self::write_json). Every committer must be in `roster`.
    ///
    /// Signatures cover each commit's parent hash but not its own, so the `Hash` declared for the
    /// head record is taken on trust. Fetch the game from a store by hash when the head must be
    /// authenticated.
    pub fn read_json<R: Read>(reader: R, roster: &PlayerRoster) -> Result<Game, GameError> {
        Ok(read_game(reader, roster)?)
    }
}

fn read_game<R: Read>(reader: R, roster: &PlayerRoster) -> Result<Game, LoadError> {
    let document: GameDocument = serde_json::from_reader(reader)?;

    let challenge = document
        .challenge
        .ok_or(LoadError::MissingRecord { record: "Challenge" })?;
    if document.confirmation.is_some() && document.acceptance.is_none() {
        return Err(LoadError::Orphan {
            record: "Confirmation",
            requires: "Acceptance",
        });
    }
    if document.steps.as_ref().is_some_and(|steps| !steps.is_empty())
        && document.confirmation.is_none()
    {
        return Err(LoadError::Orphan {
            record: "Steps",
            requires: "Confirmation",
        });
    }

    let mut builder = ChainBuilder {
        roster,
        head: None,
        length: 0,
    };
    builder.push(
        CommitKind::Challenge(Terms::new(challenge.timeout, challenge.comment)),
        &challenge.challenger_id,
        challenge.timestamp,
        None,
        &challenge.signature,
        challenge.hash,
    )?;
    if let Some(acceptance) = document.acceptance {
        builder.push(
            CommitKind::ChallengeAcceptance(Terms::new(acceptance.timeout, acceptance.comment)),
            &acceptance.accepter_id,
            acceptance.timestamp,
            Some(acceptance.challenge_hash),
            &acceptance.signature,
            acceptance.hash,
        )?;
    }
    if let Some(confirmation) = document.confirmation {
        builder.push(
            CommitKind::ChallengeConfirmation(Terms::new(
                confirmation.timeout,
                confirmation.comment,
            )),
            &confirmation.confirmer_id,
            confirmation.timestamp,
            Some(confirmation.acceptance_hash),
            &confirmation.signature,
            confirmation.hash,
        )?;
    }
    for step in document.steps.unwrap_or_default() {
        builder.push(
            CommitKind::GameStep(step.data),
            &step.player_id,
            step.timestamp,
            Some(step.parent_hash),
            &step.signature,
            step.hash,
        )?;
    }

    let head = builder.head.ok_or(LoadError::MissingRecord { record: "Challenge" })?;
    Ok(Game::with_head(head)?)
}

/// Rebuilds a chain one record at a time, checking each record against the commit before it.
struct ChainBuilder<'a> {
    roster: &'a PlayerRoster,
    head: Option<Arc<Commit>>,
    length: usize,
}

impl<'a> ChainBuilder<'a> {
    fn push(
        &mut self,
        kind: CommitKind,
        committer: &PlayerId,
        timestamp: Timestamp,
        declared_parent_hash: Option<String>,
        signature: &[u8],
        hash: String,
    ) -> Result<(), LoadError> {
        let position = self.length;

        if let (Some(declared), Some(parent)) = (declared_parent_hash, self.head.as_ref()) {
            let actual = hash_text(parent);
            if declared != actual {
                return Err(LoadError::AncestorMismatch {
                    position,
                    declared,
                    actual,
                });
            }
        }

        let committer = self.player(committer)?;
        let signature = SignatureBytes::from_slice(signature).ok_or(LoadError::BadSignatureLength {
            length: signature.len(),
        })?;
        let hash = (!hash.is_empty()).then(|| ObjectHash::new(hash));

        let commit = Commit::load(kind, committer, timestamp, self.head.take(), signature, hash)
            .map_err(|source| LoadError::Verify { position, source })?;
        self.head = Some(Arc::new(commit));
        self.length += 1;
        Ok(())
    }

    fn player(&self, id: &PlayerId) -> Result<Arc<Player>, LoadError> {
        self.roster
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::UnknownPlayer(id.clone()))
    }
}

fn hash_text(commit: &Commit) -> String {
    commit
        .hash()
        .map(|hash| hash.as_str().to_string())
        .unwrap_or_default()
}
