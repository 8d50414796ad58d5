/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The canonical signing codec: the exact bytes that a commit's signature is over.
//!
//! Every commit kind has a fixed, pipe-delimited template:
//!
//! |Kind|Signature data|
//! |---|---|
//! |Challenge|`id\|timeout\|comment\|none`|
//! |Challenge Acceptance|`id\|timeout\|comment\|challenge hash`|
//! |Challenge Confirmation|`id\|timeout\|comment\|acceptance hash`|
//! |Game Step|`id\|timestamp\|raw data bytes\|parent hash`|
//!
//! Timestamps are written in their [canonical form](crate::types::basic::Timestamp::rfc3339_nano).
//!
//! Because every kind except the root Challenge weaves its parent's hash into its signature data,
//! changing any ancestor changes the signature data of every descendant. Conversely, the signature
//! data of a commit whose parent has no hash yet is undefined, and building it fails with
//! [`CommitError::UnpublishedParent`].

use crate::types::basic::{GameId, Timestamp};

use super::commit::{Commit, CommitError, CommitKind};

const SEPARATOR: u8 = b'|';

/// Placeholder for the parent hash of a root commit.
const NO_PARENT: &str = "none";

/// Build the signature data of a commit with the given `id`, `kind`, `timestamp` and `parent`.
pub(crate) fn signature_data(
    id: &GameId,
    kind: &CommitKind,
    timestamp: &Timestamp,
    parent: Option<&Commit>,
) -> Result<Vec<u8>, CommitError> {
    let mut data = Vec::new();
    data.extend_from_slice(id.as_str().as_bytes());
    data.push(SEPARATOR);

    match kind {
        CommitKind::Challenge(terms) => {
            data.extend_from_slice(terms.timeout().rfc3339_nano().as_bytes());
            data.push(SEPARATOR);
            data.extend_from_slice(terms.comment().as_bytes());
            data.push(SEPARATOR);
            data.extend_from_slice(NO_PARENT.as_bytes());
        }
        CommitKind::ChallengeAcceptance(terms) | CommitKind::ChallengeConfirmation(terms) => {
            let parent_hash = parent_hash(kind, parent)?;
            data.extend_from_slice(terms.timeout().rfc3339_nano().as_bytes());
            data.push(SEPARATOR);
            data.extend_from_slice(terms.comment().as_bytes());
            data.push(SEPARATOR);
            data.extend_from_slice(parent_hash.as_bytes());
        }
        CommitKind::GameStep(step_data) => {
            let parent_hash = parent_hash(kind, parent)?;
            data.extend_from_slice(timestamp.rfc3339_nano().as_bytes());
            data.push(SEPARATOR);
            data.extend_from_slice(step_data);
            data.push(SEPARATOR);
            data.extend_from_slice(parent_hash.as_bytes());
        }
    }

    Ok(data)
}

fn parent_hash<'a>(kind: &CommitKind, parent: Option<&'a Commit>) -> Result<&'a str, CommitError> {
    parent
        .and_then(|parent| parent.hash())
        .map(|hash| hash.as_str())
        .ok_or(CommitError::UnpublishedParent {
            commit_type: kind.type_tag(),
        })
}
