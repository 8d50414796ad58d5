/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are passed around, compared and printed, but carry no active behavior.
//!
//! These follow the newtype pattern. The API for using them is defined in this module:
//! 1. [`PlayerId`]: the identity of a player, i.e., the object store hash of its public key.
//! 2. [`GameId`]: the derived, ancestry-based identifier shared by every commit of a game.
//! 3. [`ObjectHash`]: a content address handed out by an [object store](crate::object_store).
//! 4. [`Timestamp`]: a UTC instant with a canonical, reproducible text form.
//! 5. [`SignatureBytes`]: the raw bytes of an Ed25519 signature.

use std::{
    fmt::{self, Debug, Display, Formatter},
    time::Duration,
};

use borsh::{BorshDeserialize, BorshSerialize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identity of a player: the content hash of the player's published public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for PlayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for PlayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

impl From<ObjectHash> for PlayerId {
    fn from(hash: ObjectHash) -> Self {
        PlayerId(hash.0)
    }
}

/// Identifier of a game session, derived from the ancestry of a commit. See
/// [`Commit::id`](crate::chain::commit::Commit::id).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for GameId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({})", self.0)
    }
}

/// Content address of a blob or object in an [object store](crate::object_store::pluggables::ObjectStore).
///
/// The format of the string is decided by the store. Two values are the same object iff the strings
/// are equal.
#[derive(
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
#[serde(transparent)]
pub struct ObjectHash(String);

impl ObjectHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for ObjectHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.0)
    }
}

/// A UTC instant.
///
/// The canonical text form, used in signature data, derived ids and every serialized format, is
/// RFC 3339 in UTC with nanosecond precision where trailing fractional zeros are dropped, e.g.:
///
/// ```text
/// 2023-05-06T07:08:09Z
/// 2023-05-06T07:08:09.5Z
/// 2023-05-06T07:08:09.000000123Z
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub const fn new(date_time: DateTime<Utc>) -> Self {
        Self(date_time)
    }

    pub const fn date_time(&self) -> DateTime<Utc> {
        self.0
    }

    /// Get the timestamp that lies `duration` after `self`, or `None` if it is not representable.
    pub fn checked_add(&self, duration: Duration) -> Option<Timestamp> {
        let duration = chrono::Duration::from_std(duration).ok()?;
        self.0.checked_add_signed(duration).map(Timestamp)
    }

    /// Get the timestamp one nanosecond after `self`, saturating at the maximum representable instant.
    pub fn next_nanosecond(&self) -> Timestamp {
        self.checked_add(Duration::from_nanos(1)).unwrap_or(*self)
    }

    /// Format the timestamp in its canonical text form.
    pub fn rfc3339_nano(&self) -> String {
        let seconds = self.0.format("%Y-%m-%dT%H:%M:%S");
        let nanos = self.0.timestamp_subsec_nanos() % 1_000_000_000;
        if nanos == 0 {
            format!("{}Z", seconds)
        } else {
            let fraction = format!("{:09}", nanos);
            format!("{}.{}Z", seconds, fraction.trim_end_matches('0'))
        }
    }

    /// Parse any RFC 3339 string, converting it to UTC.
    pub fn parse_rfc3339(s: &str) -> Result<Timestamp, chrono::ParseError> {
        Ok(Timestamp(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rfc3339_nano())
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.rfc3339_nano())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rfc3339_nano())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        Timestamp::parse_rfc3339(&s).map_err(serde::de::Error::custom)
    }
}

/// Bytes of an Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }

    /// Interpret `bytes` as a signature, returning `None` if it is not exactly 64 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 64]>::try_from(bytes).ok().map(Self)
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", hex::encode(&self.0[..8]))
    }
}
