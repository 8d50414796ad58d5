/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Players and their keys.
//!
//! A [`Player`] is identified by the object store hash of its armored public key (its [`PlayerId`]).
//! The local operator's `Player` also holds a [`PrivateKey`] and can therefore author commits. Players
//! discovered through a remote chain are [`remote`](Player::remote): they can only be verified against.

use std::{
    collections::{hash_map, HashMap},
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use rand_core::OsRng;

use crate::{
    object_store::pluggables::{ObjectStore, StoreError},
    persistence::armor::{self, ArmorError},
};

use super::{
    basic::{PlayerId, SignatureBytes},
    crypto_primitives::{self, SigningKey, VerifyingKey},
};

/// Armor label of a published public key blob.
pub const PUBLIC_KEY_LABEL: &str = "ED25519 PUBLIC KEY";

/// A facade around [`SigningKey`] that can [`sign`](Self::sign) messages.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn new(signing_key: SigningKey) -> PrivateKey {
        PrivateKey(signing_key)
    }

    /// Generate a fresh private key from the operating system's random number generator.
    pub fn generate() -> PrivateKey {
        PrivateKey(SigningKey::generate(&mut OsRng))
    }

    pub(crate) fn sign(&self, message: &[u8]) -> SignatureBytes {
        crypto_primitives::sign(&self.0, message)
    }

    /// Get the `VerifyingKey` that matches this private key.
    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A verifying key together with the hash under which it is published.
#[derive(Clone, Debug)]
pub struct PublicKey {
    key: VerifyingKey,
    hash: PlayerId,
}

impl PublicKey {
    pub fn new(key: VerifyingKey, hash: PlayerId) -> PublicKey {
        PublicKey { key, hash }
    }

    /// Store the armored form of `key` in `store`, and return the resulting `PublicKey`.
    ///
    /// Content addressing makes this idempotent: publishing the same key twice yields the same hash.
    pub fn publish<S: ObjectStore>(key: VerifyingKey, store: &S) -> Result<PublicKey, StoreError> {
        let hash = store.put(Self::armored_key(&key).as_bytes())?;
        Ok(PublicKey::new(key, PlayerId::from(hash)))
    }

    /// Parse an armored public key previously produced by [`armored`](Self::armored).
    pub fn from_armored(text: &str, hash: PlayerId) -> Result<PublicKey, ArmorError> {
        let bytes = armor::dearmor(PUBLIC_KEY_LABEL, text)?;
        let bytes = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| ArmorError::BadLength { label: PUBLIC_KEY_LABEL, length: bytes.len() })?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(ArmorError::InvalidKey)?;
        Ok(PublicKey::new(key, hash))
    }

    pub fn key(&self) -> &VerifyingKey {
        &self.key
    }

    pub fn hash(&self) -> &PlayerId {
        &self.hash
    }

    pub fn armored(&self) -> String {
        Self::armored_key(&self.key)
    }

    fn armored_key(key: &VerifyingKey) -> String {
        armor::armor(PUBLIC_KEY_LABEL, key.as_bytes())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.as_bytes() == other.key.as_bytes()
    }
}

impl Eq for PublicKey {}

/// A participant in games.
///
/// Two players are equal iff their ids are equal.
#[derive(Clone, Debug)]
pub struct Player {
    public_key: PublicKey,
    private_key: Option<PrivateKey>,
}

impl Player {
    pub fn new(public_key: PublicKey, private_key: Option<PrivateKey>) -> Player {
        Player {
            public_key,
            private_key,
        }
    }

    /// Create the local operator's player, publishing its public key to `store` to obtain its id.
    pub fn local<S: ObjectStore>(private_key: PrivateKey, store: &S) -> Result<Player, StoreError> {
        let public_key = PublicKey::publish(private_key.public(), store)?;
        Ok(Player::new(public_key, Some(private_key)))
    }

    /// Create a player that can only be verified against.
    pub fn remote(public_key: PublicKey) -> Player {
        Player::new(public_key, None)
    }

    pub fn id(&self) -> &PlayerId {
        self.public_key.hash()
    }

    pub fn key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// Get a copy of this player without its private key.
    pub fn to_remote(&self) -> Player {
        Player::remote(self.public_key.clone())
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Player {}

/// Known players indexed by id, consulted when rebuilding chains from untrusted input.
#[derive(Clone, Debug, Default)]
pub struct PlayerRoster(HashMap<PlayerId, Arc<Player>>);

impl PlayerRoster {
    pub fn new() -> PlayerRoster {
        PlayerRoster(HashMap::new())
    }

    /// Add `player` to the roster. Players with an empty id are ignored, and a player that can sign is
    /// never replaced by a copy of itself that cannot.
    pub fn insert(&mut self, player: Arc<Player>) {
        if player.id().is_empty() {
            return;
        }

        match self.0.entry(player.id().clone()) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(player);
            }
            hash_map::Entry::Occupied(mut entry) => {
                if entry.get().private_key().is_none() || player.private_key().is_some() {
                    entry.insert(player);
                }
            }
        }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Arc<Player>> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Values<'_, PlayerId, Arc<Player>> {
        self.0.values()
    }
}

impl FromIterator<Arc<Player>> for PlayerRoster {
    fn from_iter<T: IntoIterator<Item = Arc<Player>>>(iter: T) -> Self {
        let mut roster = PlayerRoster::new();
        iter.into_iter().for_each(|player| roster.insert(player));
        roster
    }
}

impl Extend<Arc<Player>> for PlayerRoster {
    fn extend<T: IntoIterator<Item = Arc<Player>>>(&mut self, iter: T) {
        iter.into_iter().for_each(|player| self.insert(player));
    }
}
