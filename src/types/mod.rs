//! Types that are used across multiple components of ipgs_rs.
//!
//! Types specific to a single component, e.g., commits, live in that component's module, e.g.,
//! [`crate::chain::commit`].

pub mod basic;

pub mod crypto_primitives;

pub mod player;
