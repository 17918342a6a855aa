//! Domain identifiers.
//!
//! Both IDs are opaque integers assigned by persistence; nothing outside
//! `sos-server::persistence` should ever construct one directly except in
//! tests.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Unique ID of a player account, assigned by the `accounts` table.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn raw(self) -> i64 {
        self.0
    }
}

/// Unique ID of a game, assigned by the `games` table.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(i64);

impl GameId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn raw(self) -> i64 {
        self.0
    }
}
