//! Store key layout.
//!
//! Every key is namespaced under `anti_cheat:` and scoped to one player.
//! Client nonces are untrusted and unbounded, so they are hashed before being
//! embedded in a key.

use crate::types::{PlayerId, SanctionKind};

const PREFIX: &str = "anti_cheat";

/// Consumed-nonce marker: `anti_cheat:nonce:{player}:{blake3(nonce)}`.
pub fn nonce_key(player: PlayerId, nonce: &str) -> String {
    let digest = blake3::hash(nonce.as_bytes());
    format!("{PREFIX}:nonce:{player}:{}", hex::encode(digest.as_bytes()))
}

/// Last accepted sequence number.
pub fn sequence_key(player: PlayerId) -> String {
    format!("{PREFIX}:seq:{player}")
}

/// Tap counter for one wall-clock second.
pub fn rate_key(player: PlayerId, unix_second: i64) -> String {
    format!("{PREFIX}:rate:{player}:{unix_second}")
}

/// Rolling timing state.
pub fn timing_key(player: PlayerId) -> String {
    format!("{PREFIX}:timing:{player}")
}

/// Sanction record of the given kind.
pub fn sanction_key(player: PlayerId, kind: SanctionKind) -> String {
    format!("{PREFIX}:sanction:{}:{player}", kind.as_str())
}
