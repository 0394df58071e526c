use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::temporal::LedgerTimestamp;

/// Ledger transaction identifier: 32 bytes rendered as 64 lowercase hex
/// characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Derive a fresh transaction id from a UUID v7 nonce and the
    /// transaction timestamp (BLAKE3, domain-separated).
    pub fn derive(timestamp: LedgerTimestamp) -> Self {
        Self::derive_with_nonce(Uuid::now_v7(), timestamp)
    }

    pub fn derive_with_nonce(nonce: Uuid, timestamp: LedgerTimestamp) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"rl-tx-v1:");
        hasher.update(nonce.as_bytes());
        hasher.update(&timestamp.seconds.to_le_bytes());
        hasher.update(&timestamp.nanos.to_le_bytes());
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic_for_same_inputs() {
        let nonce = Uuid::nil();
        let ts = LedgerTimestamp::new(100, 0);
        assert_eq!(
            TxId::derive_with_nonce(nonce, ts),
            TxId::derive_with_nonce(nonce, ts)
        );
    }

    #[test]
    fn fresh_ids_differ() {
        let ts = LedgerTimestamp::new(100, 0);
        assert_ne!(TxId::derive(ts), TxId::derive(ts));
    }

    #[test]
    fn hex_shape() {
        let id = TxId::derive(LedgerTimestamp::now());
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id.short().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
