//! Transaction handles.
//!
//! Every engine call runs inside exactly one transaction: a read-write one
//! per upsert, a read-only one per traversal. Read-only transactions must
//! see one consistent snapshot for their whole lifetime.

use serde::{Deserialize, Serialize};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Transaction trait that all backends must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    fn is_read_only(&self) -> bool {
        self.mode() == TxMode::ReadOnly
    }
}
