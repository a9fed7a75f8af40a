//! Identifier types.
//!
//! Entry ids are assigned by the ledger store, never by callers. They are
//! monotonically increasing within a store and break ties between entries
//! that share a timestamp.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Store-assigned identifier of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntryId(pub i64);

impl EntryId {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for EntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&EntryId(42)).unwrap();
        assert_eq!(json, "42");
        let back: EntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntryId(42));
    }

    #[test]
    fn ids_order_numerically() {
        assert!(EntryId(2) > EntryId(1));
    }
}
