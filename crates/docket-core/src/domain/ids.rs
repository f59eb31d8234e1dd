//! Document identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Stable identifier for a document record.
///
/// Assigned once at ingestion and immutable afterwards. ULIDs are
/// lexicographically sortable by creation time, which keeps artifact
/// directories and log output in ingestion order for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(Ulid);

impl DocId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_roundtrips_through_string() {
        let id = DocId::new();
        let parsed: DocId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn doc_ids_are_unique() {
        assert_ne!(DocId::new(), DocId::new());
    }
}
