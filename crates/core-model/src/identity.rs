use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Opaque, process-unique document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Monotonic document version stamped with the UTC time it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentVersion {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl DocumentVersion {
    pub fn initial() -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn next(&self) -> Self {
        Self {
            sequence: self.sequence + 1,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.sequence,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}
