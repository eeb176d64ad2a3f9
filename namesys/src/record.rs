use chrono::{DateTime, Utc};

use crate::Error;

/// A signed, versioned binding of an identity to a path.
///
/// Records are immutable: publishing creates a new one with a higher sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    /// Target path bytes, `/ipfs/<cid>` or `/ipns/<identity>`.
    pub value: Vec<u8>,
    pub sequence: u64,
    pub validity: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl NameRecord {
    pub fn value_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.value)
            .map_err(|_| Error::Validation("record value is not utf-8".to_string()))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.validity <= now
    }
}
