use std::fmt;

use thiserror::Error;

use crate::{
    keys::{EphIdsForDay, SecretKey},
    storage::AccessError,
};

/// A named slot in secure storage holding at most one serialized value.
///
/// The keys are persisted identifiers and must never change, or previously
/// stored data becomes unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Record {
    /// The list of rotating secret keys.
    SecretKeys,
    /// The ephemeral identifiers for the current day.
    EphIdsToday,
}

impl Record {
    pub const ALL: [Record; 2] = [Record::SecretKeys, Record::EphIdsToday];

    pub fn key(&self) -> &'static str {
        match self {
            Record::SecretKeys => "org.dpppt.keylist",
            Record::EphIdsToday => "org.dpppt.ephsIds",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Record::SecretKeys => "secret-keys",
            Record::EphIdsToday => "eph-ids-today",
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors surfaced by record-level operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Never set, or cleared since. Callers treat this as "no data yet".
    #[error("record {record} not found")]
    NotFound { record: Record },
    /// The secure facility refused access; may succeed after e.g. the device unlocks.
    #[error("record {record} is inaccessible: {reason}")]
    Inaccessible { record: Record, reason: String },
    /// Stored bytes do not decode into the expected structure.
    /// Clear and re-derive rather than retry.
    #[error("record {record} is corrupt: {reason}")]
    Corrupt { record: Record, reason: String },
}

impl StoreError {
    /// Scope a byte-store failure to the record it happened on.
    pub fn from_access(record: Record, err: AccessError) -> Self {
        match err {
            AccessError::NotFound { .. } => StoreError::NotFound { record },
            AccessError::Inaccessible { reason, .. } => StoreError::Inaccessible { record, reason },
        }
    }
}

/// Typed access to the secure records used by the tracing client.
pub trait SecretRecords: Send + Sync {
    fn secret_keys(&self) -> Result<Vec<SecretKey>, StoreError>;

    /// Replace the stored key list.
    fn set_secret_keys(&self, keys: &[SecretKey]) -> Result<(), StoreError>;

    fn eph_ids_today(&self) -> Result<EphIdsForDay, StoreError>;

    /// Replace the stored ephemeral identifiers for today.
    fn set_eph_ids_today(&self, eph_ids: &EphIdsForDay) -> Result<(), StoreError>;

    /// Erase every record. Never fails, including when records are already absent.
    fn clear_all(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_are_stable_and_distinct() {
        assert_eq!(Record::SecretKeys.key(), "org.dpppt.keylist");
        assert_eq!(Record::EphIdsToday.key(), "org.dpppt.ephsIds");
        assert_ne!(Record::ALL[0].key(), Record::ALL[1].key());
    }

    #[test]
    fn access_errors_map_onto_record_errors() {
        let missing = StoreError::from_access(
            Record::SecretKeys,
            AccessError::NotFound {
                key: "org.dpppt.keylist".into(),
            },
        );
        assert_eq!(
            missing,
            StoreError::NotFound {
                record: Record::SecretKeys
            }
        );

        let locked = StoreError::from_access(
            Record::EphIdsToday,
            AccessError::Inaccessible {
                key: "org.dpppt.ephsIds".into(),
                reason: "device locked".into(),
            },
        );
        assert_eq!(
            locked.to_string(),
            "record eph-ids-today is inaccessible: device locked"
        );
    }
}
