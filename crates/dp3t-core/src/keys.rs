use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length in bytes of a single ephemeral identifier.
pub const EPH_ID_LENGTH: usize = 16;

/// A UTC calendar day, stored as the timestamp of its first instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Epoch(DateTime<Utc>);

impl Epoch {
    pub fn today() -> Self {
        Self::containing(Utc::now())
    }

    /// The day that contains the given instant.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date())
    }
}

/// Rotating secret key material together with the day it is valid for.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretKey {
    pub epoch: Epoch,
    #[serde(with = "base64_bytes")]
    pub key_data: Vec<u8>,
}

impl SecretKey {
    pub fn new(epoch: Epoch, key_data: impl Into<Vec<u8>>) -> Self {
        Self {
            epoch,
            key_data: key_data.into(),
        }
    }
}

// Never print key bytes.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("epoch", &self.epoch)
            .field("key_data", &format_args!("<{} bytes>", self.key_data.len()))
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("ephemeral id must be {EPH_ID_LENGTH} bytes, got {0}")]
pub struct EphIdLengthError(pub usize);

/// A single broadcast ephemeral identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EphId([u8; EPH_ID_LENGTH]);

impl EphId {
    pub fn new(bytes: [u8; EPH_ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for EphId {
    type Error = EphIdLengthError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; EPH_ID_LENGTH] = value
            .try_into()
            .map_err(|_| EphIdLengthError(value.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for EphId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for EphId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = base64_bytes::deserialize(deserializer)?;
        EphId::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

/// The ephemeral identifiers in use for one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EphIdsForDay {
    pub day: Epoch,
    pub eph_ids: Vec<EphId>,
}

impl EphIdsForDay {
    pub fn new(day: Epoch, eph_ids: Vec<EphId>) -> Self {
        Self { day, eph_ids }
    }

    pub fn is_for(&self, day: Epoch) -> bool {
        self.day == day
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> Epoch {
        Epoch::from_date(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
    }

    #[test]
    fn epoch_truncates_to_start_of_day() {
        let instant = DateTime::parse_from_rfc3339("2020-05-04T17:42:10Z")
            .expect("parse")
            .with_timezone(&Utc);
        let epoch = Epoch::containing(instant);
        assert_eq!(epoch, day(2020, 5, 4));
        assert_eq!(epoch.timestamp().to_rfc3339(), "2020-05-04T00:00:00+00:00");
    }

    #[test]
    fn secret_key_debug_hides_key_bytes() {
        let key = SecretKey::new(day(2020, 5, 4), vec![0xde, 0xad, 0xbe, 0xef]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("<4 bytes>"));
        assert!(!rendered.contains("222"), "raw bytes leaked: {rendered}");
    }

    #[test]
    fn secret_key_serializes_key_as_base64() {
        let key = SecretKey::new(day(2020, 5, 4), vec![1, 2, 3]);
        let json = serde_json::to_value(&key).expect("serialize");
        assert_eq!(json["key_data"], "AQID");
        assert_eq!(json["epoch"], "2020-05-04T00:00:00Z");
    }

    #[test]
    fn eph_id_rejects_wrong_length() {
        let err = EphId::try_from(&[0u8; 3][..]).expect_err("should reject short id");
        assert_eq!(err, EphIdLengthError(3));

        let json = format!("\"{}\"", STANDARD.encode([0u8; 8]));
        assert!(serde_json::from_str::<EphId>(&json).is_err());
    }

    #[test]
    fn eph_ids_for_day_matches_its_day() {
        let ids = EphIdsForDay::new(day(2020, 5, 4), vec![EphId::new([7; EPH_ID_LENGTH])]);
        assert!(ids.is_for(day(2020, 5, 4)));
        assert!(!ids.is_for(day(2020, 5, 5)));
    }
}
