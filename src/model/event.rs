use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{Address, ElectionId, Role};

/// Number of bytes in an event hash.
pub const HASH_LEN: usize = 32;

/// A SHA-256 digest linking one journal record to the next.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventHash([u8; HASH_LEN]);

impl EventHash {
    /// The `previous_hash` of the first record in every journal.
    pub const GENESIS: Self = Self([0; HASH_LEN]);
}

impl Display for EventHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

impl Debug for EventHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventHash({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid event hash: {0}")]
pub struct EventHashError(String);

impl FromStr for EventHash {
    type Err = EventHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| EventHashError(e.to_string()))?;
        let bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| EventHashError(format!("expected {HASH_LEN} bytes, got {}", b.len())))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for EventHash {
    type Error = EventHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EventHash> for String {
    fn from(hash: EventHash) -> Self {
        hash.to_string()
    }
}

/// A committed state transition. Each variant carries the acting identity, so
/// the whole contract state can be rebuilt from history alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    UserRegistered {
        registered_by: Address,
        address: Address,
        name: String,
        role: Role,
    },
    ElectionCreated {
        created_by: Address,
        election_id: ElectionId,
        options: Vec<String>,
    },
    ElectionOpened {
        opened_by: Address,
        election_id: ElectionId,
    },
    ElectionClosed {
        closed_by: Address,
        election_id: ElectionId,
    },
    VoteCast {
        election_id: ElectionId,
        voter: Address,
        choice: usize,
    },
}

impl Event {
    /// The identity whose call produced this event.
    pub fn caller(&self) -> Address {
        match self {
            Self::UserRegistered { registered_by, .. } => *registered_by,
            Self::ElectionCreated { created_by, .. } => *created_by,
            Self::ElectionOpened { opened_by, .. } => *opened_by,
            Self::ElectionClosed { closed_by, .. } => *closed_by,
            Self::VoteCast { voter, .. } => *voter,
        }
    }
}

/// One entry of the append-only journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    /// Hash of the preceding record, or [`EventHash::GENESIS`].
    pub previous_hash: EventHash,
    /// Hash over all of the above.
    pub hash: EventHash,
}

impl EventRecord {
    /// Create a record, computing its hash.
    pub fn seal(
        sequence: u64,
        timestamp: DateTime<Utc>,
        event: Event,
        previous_hash: EventHash,
    ) -> Self {
        let hash = Self::digest(sequence, &timestamp, &event, &previous_hash);
        Self {
            sequence,
            timestamp,
            event,
            previous_hash,
            hash,
        }
    }

    /// Does the stored hash match the record's contents?
    pub fn is_sealed(&self) -> bool {
        self.hash == Self::digest(self.sequence, &self.timestamp, &self.event, &self.previous_hash)
    }

    /// `SHA-256(previous_hash || sequence (u64 BE) || RFC 3339 timestamp, nanosecond precision || JSON(event))`.
    fn digest(
        sequence: u64,
        timestamp: &DateTime<Utc>,
        event: &Event,
        previous_hash: &EventHash,
    ) -> EventHash {
        let event_json = serde_json::to_vec(event).expect("Event serialization is infallible");
        let mut hasher = Sha256::new();
        hasher.update(previous_hash.0);
        hasher.update(sequence.to_be_bytes());
        hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true));
        hasher.update(event_json);
        EventHash(hasher.finalize().into())
    }
}
