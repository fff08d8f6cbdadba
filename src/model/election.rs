use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::Address;

/// Our election IDs are sequential integers, starting at 1.
pub type ElectionId = u32;

/// States in the Election lifecycle. Transitions only ever move forwards,
/// one step at a time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Options fixed, not yet accepting votes.
    Created,
    /// Accepting votes.
    Open,
    /// Tally is final. Terminal.
    Closed,
}

impl ElectionState {
    /// The only state this one may move to, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Open),
            Self::Open => Some(Self::Closed),
            Self::Closed => None,
        }
    }
}

impl Display for ElectionState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Created => "created",
                Self::Open => "open",
                Self::Closed => "closed",
            }
        )
    }
}

/// Per-option running vote counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<u64>,
}

impl Tally {
    /// A tally with a zero count for each of `options` options.
    pub fn zeroed(options: usize) -> Self {
        Self {
            counts: vec![0; options],
        }
    }

    /// Votes recorded for the given option, or `None` if out of range.
    pub fn count(&self, choice: usize) -> Option<u64> {
        self.counts.get(choice).copied()
    }

    /// Sum over all options.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts.iter().copied().enumerate()
    }

    /// Record one more vote for `choice`, which the caller has already range-checked.
    pub(crate) fn increment(&mut self, choice: usize) {
        self.counts[choice] += 1;
    }
}

/// An election, as held by the ballot engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    pub id: ElectionId,
    /// Candidate labels, fixed at creation.
    pub options: Vec<String>,
    pub state: ElectionState,
    /// The manager who created it.
    pub created_by: Address,
    pub tally: Tally,
}

impl Election {
    pub fn new(id: ElectionId, options: Vec<String>, created_by: Address) -> Self {
        let tally = Tally::zeroed(options.len());
        Self {
            id,
            options,
            state: ElectionState::Created,
            created_by,
            tally,
        }
    }
}

/// An election as requested by a manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub options: Vec<String>,
}

/// A public view of an election, without its tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub options: Vec<String>,
    pub state: ElectionState,
    pub created_by: Address,
}

impl From<&Election> for ElectionDescription {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id,
            options: election.options.clone(),
            state: election.state,
            created_by: election.created_by,
        }
    }
}

/// A snapshot of an election's tally. Counts are keyed by option index; no
/// winner is ever inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyDescription {
    pub election_id: ElectionId,
    pub state: ElectionState,
    pub options: Vec<String>,
    pub counts: BTreeMap<usize, u64>,
}

impl From<&Election> for TallyDescription {
    fn from(election: &Election) -> Self {
        Self {
            election_id: election.id,
            state: election.state,
            options: election.options.clone(),
            counts: election.tally.iter().collect(),
        }
    }
}
