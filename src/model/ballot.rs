use serde::{Deserialize, Serialize};

use super::{Address, ElectionId};

/// One voter's recorded choice within one election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub election_id: ElectionId,
    pub voter: Address,
    /// Index into the election's options.
    pub choice: usize,
}

/// A vote that a caller wishes to cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub choice: usize,
}
