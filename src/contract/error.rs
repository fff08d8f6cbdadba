use std::fmt::Display;
use std::io;

use thiserror::Error;

use crate::model::{Address, ElectionId, ElectionState, Role};

/// Something the contract could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    User(Address),
    Election(ElectionId),
}

impl Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(address) => write!(f, "user {address}"),
            Self::Election(id) => write!(f, "election {id}"),
        }
    }
}

/// Reasons a contract call is rejected. A rejected call never changes state.
#[derive(Debug, Error)]
pub enum VotingError {
    #[error("Unauthorized: {caller} must be a registered {required}")]
    Unauthorized { caller: Address, required: Role },
    #[error("User already exists: {0}")]
    DuplicateUser(Address),
    #[error("Invalid role: {0}")]
    InvalidRole(u8),
    #[error("Not found: {0}")]
    NotFound(Missing),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Invalid choice {choice} for election {election_id} with {options} options")]
    InvalidChoice {
        election_id: ElectionId,
        choice: usize,
        options: usize,
    },
    #[error("{voter} has already voted in election {election_id}")]
    AlreadyVoted {
        election_id: ElectionId,
        voter: Address,
    },
    #[error("Election {election_id} is not open (currently {state})")]
    ElectionNotOpen {
        election_id: ElectionId,
        state: ElectionState,
    },
    #[error("Election {election_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        election_id: ElectionId,
        from: ElectionState,
        to: ElectionState,
    },
    #[error("Failed to record event: {0}")]
    Journal(#[from] io::Error),
}
