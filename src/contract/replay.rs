use std::io;

use log::{debug, info};
use thiserror::Error;

use crate::model::{ElectionState, Event, EventHash, EventRecord, Identity, Role};

use super::{Contract, Journal, VotingError};

/// Reasons a journal fails to replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Line {line} is not a valid record: {message}")]
    Format { line: usize, message: String },
    #[error("The journal is empty")]
    Empty,
    #[error("Expected record {expected}, found record {found}")]
    Sequence { expected: u64, found: u64 },
    #[error("Record {sequence} does not chain from its predecessor, or its hash is wrong")]
    Chain { sequence: u64 },
    #[error("The first record must be the deployer registering itself as a manager")]
    Genesis,
    #[error("Record {sequence} was rejected: {source}")]
    Rejected {
        sequence: u64,
        #[source]
        source: VotingError,
    },
    #[error("Record {sequence} does not match what the contract produced")]
    Divergence { sequence: u64 },
}

/// Re-execute every record against a fresh contract.
///
/// Each record goes through the same checks as a live call, using the recorded
/// caller and timestamp. The contract must then have produced exactly the
/// recorded record, hash included.
pub(super) fn replay(records: impl IntoIterator<Item = EventRecord>) -> Result<Contract, ReplayError> {
    let mut records = records.into_iter();
    let genesis = records.next().ok_or(ReplayError::Empty)?;
    check_link(&genesis, 0, EventHash::GENESIS)?;

    let mut contract = match &genesis.event {
        Event::UserRegistered {
            registered_by,
            address,
            name,
            role: Role::Manager,
        } if registered_by == address => {
            Contract::deploy(*address, name.clone(), Journal::new(), genesis.timestamp)
                .map_err(|source| ReplayError::Rejected {
                    sequence: 0,
                    source,
                })?
        }
        _ => return Err(ReplayError::Genesis),
    };
    check_produced(&contract, &genesis)?;

    for record in records {
        check_link(&record, contract.journal.next_sequence(), contract.journal.head())?;
        debug!("Replaying record {} from {}", record.sequence, record.event.caller());
        execute(&mut contract, &record).map_err(|source| ReplayError::Rejected {
            sequence: record.sequence,
            source,
        })?;
        check_produced(&contract, &record)?;
    }

    info!(
        "Replayed {} records ({} users, {} elections)",
        contract.journal.next_sequence(),
        contract.registry.len(),
        contract.engine.elections().len()
    );
    Ok(contract)
}

fn check_link(record: &EventRecord, expected: u64, previous: EventHash) -> Result<(), ReplayError> {
    if record.sequence != expected {
        return Err(ReplayError::Sequence {
            expected,
            found: record.sequence,
        });
    }
    if record.previous_hash != previous || !record.is_sealed() {
        return Err(ReplayError::Chain {
            sequence: record.sequence,
        });
    }
    Ok(())
}

fn check_produced(contract: &Contract, record: &EventRecord) -> Result<(), ReplayError> {
    if contract.journal.last() == Some(record) {
        Ok(())
    } else {
        Err(ReplayError::Divergence {
            sequence: record.sequence,
        })
    }
}

fn execute(contract: &mut Contract, record: &EventRecord) -> Result<(), VotingError> {
    let at = record.timestamp;
    match &record.event {
        Event::UserRegistered {
            registered_by,
            address,
            name,
            role,
        } => contract.add_user(
            registered_by,
            Identity {
                address: *address,
                name: name.clone(),
                role: *role,
            },
            at,
        ),
        Event::ElectionCreated {
            created_by,
            options,
            ..
        } => contract
            .create_election(created_by, options.clone(), at)
            .map(|_| ()),
        Event::ElectionOpened {
            opened_by,
            election_id,
        } => contract.transition(opened_by, *election_id, ElectionState::Open, at),
        Event::ElectionClosed {
            closed_by,
            election_id,
        } => contract.transition(closed_by, *election_id, ElectionState::Closed, at),
        Event::VoteCast {
            election_id,
            voter,
            choice,
        } => contract.cast_vote(voter, *election_id, *choice, at),
    }
}
