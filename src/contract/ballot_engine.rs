use std::collections::{HashMap, HashSet};

use crate::model::{Address, Ballot, Election, ElectionId, ElectionState, Role, Tally};

use super::error::{Missing, VotingError};
use super::registry::Registry;

/// Election lifecycle and vote integrity.
///
/// Every mutation is split into a `check_*` step, which may fail and never
/// changes anything, and an infallible apply step. The contract journals the
/// event between the two.
#[derive(Debug, Default)]
pub struct BallotEngine {
    /// Election `n` lives at index `n - 1`.
    elections: Vec<Election>,
    /// At most one ballot per (election, voter).
    ballots: HashMap<(ElectionId, Address), Ballot>,
}

impl BallotEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ID the next created election will receive.
    pub fn next_id(&self) -> ElectionId {
        self.elections.len() as ElectionId + 1
    }

    pub fn election(&self, id: ElectionId) -> Result<&Election, VotingError> {
        id.checked_sub(1)
            .and_then(|index| self.elections.get(index as usize))
            .ok_or(VotingError::NotFound(Missing::Election(id)))
    }

    fn election_mut(&mut self, id: ElectionId) -> &mut Election {
        &mut self.elections[id as usize - 1]
    }

    /// All elections, in creation order.
    pub fn elections(&self) -> &[Election] {
        &self.elections
    }

    pub fn tally(&self, id: ElectionId) -> Result<&Tally, VotingError> {
        self.election(id).map(|election| &election.tally)
    }

    pub fn has_voted(&self, id: ElectionId, voter: &Address) -> bool {
        self.ballots.contains_key(&(id, *voter))
    }

    /// Number of ballots recorded for an election.
    pub fn ballot_count(&self, id: ElectionId) -> usize {
        self.ballots.keys().filter(|(election, _)| *election == id).count()
    }

    /// Check that `caller` may create an election with these options.
    pub fn check_create(
        &self,
        registry: &Registry,
        caller: &Address,
        options: &[String],
    ) -> Result<(), VotingError> {
        registry.require(caller, Role::Manager)?;
        if options.is_empty() {
            return Err(VotingError::InvalidOptions(
                "an election needs at least one option".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in options {
            if !seen.insert(option.as_str()) {
                return Err(VotingError::InvalidOptions(format!(
                    "duplicate option '{option}'"
                )));
            }
        }
        Ok(())
    }

    pub(super) fn create(&mut self, caller: Address, options: Vec<String>) -> ElectionId {
        let id = self.next_id();
        self.elections.push(Election::new(id, options, caller));
        id
    }

    /// Check that `caller` may move election `id` into state `to`.
    pub fn check_transition(
        &self,
        registry: &Registry,
        caller: &Address,
        id: ElectionId,
        to: ElectionState,
    ) -> Result<(), VotingError> {
        registry.require(caller, Role::Manager)?;
        let from = self.election(id)?.state;
        if from.successor() != Some(to) {
            return Err(VotingError::InvalidStateTransition {
                election_id: id,
                from,
                to,
            });
        }
        Ok(())
    }

    pub(super) fn transition(&mut self, id: ElectionId, to: ElectionState) {
        let election = self.election_mut(id);
        debug_assert_eq!(election.state.successor(), Some(to));
        election.state = to;
    }

    /// Check that `caller` may cast a vote for option `choice` of election `id`.
    pub fn check_vote(
        &self,
        registry: &Registry,
        caller: &Address,
        id: ElectionId,
        choice: usize,
    ) -> Result<(), VotingError> {
        registry.require(caller, Role::Customer)?;
        let election = self.election(id)?;
        if election.state != ElectionState::Open {
            return Err(VotingError::ElectionNotOpen {
                election_id: id,
                state: election.state,
            });
        }
        if choice >= election.options.len() {
            return Err(VotingError::InvalidChoice {
                election_id: id,
                choice,
                options: election.options.len(),
            });
        }
        if self.has_voted(id, caller) {
            return Err(VotingError::AlreadyVoted {
                election_id: id,
                voter: *caller,
            });
        }
        Ok(())
    }

    /// Record a ballot and count it, together.
    pub(super) fn record_vote(&mut self, ballot: Ballot) {
        self.election_mut(ballot.election_id).tally.increment(ballot.choice);
        self.ballots.insert((ballot.election_id, ballot.voter), ballot);
    }
}
