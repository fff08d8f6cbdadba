//! The voting contract: a role-gated registry coupled to a ballot engine.
//!
//! Every mutating call takes the calling identity as an explicit parameter and
//! runs to completion under a single write lock: it validates, journals its
//! event, then applies its effect, so a failed call leaves no trace and readers
//! only ever see committed state.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::model::{
    Address, Ballot, ElectionDescription, ElectionId, ElectionState, Event, EventRecord, Identity,
    Role, TallyDescription, UserSpec,
};

mod ballot_engine;
mod error;
mod journal;
mod registry;
mod replay;

pub use ballot_engine::BallotEngine;
pub use error::{Missing, VotingError};
pub use journal::{read_records, EventSink, Journal, JsonLinesSink, Truncate};
pub use registry::Registry;
pub use replay::ReplayError;

pub type Result<T> = std::result::Result<T, VotingError>;

/// Contract state. Only ever touched through [`VotingSystem`]'s lock.
struct Contract {
    registry: Registry,
    engine: BallotEngine,
    journal: Journal,
}

impl Contract {
    /// Register the deployer as the first manager. This is the only
    /// registration not authorized by an existing manager.
    fn deploy(deployer: Address, name: String, journal: Journal, at: DateTime<Utc>) -> Result<Self> {
        let mut contract = Self {
            registry: Registry::new(),
            engine: BallotEngine::new(),
            journal,
        };
        let identity = Identity {
            address: deployer,
            name,
            role: Role::Manager,
        };
        contract.journal.append(registration_event(&deployer, &identity), at)?;
        contract.registry.insert(identity);
        info!("Contract deployed by {deployer}");
        Ok(contract)
    }

    fn add_user(&mut self, caller: &Address, identity: Identity, at: DateTime<Utc>) -> Result<()> {
        self.registry.check_registration(caller, &identity.address)?;
        self.journal.append(registration_event(caller, &identity), at)?;
        info!(
            "{caller} registered {} ({:?}) as {}",
            identity.address, identity.name, identity.role
        );
        self.registry.insert(identity);
        Ok(())
    }

    /// Register from a raw request. Authorization is checked before the role
    /// is converted, so only managers ever learn a role is invalid.
    fn register(&mut self, caller: &Address, spec: UserSpec, at: DateTime<Utc>) -> Result<()> {
        self.registry.require(caller, Role::Manager)?;
        let identity = Identity::try_from(spec)?;
        self.add_user(caller, identity, at)
    }

    fn create_election(
        &mut self,
        caller: &Address,
        options: Vec<String>,
        at: DateTime<Utc>,
    ) -> Result<ElectionId> {
        self.engine.check_create(&self.registry, caller, &options)?;
        let event = Event::ElectionCreated {
            created_by: *caller,
            election_id: self.engine.next_id(),
            options: options.clone(),
        };
        self.journal.append(event, at)?;
        let id = self.engine.create(*caller, options);
        info!("{caller} created election {id}");
        Ok(id)
    }

    fn transition(
        &mut self,
        caller: &Address,
        id: ElectionId,
        to: ElectionState,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.engine.check_transition(&self.registry, caller, id, to)?;
        let event = match to {
            ElectionState::Open => Event::ElectionOpened {
                opened_by: *caller,
                election_id: id,
            },
            // `check_transition` never lets anything move back into `Created`.
            ElectionState::Created | ElectionState::Closed => Event::ElectionClosed {
                closed_by: *caller,
                election_id: id,
            },
        };
        self.journal.append(event, at)?;
        self.engine.transition(id, to);
        info!("{caller} moved election {id} to {to}");
        Ok(())
    }

    fn cast_vote(
        &mut self,
        caller: &Address,
        id: ElectionId,
        choice: usize,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.engine.check_vote(&self.registry, caller, id, choice)?;
        let event = Event::VoteCast {
            election_id: id,
            voter: *caller,
            choice,
        };
        self.journal.append(event, at)?;
        self.engine.record_vote(Ballot {
            election_id: id,
            voter: *caller,
            choice,
        });
        info!("{caller} voted in election {id}");
        Ok(())
    }
}

fn registration_event(caller: &Address, identity: &Identity) -> Event {
    Event::UserRegistered {
        registered_by: *caller,
        address: identity.address,
        name: identity.name.clone(),
        role: identity.role,
    }
}

/// Log a rejected call before handing the error back.
fn rejected<T>(operation: &str, caller: &Address, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        debug!("{operation} by {caller} rejected: {e}");
    }
    result
}

/// A deployed voting contract, safe to share between threads.
pub struct VotingSystem {
    contract: RwLock<Contract>,
}

impl VotingSystem {
    /// Deploy a contract whose journal lives only in memory.
    pub fn deploy(deployer: Address, name: impl Into<String>) -> Self {
        match Contract::deploy(deployer, name.into(), Journal::new(), Utc::now()) {
            Ok(contract) => Self::from_contract(contract),
            // An in-memory journal has no sink, so appending cannot fail.
            Err(e) => unreachable!("in-memory deployment failed: {e}"),
        }
    }

    /// Deploy a contract that also writes its journal to `sink`.
    pub fn deploy_with_sink(
        deployer: Address,
        name: impl Into<String>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        let contract = Contract::deploy(deployer, name.into(), Journal::with_sink(sink), Utc::now())?;
        Ok(Self::from_contract(contract))
    }

    /// Rebuild a contract from its journal, verifying every record.
    pub fn replay(
        records: impl IntoIterator<Item = EventRecord>,
    ) -> std::result::Result<Self, ReplayError> {
        replay::replay(records).map(Self::from_contract)
    }

    fn from_contract(contract: Contract) -> Self {
        Self {
            contract: RwLock::new(contract),
        }
    }

    // A panic can only happen before a call's effects are applied, so a
    // poisoned lock still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, Contract> {
        self.contract.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Contract> {
        self.contract.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist all future events to `sink` as well.
    pub fn attach_sink(&self, sink: Box<dyn EventSink>) {
        self.write().journal.attach(sink);
    }

    /// The address registered at deployment.
    pub fn deployer(&self) -> Address {
        // The deployer is always the first registered identity.
        self.read().registry.users()[0].address
    }

    pub fn add_user(&self, caller: &Address, identity: Identity) -> Result<()> {
        let result = self.write().add_user(caller, identity, Utc::now());
        rejected("add_user", caller, result)
    }

    /// [`Self::add_user`], taking the role as its raw integer.
    pub fn register(&self, caller: &Address, spec: UserSpec) -> Result<()> {
        let result = self.write().register(caller, spec, Utc::now());
        rejected("add_user", caller, result)
    }

    /// Registered addresses, in registration order.
    pub fn all_users(&self) -> Vec<Address> {
        self.read().registry.all_users()
    }

    /// Registered identities, in registration order.
    pub fn users(&self) -> Vec<Identity> {
        self.read().registry.users().to_vec()
    }

    pub fn identity(&self, address: &Address) -> Result<Identity> {
        self.read()
            .registry
            .identity(address)
            .cloned()
            .ok_or(VotingError::NotFound(Missing::User(*address)))
    }

    pub fn role(&self, address: &Address) -> Result<Role> {
        self.read().registry.role(address)
    }

    pub fn create_election(&self, caller: &Address, options: Vec<String>) -> Result<ElectionId> {
        let result = self.write().create_election(caller, options, Utc::now());
        rejected("create_election", caller, result)
    }

    pub fn open_election(&self, caller: &Address, id: ElectionId) -> Result<()> {
        let result = self
            .write()
            .transition(caller, id, ElectionState::Open, Utc::now());
        rejected("open_election", caller, result)
    }

    pub fn close_election(&self, caller: &Address, id: ElectionId) -> Result<()> {
        let result = self
            .write()
            .transition(caller, id, ElectionState::Closed, Utc::now());
        rejected("close_election", caller, result)
    }

    pub fn cast_vote(&self, caller: &Address, id: ElectionId, choice: usize) -> Result<()> {
        let result = self.write().cast_vote(caller, id, choice, Utc::now());
        rejected("cast_vote", caller, result)
    }

    /// Exact running counts, in any state.
    pub fn tally(&self, id: ElectionId) -> Result<TallyDescription> {
        self.read().engine.election(id).map(TallyDescription::from)
    }

    pub fn election(&self, id: ElectionId) -> Result<ElectionDescription> {
        self.read().engine.election(id).map(ElectionDescription::from)
    }

    pub fn elections(&self) -> Vec<ElectionDescription> {
        self.read()
            .engine
            .elections()
            .iter()
            .map(ElectionDescription::from)
            .collect()
    }

    pub fn has_voted(&self, id: ElectionId, voter: &Address) -> bool {
        self.read().engine.has_voted(id, voter)
    }

    /// Number of successful votes in an election.
    pub fn ballot_count(&self, id: ElectionId) -> usize {
        self.read().engine.ballot_count(id)
    }

    /// Journal records with a sequence number of at least `since`.
    pub fn events_since(&self, since: u64) -> Vec<EventRecord> {
        let contract = self.read();
        let records = contract.journal.records();
        let start = usize::try_from(since).unwrap_or(usize::MAX).min(records.len());
        records[start..].to_vec()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events_since(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    const MANAGER: Address = Address::new([1; 20]);
    const U1: Address = Address::new([2; 20]);
    const U2: Address = Address::new([3; 20]);
    const STRANGER: Address = Address::new([9; 20]);

    fn identity(address: Address, role: Role) -> Identity {
        Identity {
            address,
            name: format!("{role} {address}"),
            role,
        }
    }

    fn yes_no() -> Vec<String> {
        vec!["Yes".to_string(), "No".to_string()]
    }

    /// Sum of the tally equals the number of recorded ballots.
    fn assert_tally_consistent(system: &VotingSystem, id: ElectionId) {
        let tally = system.tally(id).unwrap();
        let total: u64 = tally.counts.values().sum();
        assert_eq!(total as usize, system.ballot_count(id));
    }

    #[test]
    fn deployer_is_first_manager() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        assert_eq!(system.deployer(), MANAGER);
        assert_eq!(system.all_users(), vec![MANAGER]);
        assert_eq!(system.role(&MANAGER).unwrap(), Role::Manager);

        let events = system.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event,
            Event::UserRegistered {
                registered_by: MANAGER,
                address: MANAGER,
                name: "Deployer".to_string(),
                role: Role::Manager,
            }
        );
    }

    #[test]
    fn duplicate_registration_always_fails() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();

        // Same address, any name or role.
        for role in [Role::Customer, Role::Manager] {
            let mut again = identity(U1, role);
            again.name = "Someone else".to_string();
            assert!(matches!(
                system.add_user(&MANAGER, again),
                Err(VotingError::DuplicateUser(a)) if a == U1
            ));
        }
        // The deployer cannot be re-registered either.
        assert!(matches!(
            system.add_user(&MANAGER, identity(MANAGER, Role::Customer)),
            Err(VotingError::DuplicateUser(_))
        ));
        assert_eq!(system.all_users(), vec![MANAGER, U1]);
        assert_eq!(system.identity(&U1).unwrap().name, identity(U1, Role::Customer).name);
        assert_eq!(system.events().len(), 2);
    }

    #[test]
    fn non_managers_change_nothing() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        let id = system.create_election(&MANAGER, yes_no()).unwrap();
        let events_before = system.events();

        for caller in [U1, STRANGER] {
            assert!(matches!(
                system.add_user(&caller, identity(U2, Role::Customer)),
                Err(VotingError::Unauthorized { .. })
            ));
            assert!(matches!(
                system.create_election(&caller, yes_no()),
                Err(VotingError::Unauthorized { .. })
            ));
            assert!(matches!(
                system.open_election(&caller, id),
                Err(VotingError::Unauthorized { .. })
            ));
            assert!(matches!(
                system.close_election(&caller, id),
                Err(VotingError::Unauthorized { .. })
            ));
        }

        assert_eq!(system.all_users(), vec![MANAGER, U1]);
        assert_eq!(system.elections().len(), 1);
        assert_eq!(system.election(id).unwrap().state, ElectionState::Created);
        assert_eq!(system.events(), events_before);
    }

    #[test]
    fn invalid_options_rejected() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        assert!(matches!(
            system.create_election(&MANAGER, Vec::new()),
            Err(VotingError::InvalidOptions(_))
        ));
        assert!(matches!(
            system.create_election(&MANAGER, vec!["A".to_string(), "A".to_string()]),
            Err(VotingError::InvalidOptions(_))
        ));
        assert!(system.elections().is_empty());
        // No ID was consumed by the failures.
        assert_eq!(system.create_election(&MANAGER, yes_no()).unwrap(), 1);
    }

    #[test]
    fn votes_only_while_open() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        let id = system.create_election(&MANAGER, yes_no()).unwrap();

        assert!(matches!(
            system.cast_vote(&U1, id, 0),
            Err(VotingError::ElectionNotOpen { state: ElectionState::Created, .. })
        ));
        assert_eq!(system.tally(id).unwrap().counts.values().sum::<u64>(), 0);

        system.open_election(&MANAGER, id).unwrap();
        system.close_election(&MANAGER, id).unwrap();
        assert!(matches!(
            system.cast_vote(&U1, id, 0),
            Err(VotingError::ElectionNotOpen { state: ElectionState::Closed, .. })
        ));
        assert_eq!(system.tally(id).unwrap().counts.values().sum::<u64>(), 0);
        assert!(!system.has_voted(id, &U1));
    }

    #[test]
    fn yes_no_scenario() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        let id = system.create_election(&MANAGER, yes_no()).unwrap();
        system.open_election(&MANAGER, id).unwrap();

        system.cast_vote(&U1, id, 0).unwrap();
        let tally = system.tally(id).unwrap();
        assert_eq!(tally.counts.into_iter().collect::<Vec<_>>(), vec![(0, 1), (1, 0)]);

        assert!(matches!(
            system.cast_vote(&U1, id, 1),
            Err(VotingError::AlreadyVoted { .. })
        ));
        let tally = system.tally(id).unwrap();
        assert_eq!(tally.counts.into_iter().collect::<Vec<_>>(), vec![(0, 1), (1, 0)]);

        system.close_election(&MANAGER, id).unwrap();
        system.add_user(&MANAGER, identity(U2, Role::Customer)).unwrap();
        assert!(matches!(
            system.cast_vote(&U2, id, 1),
            Err(VotingError::ElectionNotOpen { .. })
        ));

        let tally = system.tally(id).unwrap();
        assert_eq!(tally.state, ElectionState::Closed);
        assert_eq!(tally.counts.into_iter().collect::<Vec<_>>(), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn unregistered_voter_rejected() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        let id = system.create_election(&MANAGER, yes_no()).unwrap();
        system.open_election(&MANAGER, id).unwrap();
        let events_before = system.events().len();

        assert!(matches!(
            system.cast_vote(&STRANGER, id, 0),
            Err(VotingError::Unauthorized { caller, required: Role::Customer }) if caller == STRANGER
        ));
        assert!(!system.has_voted(id, &STRANGER));
        assert_eq!(system.ballot_count(id), 0);
        assert_eq!(system.events().len(), events_before);
        assert_tally_consistent(&system, id);
    }

    #[test]
    fn tally_tracks_successful_votes() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        let voters: Vec<_> = (10..30).map(|b| Address::new([b; 20])).collect();
        for voter in &voters {
            system.add_user(&MANAGER, identity(*voter, Role::Customer)).unwrap();
        }
        let id = system
            .create_election(&MANAGER, vec!["A".into(), "B".into(), "C".into()])
            .unwrap();
        system.open_election(&MANAGER, id).unwrap();

        for (i, voter) in voters.iter().enumerate() {
            system.cast_vote(voter, id, i % 3).unwrap();
            // Invalid and repeated attempts never count.
            assert!(system.cast_vote(voter, id, 3).is_err());
            assert!(system.cast_vote(voter, id, 0).is_err());
            assert_tally_consistent(&system, id);
        }

        let tally = system.tally(id).unwrap();
        assert_eq!(tally.counts[&0], 7);
        assert_eq!(tally.counts[&1], 7);
        assert_eq!(tally.counts[&2], 6);
    }

    #[test]
    fn concurrent_votes_all_counted_once() {
        let system = Arc::new(VotingSystem::deploy(MANAGER, "Deployer"));
        let voters: Vec<_> = (10..42).map(|b| Address::new([b; 20])).collect();
        for voter in &voters {
            system.add_user(&MANAGER, identity(*voter, Role::Customer)).unwrap();
        }
        let id = system.create_election(&MANAGER, yes_no()).unwrap();
        system.open_election(&MANAGER, id).unwrap();

        // Every voter tries twice, from two threads.
        let handles: Vec<_> = voters
            .iter()
            .chain(voters.iter())
            .map(|voter| {
                let system = system.clone();
                let voter = *voter;
                thread::spawn(move || system.cast_vote(&voter, id, 1).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, voters.len());
        assert_eq!(system.tally(id).unwrap().counts[&1], voters.len() as u64);
        assert_tally_consistent(&system, id);
    }

    #[test]
    fn register_checks_caller_before_role() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        let spec = UserSpec {
            address: U2,
            name: "Bad role".to_string(),
            role: 9,
        };

        for caller in [U1, STRANGER] {
            assert!(matches!(
                system.register(&caller, spec.clone()),
                Err(VotingError::Unauthorized { .. })
            ));
        }
        assert!(matches!(
            system.register(&MANAGER, spec.clone()),
            Err(VotingError::InvalidRole(9))
        ));

        system
            .register(
                &MANAGER,
                UserSpec {
                    role: Role::Customer.into(),
                    ..spec
                },
            )
            .unwrap();
        assert_eq!(system.role(&U2).unwrap(), Role::Customer);
    }

    /// Accepts a fixed number of records, then fails every write.
    struct FailingSink {
        remaining: usize,
    }

    impl EventSink for FailingSink {
        fn write(&mut self, _: &EventRecord) -> std::io::Result<()> {
            if self.remaining == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    #[test]
    fn failed_journal_write_changes_nothing() {
        // Genesis, one customer, one election, and opening it.
        let sink = FailingSink { remaining: 4 };
        let system = VotingSystem::deploy_with_sink(MANAGER, "Deployer", Box::new(sink)).unwrap();
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        let id = system.create_election(&MANAGER, yes_no()).unwrap();
        system.open_election(&MANAGER, id).unwrap();

        let users_before = system.all_users();
        let elections_before = system.elections();
        let tally_before = system.tally(id).unwrap();
        let events_before = system.events();

        assert!(matches!(
            system.add_user(&MANAGER, identity(U2, Role::Customer)),
            Err(VotingError::Journal(_))
        ));
        assert!(matches!(
            system.create_election(&MANAGER, yes_no()),
            Err(VotingError::Journal(_))
        ));
        assert!(matches!(
            system.cast_vote(&U1, id, 0),
            Err(VotingError::Journal(_))
        ));
        assert!(matches!(
            system.close_election(&MANAGER, id),
            Err(VotingError::Journal(_))
        ));

        assert_eq!(system.all_users(), users_before);
        assert!(matches!(system.role(&U2), Err(VotingError::NotFound(_))));
        assert_eq!(system.elections(), elections_before);
        assert_eq!(system.election(id).unwrap().state, ElectionState::Open);
        assert_eq!(system.tally(id).unwrap(), tally_before);
        assert_eq!(system.ballot_count(id), 0);
        assert!(!system.has_voted(id, &U1));
        assert_eq!(system.events(), events_before);
    }

    #[test]
    fn events_since_sequence() {
        let system = VotingSystem::deploy(MANAGER, "Deployer");
        system.add_user(&MANAGER, identity(U1, Role::Customer)).unwrap();
        system.create_election(&MANAGER, yes_no()).unwrap();

        assert_eq!(system.events_since(0).len(), 3);
        let tail = system.events_since(1);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 1);
        assert!(system.events_since(3).is_empty());
        assert!(system.events_since(u64::MAX).is_empty());
    }
}
