//! Types shared between the contract, the API, and the audit tooling.

mod address;
pub mod auth;
mod ballot;
mod election;
mod event;
mod identity;
pub mod pagination;
mod role;

pub use address::{Address, AddressError, ADDRESS_LEN};
pub use ballot::{Ballot, VoteSpec};
pub use election::{
    Election, ElectionDescription, ElectionId, ElectionSpec, ElectionState, Tally,
    TallyDescription,
};
pub use event::{Event, EventHash, EventHashError, EventRecord, HASH_LEN};
pub use identity::{Identity, UserSpec};
pub use role::Role;
