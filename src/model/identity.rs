use serde::{Deserialize, Serialize};

use crate::contract::VotingError;

use super::{Address, Role};

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique key.
    pub address: Address,
    /// Display name; not authoritative, may be empty or shared.
    pub name: String,
    /// Fixed at registration.
    pub role: Role,
}

/// A registration request as received from a caller. The role is still the raw
/// integer, so unknown values can be reported as `InvalidRole` rather than a
/// generic parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    pub address: Address,
    pub name: String,
    pub role: u8,
}

impl TryFrom<UserSpec> for Identity {
    type Error = VotingError;

    fn try_from(spec: UserSpec) -> Result<Self, Self::Error> {
        Ok(Self {
            address: spec.address,
            name: spec.name,
            role: spec.role.try_into()?,
        })
    }
}
