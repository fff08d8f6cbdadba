use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::contract::VotingError;

/// The privilege level of a registered identity.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Role {
    /// May register identities and manage the election lifecycle.
    Manager = 1,
    /// May cast votes.
    Customer = 2,
}

impl TryFrom<u8> for Role {
    type Error = VotingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Manager),
            2 => Ok(Self::Customer),
            other => Err(VotingError::InvalidRole(other)),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role as u8
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Manager => "manager",
                Self::Customer => "customer",
            }
        )
    }
}
