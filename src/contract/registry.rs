use std::collections::HashMap;

use crate::model::{Address, Identity, Role};

use super::error::{Missing, VotingError};

/// The authoritative identity-to-role mapping.
///
/// Identities are only ever appended; registration order is preserved.
#[derive(Debug, Default)]
pub struct Registry {
    users: Vec<Identity>,
    by_address: HashMap<Address, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `caller` may register `address`.
    pub fn check_registration(&self, caller: &Address, address: &Address) -> Result<(), VotingError> {
        self.require(caller, Role::Manager)?;
        if self.by_address.contains_key(address) {
            return Err(VotingError::DuplicateUser(*address));
        }
        Ok(())
    }

    /// Append an identity that has already passed [`Self::check_registration`].
    pub(super) fn insert(&mut self, identity: Identity) {
        debug_assert!(!self.by_address.contains_key(&identity.address));
        self.by_address.insert(identity.address, self.users.len());
        self.users.push(identity);
    }

    /// Check that `caller` is registered with exactly the `required` role.
    pub fn require(&self, caller: &Address, required: Role) -> Result<(), VotingError> {
        match self.identity(caller) {
            Some(identity) if identity.role == required => Ok(()),
            _ => Err(VotingError::Unauthorized {
                caller: *caller,
                required,
            }),
        }
    }

    pub fn identity(&self, address: &Address) -> Option<&Identity> {
        self.by_address.get(address).map(|&i| &self.users[i])
    }

    pub fn role(&self, address: &Address) -> Result<Role, VotingError> {
        self.identity(address)
            .map(|identity| identity.role)
            .ok_or(VotingError::NotFound(Missing::User(*address)))
    }

    /// All registered identities, in registration order.
    pub fn users(&self) -> &[Identity] {
        &self.users
    }

    /// All registered addresses, in registration order.
    pub fn all_users(&self) -> Vec<Address> {
        self.users.iter().map(|identity| identity.address).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
