use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use data_encoding::{DecodeError, HEXLOWER, HEXLOWER_PERMISSIVE};
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bytes in an address.
pub const ADDRESS_LEN: usize = 20;

/// An opaque, fixed-width account address.
///
/// The text form is `0x` followed by 40 hex digits. Parsing ignores case, so
/// checksummed mixed-case addresses are accepted; display is always lowercase.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", HEXLOWER.encode(&self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Reasons an address string may be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address must start with `0x`")]
    MissingPrefix,
    #[error("Address must have {} hex digits, got {0}", ADDRESS_LEN * 2)]
    WrongLength(usize),
    #[error("Address is not valid hex: {0}")]
    Hex(#[from] DecodeError),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::WrongLength(digits.len()));
        }
        let mut bytes = [0_u8; ADDRESS_LEN];
        HEXLOWER_PERMISSIVE
            .decode_mut(digits.as_bytes(), &mut bytes)
            .map_err(|partial| partial.error)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl<'a> FromParam<'a> for Address {
    type Error = AddressError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}
