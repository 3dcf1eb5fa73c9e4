//! Identifiers for collaborators, pools and beneficiaries.
//!
//! Pools and beneficiaries have a stable textual form used on the wire and
//! as database keys:
//!
//! ```text
//! staking                      the staking aggregate pool
//! vault:0x<40 hex>             a single vault pool
//! depositor:0x<40 hex>         a vault depositor
//! stake:<decimal>              a stake position
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::TypesError;

/// A 20-byte account or contract address.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address whose every byte is `byte` (handy for fixtures).
    pub const fn repeat(byte: u8) -> Self {
        Address([byte; 20])
    }

    /// Whether this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| TypesError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidAddress(s.to_string()))?;
        Ok(Address(array))
    }
}

/// A vault, identified by the vault contract's address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub Address);

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VaultId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(VaultId)
    }
}

/// A stake position issued by the staking contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeId(pub u64);

impl fmt::Display for StakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Top-level reward category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Vault depositors.
    Vaults,
    /// Stake positions.
    Staking,
}

/// An accrual unit: a single vault or the staking aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PoolId {
    /// One vault pool.
    Vault(VaultId),
    /// The staking aggregate.
    Staking,
}

impl PoolId {
    /// The category this pool belongs to.
    pub fn category(&self) -> Category {
        match self {
            PoolId::Vault(_) => Category::Vaults,
            PoolId::Staking => Category::Staking,
        }
    }

    /// The vault id, if this is a vault pool.
    pub fn vault(&self) -> Option<VaultId> {
        match self {
            PoolId::Vault(id) => Some(*id),
            PoolId::Staking => None,
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolId::Vault(id) => write!(f, "vault:{id}"),
            PoolId::Staking => f.write_str("staking"),
        }
    }
}

impl FromStr for PoolId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "staking" {
            return Ok(PoolId::Staking);
        }
        match s.strip_prefix("vault:") {
            Some(rest) => VaultId::from_str(rest)
                .map(PoolId::Vault)
                .map_err(|_| TypesError::InvalidPoolId(s.to_string())),
            None => Err(TypesError::InvalidPoolId(s.to_string())),
        }
    }
}

impl From<PoolId> for String {
    fn from(pool: PoolId) -> Self {
        pool.to_string()
    }
}

impl TryFrom<String> for PoolId {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The unit credited with rewards.
///
/// Depositors and stake positions live in disjoint namespaces: a depositor
/// can only be credited from vault pools, a stake only from the staking pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Beneficiary {
    /// A vault depositor address.
    Depositor(Address),
    /// A stake position id.
    Stake(StakeId),
}

impl Beneficiary {
    /// The category whose pools may credit this beneficiary.
    pub fn category(&self) -> Category {
        match self {
            Beneficiary::Depositor(_) => Category::Vaults,
            Beneficiary::Stake(_) => Category::Staking,
        }
    }
}

impl fmt::Display for Beneficiary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Beneficiary::Depositor(address) => write!(f, "depositor:{address}"),
            Beneficiary::Stake(id) => write!(f, "stake:{id}"),
        }
    }
}

impl FromStr for Beneficiary {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidBeneficiary(s.to_string());
        if let Some(rest) = s.strip_prefix("depositor:") {
            return Address::from_str(rest)
                .map(Beneficiary::Depositor)
                .map_err(|_| invalid());
        }
        if let Some(rest) = s.strip_prefix("stake:") {
            return rest
                .parse::<u64>()
                .map(|id| Beneficiary::Stake(StakeId(id)))
                .map_err(|_| invalid());
        }
        Err(invalid())
    }
}

impl From<Beneficiary> for String {
    fn from(beneficiary: Beneficiary) -> Self {
        beneficiary.to_string()
    }
}

impl TryFrom<String> for Beneficiary {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
