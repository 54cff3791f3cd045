// Ledger account model
// The insurance core only needs caller identity plus atomic debit/credit;
// the host ledger owns everything else.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::{SuretyError, SuretyResult};

/// Native currency amount in base units.
pub type Balance = u64;

/// Base units per whole currency unit.
pub const UNIT: Balance = 1_000_000;

/// Length of an account identity in bytes
pub const ACCOUNT_ID_LEN: usize = 20;

/// Identity of a ledger party (airline, passenger, oracle, owner).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    pub const fn new(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        AccountId(bytes)
    }

    /// Derive a stable identity from a human-readable label.
    ///
    /// Used by the simulator and tests to name parties ("airline-1",
    /// "passenger-7") without managing keys.
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        bytes.copy_from_slice(&digest[..ACCOUNT_ID_LEN]);
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s.trim_start_matches("0x")).ok()?;
        if raw.len() != ACCOUNT_ID_LEN {
            return None;
        }
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        bytes.copy_from_slice(&raw);
        Some(AccountId(bytes))
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}..{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccountId::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid account id: {}", s)))
    }
}

/// Format a base-unit amount as whole units, e.g. `1500000` -> `1.5`.
pub fn format_units(amount: Balance) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:06}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Native-currency balances as seen by the insurance core.
///
/// Implementations must make each call atomic: a failed debit leaves the
/// balance untouched.
pub trait Ledger {
    fn balance_of(&self, account: &AccountId) -> Balance;

    fn debit(&mut self, account: &AccountId, amount: Balance) -> SuretyResult<()>;

    fn credit(&mut self, account: &AccountId, amount: Balance) -> SuretyResult<()>;
}

/// Map-backed ledger used by the simulator and the test-suite.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    balances: HashMap<AccountId, Balance>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Genesis allocation.
    pub fn with_balances<I>(allocations: I) -> Self
    where
        I: IntoIterator<Item = (AccountId, Balance)>,
    {
        let mut ledger = Self::new();
        for (account, amount) in allocations {
            ledger.mint(&account, amount);
        }
        ledger
    }

    pub fn mint(&mut self, account: &AccountId, amount: Balance) {
        let entry = self.balances.entry(*account).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, account: &AccountId) -> Balance {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn debit(&mut self, account: &AccountId, amount: Balance) -> SuretyResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(SuretyError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        self.balances.insert(*account, available - amount);
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Balance) -> SuretyResult<()> {
        let current = self.balance_of(account);
        let updated = current.checked_add(amount).ok_or_else(|| {
            SuretyError::InvalidAmount(format!("credit of {} overflows balance of {}", amount, account))
        })?;
        self.balances.insert(*account, updated);
        Ok(())
    }
}
