use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{SuretyError, SuretyResult};
use crate::ledger::{format_units, AccountId, Balance, Ledger};
use crate::surety::flight::{FlightKey, FlightRegistry};
use crate::surety::status::FlightStatus;

/// A passenger's cover on one flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub passenger: AccountId,
    pub flight: FlightKey,
    pub premium_paid: Balance,
    /// Zero until credited, then fixed
    pub credited_payout: Balance,
    pub withdrawn: bool,
}

impl InsurancePolicy {
    /// Credit still waiting to be withdrawn
    pub fn outstanding(&self) -> Balance {
        if self.withdrawn {
            0
        } else {
            self.credited_payout
        }
    }
}

/// Passenger policies and the contract-held funds backing them.
#[derive(Debug)]
pub struct InsuranceEscrow {
    policies: HashMap<FlightKey, BTreeMap<AccountId, InsurancePolicy>>,
    balance: Balance,
    max_premium: Balance,
    multiplier_num: u64,
    multiplier_den: u64,
}

impl InsuranceEscrow {
    pub fn new(max_premium: Balance, multiplier_num: u64, multiplier_den: u64) -> Self {
        Self {
            policies: HashMap::new(),
            balance: 0,
            max_premium,
            multiplier_num,
            multiplier_den,
        }
    }

    /// Contract-wide escrow total
    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn multiplier(&self) -> (u64, u64) {
        (self.multiplier_num, self.multiplier_den)
    }

    /// Funds entering escrow outside of premiums (airline funding)
    pub fn deposit(&mut self, amount: Balance) -> SuretyResult<()> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            SuretyError::InvalidAmount(format!("deposit of {} overflows escrow", amount))
        })?;
        Ok(())
    }

    /// Buy (or top up) cover; returns the policy's cumulative premium.
    pub fn buy_insurance<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        flights: &FlightRegistry,
        key: &FlightKey,
        passenger: &AccountId,
        amount: Balance,
    ) -> SuretyResult<Balance> {
        let status = flights.status_code(key)?;
        if status != FlightStatus::Unknown {
            return Err(SuretyError::FlightAlreadyResolved(key.to_string()));
        }
        if amount == 0 {
            return Err(SuretyError::InvalidAmount("premium must be positive".to_string()));
        }

        let already_paid = self.insurees_balance(key, passenger);
        let total = already_paid.saturating_add(amount);
        if total > self.max_premium {
            return Err(SuretyError::PremiumTooHigh {
                amount: total,
                max: self.max_premium,
            });
        }
        let new_balance = self.balance.checked_add(amount).ok_or_else(|| {
            SuretyError::InvalidAmount(format!("premium of {} overflows escrow", amount))
        })?;

        ledger.debit(passenger, amount)?;

        self.balance = new_balance;
        let policy = self
            .policies
            .entry(*key)
            .or_default()
            .entry(*passenger)
            .or_insert_with(|| InsurancePolicy {
                passenger: *passenger,
                flight: *key,
                premium_paid: 0,
                credited_payout: 0,
                withdrawn: false,
            });
        policy.premium_paid = total;

        info!(
            "Passenger {} insured flight {} for {} units",
            passenger.short(),
            key,
            format_units(total)
        );
        Ok(total)
    }

    /// Credit every uncredited policy on a flight when `status` pays out.
    ///
    /// Returns the policies credited by this call only.
    pub fn credit_insurees(
        &mut self,
        flights: &FlightRegistry,
        key: &FlightKey,
        status: FlightStatus,
    ) -> SuretyResult<Vec<(AccountId, Balance)>> {
        if !flights.is_registered_flight(key) {
            return Err(SuretyError::UnknownFlight(key.to_string()));
        }
        if !status.triggers_payout() {
            return Ok(Vec::new());
        }

        let (num, den) = (self.multiplier_num as u128, self.multiplier_den as u128);
        let mut credited = Vec::new();
        if let Some(policies) = self.policies.get_mut(key) {
            for policy in policies.values_mut() {
                if policy.credited_payout > 0 || policy.withdrawn {
                    continue;
                }
                let payout = (policy.premium_paid as u128 * num / den).min(Balance::MAX as u128);
                policy.credited_payout = payout as Balance;
                credited.push((policy.passenger, policy.credited_payout));
            }
        }

        if !credited.is_empty() {
            info!("Credited {} insurees on flight {}", credited.len(), key);
        }
        Ok(credited)
    }

    /// Withdraw a credited payout to the passenger.
    ///
    /// The policy is marked withdrawn and the escrow debited before the
    /// ledger transfer; a failed transfer restores both.
    pub fn insuree_payout<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        key: &FlightKey,
        passenger: &AccountId,
    ) -> SuretyResult<Balance> {
        let escrow = self.balance;
        let policy = self
            .policies
            .get_mut(key)
            .and_then(|p| p.get_mut(passenger))
            .ok_or(SuretyError::NothingCredited)?;

        let amount = policy.outstanding();
        if amount == 0 {
            return Err(SuretyError::NothingCredited);
        }
        if escrow < amount {
            warn!(
                "Escrow holds {} units, cannot pay {} units to {}",
                format_units(escrow),
                format_units(amount),
                passenger.short()
            );
            return Err(SuretyError::InsufficientFunds {
                needed: amount,
                available: escrow,
            });
        }

        policy.withdrawn = true;
        self.balance = escrow - amount;

        if let Err(err) = ledger.credit(passenger, amount) {
            if let Some(policy) = self.policies.get_mut(key).and_then(|p| p.get_mut(passenger)) {
                policy.withdrawn = false;
            }
            self.balance = escrow;
            return Err(err);
        }

        info!(
            "Paid {} units to passenger {} for flight {}",
            format_units(amount),
            passenger.short(),
            key
        );
        Ok(amount)
    }

    /// Premium paid by a passenger on a flight
    pub fn insurees_balance(&self, key: &FlightKey, passenger: &AccountId) -> Balance {
        self.policy(key, passenger).map(|p| p.premium_paid).unwrap_or(0)
    }

    /// Credit awaiting withdrawal; zero before crediting and after payout
    pub fn insurance_payout(&self, key: &FlightKey, passenger: &AccountId) -> Balance {
        self.policy(key, passenger).map(|p| p.outstanding()).unwrap_or(0)
    }

    pub fn policy(&self, key: &FlightKey, passenger: &AccountId) -> Option<&InsurancePolicy> {
        self.policies.get(key).and_then(|p| p.get(passenger))
    }

    pub fn policies_for(&self, key: &FlightKey) -> impl Iterator<Item = &InsurancePolicy> {
        self.policies.get(key).into_iter().flat_map(|p| p.values())
    }
}
