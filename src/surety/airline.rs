use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{SuretyError, SuretyResult};
use crate::ledger::{format_units, AccountId, Balance};

/// Admission state of an airline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AirlineState {
    Unregistered,
    Registered,
    /// Registered and paid the operational minimum
    Funded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airline {
    pub account: AccountId,
    pub name: String,
    pub state: AirlineState,
    pub funding: Balance,
}

/// Result of a `register_airline` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Registration {
    Registered,
    /// Endorsement recorded; the candidate still needs more distinct votes
    Pending { votes: usize, required: usize },
}

/// Airline membership with bootstrap admission and per-candidate voting.
#[derive(Debug)]
pub struct AirlineRegistry {
    airlines: HashMap<AccountId, Airline>,
    /// candidate -> endorsing airlines
    votes: HashMap<AccountId, HashSet<AccountId>>,
    /// Display names proposed alongside the first endorsement
    proposed_names: HashMap<AccountId, String>,
    bootstrap_count: usize,
    min_funding: Balance,
}

impl AirlineRegistry {
    /// Create the registry with its first airline registered (not yet funded).
    pub fn new(first_airline: AccountId, name: &str, bootstrap_count: usize, min_funding: Balance) -> Self {
        let mut airlines = HashMap::new();
        airlines.insert(
            first_airline,
            Airline {
                account: first_airline,
                name: name.to_string(),
                state: AirlineState::Registered,
                funding: 0,
            },
        );
        info!("First airline {} ({}) registered", name, first_airline.short());

        Self {
            airlines,
            votes: HashMap::new(),
            proposed_names: HashMap::new(),
            bootstrap_count,
            min_funding,
        }
    }

    /// Registered airlines, funded or not
    pub fn registered_count(&self) -> usize {
        self.airlines.len()
    }

    /// Endorsements needed for a candidate at the current membership size
    pub fn required_votes(&self) -> usize {
        (self.registered_count() + 1) / 2
    }

    pub fn register_airline(
        &mut self,
        candidate: AccountId,
        name: &str,
        caller: &AccountId,
    ) -> SuretyResult<Registration> {
        if !self.is_funded(caller) {
            return Err(SuretyError::Unauthorized(format!(
                "airline {} must be funded to register airlines",
                caller
            )));
        }
        if self.is_registered(&candidate) {
            return Err(SuretyError::Duplicate(format!(
                "airline {} is already registered",
                candidate
            )));
        }

        if self.registered_count() < self.bootstrap_count {
            self.admit(candidate, name.to_string());
            return Ok(Registration::Registered);
        }

        let required = self.required_votes();
        let voters = self.votes.entry(candidate).or_default();
        if voters.contains(caller) {
            return Err(SuretyError::DuplicateVote {
                voter: *caller,
                candidate,
            });
        }
        voters.insert(*caller);
        let votes = voters.len();
        self.proposed_names
            .entry(candidate)
            .or_insert_with(|| name.to_string());

        debug!(
            "Airline {} endorsed {} ({}/{} votes)",
            caller.short(),
            candidate.short(),
            votes,
            required
        );

        if votes >= required {
            self.votes.remove(&candidate);
            let name = self
                .proposed_names
                .remove(&candidate)
                .unwrap_or_else(|| name.to_string());
            self.admit(candidate, name);
            Ok(Registration::Registered)
        } else {
            Ok(Registration::Pending { votes, required })
        }
    }

    fn admit(&mut self, candidate: AccountId, name: String) {
        info!(
            "Airline {} ({}) registered, {} airlines in registry",
            name,
            candidate.short(),
            self.registered_count() + 1
        );
        self.airlines.insert(
            candidate,
            Airline {
                account: candidate,
                name,
                state: AirlineState::Registered,
                funding: 0,
            },
        );
    }

    /// Add funding; returns the airline's state afterwards.
    pub fn fund(&mut self, airline: &AccountId, amount: Balance) -> SuretyResult<AirlineState> {
        if amount == 0 {
            return Err(SuretyError::InvalidAmount("funding amount must be positive".to_string()));
        }
        let min_funding = self.min_funding;
        let record = self
            .airlines
            .get_mut(airline)
            .ok_or(SuretyError::UnknownAirline(*airline))?;

        let funding = record.funding.checked_add(amount).ok_or_else(|| {
            SuretyError::InvalidAmount(format!("funding of {} overflows", amount))
        })?;
        record.funding = funding;

        if record.state == AirlineState::Registered && funding >= min_funding {
            record.state = AirlineState::Funded;
            info!(
                "Airline {} funded with {} units",
                record.name,
                format_units(funding)
            );
        }
        Ok(record.state)
    }

    pub fn airline(&self, account: &AccountId) -> Option<&Airline> {
        self.airlines.get(account)
    }

    pub fn state(&self, account: &AccountId) -> AirlineState {
        self.airlines
            .get(account)
            .map(|a| a.state)
            .unwrap_or(AirlineState::Unregistered)
    }

    /// Known to the registry. Pending candidates are not airlines yet.
    pub fn is_airline(&self, account: &AccountId) -> bool {
        self.airlines.contains_key(account)
    }

    pub fn is_registered(&self, account: &AccountId) -> bool {
        self.state(account) >= AirlineState::Registered
    }

    pub fn is_funded(&self, account: &AccountId) -> bool {
        self.state(account) == AirlineState::Funded
    }

    /// Distinct airlines endorsing a pending candidate
    pub fn pending_votes(&self, candidate: &AccountId) -> usize {
        self.votes.get(candidate).map(|v| v.len()).unwrap_or(0)
    }

    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }
}
