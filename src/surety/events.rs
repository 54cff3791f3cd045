use serde::Serialize;

use crate::ledger::{AccountId, Balance};
use crate::surety::flight::FlightKey;
use crate::surety::oracle::OracleIndex;
use crate::surety::status::FlightStatus;

/// Notifications emitted by the contract.
///
/// Oracle workers only need `OracleRequest`; the rest is bookkeeping for
/// front ends and monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum SuretyEvent {
    OperatingStatusChanged {
        operational: bool,
    },
    AirlineRegistered {
        airline: AccountId,
        name: String,
    },
    AirlineVoted {
        candidate: AccountId,
        voter: AccountId,
        votes: usize,
        required: usize,
    },
    AirlineFunded {
        airline: AccountId,
        amount: Balance,
        funded: bool,
    },
    FlightRegistered {
        flight: FlightKey,
    },
    InsurancePurchased {
        flight: FlightKey,
        passenger: AccountId,
        premium: Balance,
    },
    OracleRegistered {
        oracle: AccountId,
        indexes: Vec<OracleIndex>,
    },
    /// A status request went out to the oracles holding `index`
    OracleRequest {
        index: OracleIndex,
        flight: FlightKey,
        request_id: u64,
    },
    OracleReport {
        index: OracleIndex,
        flight: FlightKey,
        status: FlightStatus,
    },
    FlightStatusInfo {
        index: OracleIndex,
        flight: FlightKey,
        status: FlightStatus,
    },
    InsureeCredited {
        flight: FlightKey,
        passenger: AccountId,
        amount: Balance,
    },
    InsureePaid {
        flight: FlightKey,
        passenger: AccountId,
        amount: Balance,
    },
}

/// Append-only event buffer drained by the host
#[derive(Debug, Default)]
pub struct EventLog {
    pending: Vec<SuretyEvent>,
    emitted: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: SuretyEvent) {
        self.emitted += 1;
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<SuretyEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[SuretyEvent] {
        &self.pending
    }

    /// Events emitted over the contract's lifetime
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
