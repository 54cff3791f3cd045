use std::collections::HashMap;
use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{SuretyError, SuretyResult};
use crate::ledger::AccountId;
use crate::surety::airline::AirlineRegistry;
use crate::surety::status::FlightStatus;

/// Identity of a flight: (airline, flight number, scheduled departure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: AccountId,
    pub flight_number: u32,
    pub scheduled_time: u64,
}

impl FlightKey {
    pub fn new(airline: AccountId, flight_number: u32, scheduled_time: u64) -> Self {
        Self {
            airline,
            flight_number,
            scheduled_time,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.airline.short(),
            self.flight_number,
            self.scheduled_time
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub status: FlightStatus,
    /// Oracle request that last wrote `status`
    pub resolved_by: Option<u64>,
}

#[derive(Debug, Default)]
pub struct FlightRegistry {
    flights: HashMap<FlightKey, Flight>,
    /// Flight numbers in registration order
    flight_numbers: Vec<u32>,
    /// Scheduled time of the most recent registration of each flight number
    num_to_time: HashMap<u32, u64>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_flight(
        &mut self,
        airlines: &AirlineRegistry,
        flight_number: u32,
        scheduled_time: u64,
        airline: AccountId,
    ) -> SuretyResult<FlightKey> {
        if !airlines.is_funded(&airline) {
            return Err(SuretyError::Unauthorized(format!(
                "airline {} must be funded to register flights",
                airline
            )));
        }
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        if self.flights.contains_key(&key) {
            return Err(SuretyError::Duplicate(format!("flight {} is already registered", key)));
        }

        self.flights.insert(
            key,
            Flight {
                key,
                status: FlightStatus::Unknown,
                resolved_by: None,
            },
        );
        if !self.flight_numbers.contains(&flight_number) {
            self.flight_numbers.push(flight_number);
        }
        self.num_to_time.insert(flight_number, scheduled_time);

        info!("Flight {} registered", key);
        Ok(key)
    }

    /// Write the status decided by oracle request `request_id`.
    ///
    /// Returns `false` when that request already resolved this flight.
    pub fn resolve_status(
        &mut self,
        key: &FlightKey,
        status: FlightStatus,
        request_id: u64,
    ) -> SuretyResult<bool> {
        let flight = self
            .flights
            .get_mut(key)
            .ok_or_else(|| SuretyError::UnknownFlight(key.to_string()))?;

        if flight.resolved_by == Some(request_id) {
            return Ok(false);
        }
        flight.status = status;
        flight.resolved_by = Some(request_id);
        info!("Flight {} resolved to status {} by request #{}", key, status, request_id);
        Ok(true)
    }

    pub fn is_registered_flight(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn status_code(&self, key: &FlightKey) -> SuretyResult<FlightStatus> {
        self.flight(key)
            .map(|f| f.status)
            .ok_or_else(|| SuretyError::UnknownFlight(key.to_string()))
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn flight_num_list(&self) -> &[u32] {
        &self.flight_numbers
    }

    pub fn num_to_time(&self, flight_number: u32) -> Option<u64> {
        self.num_to_time.get(&flight_number).copied()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
