// Insurance core: airline governance, flight catalog, escrow and oracle consensus

pub mod airline;
pub mod events;
pub mod flight;
pub mod insurance;
pub mod oracle;
pub mod status;

pub use airline::{Airline, AirlineRegistry, AirlineState, Registration};
pub use events::{EventLog, SuretyEvent};
pub use flight::{Flight, FlightKey, FlightRegistry};
pub use insurance::{InsuranceEscrow, InsurancePolicy};
pub use oracle::{
    OpenedRequest, OracleConsensus, OracleIndex, OracleParams, OracleRegistration, RequestKey,
    RequestState, ResponseOutcome, StatusRequest,
};
pub use status::FlightStatus;

use log::{debug, info, warn};

use crate::config::SuretyConfig;
use crate::errors::{SuretyError, SuretyResult};
use crate::ledger::{AccountId, Balance, InMemoryLedger, Ledger};
use crate::utils::{Clock, SystemClock};

/// The contract surface: owns every component plus the ledger, the clock,
/// the pause switch and the event log.
///
/// All state-changing calls take the caller identity and are rejected with
/// `OperationsPaused` while the contract is paused.
pub struct FlightSurety<L: Ledger = InMemoryLedger> {
    owner: AccountId,
    operational: bool,
    config: SuretyConfig,
    ledger: L,
    clock: Box<dyn Clock>,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    escrow: InsuranceEscrow,
    oracles: OracleConsensus,
    /// Oracle registration stakes held by the contract
    oracle_stakes: Balance,
    events: EventLog,
}

impl<L: Ledger> FlightSurety<L> {
    /// Deploy the contract. `first_airline` starts registered but unfunded.
    pub fn new(
        config: SuretyConfig,
        owner: AccountId,
        first_airline: AccountId,
        first_airline_name: &str,
        ledger: L,
    ) -> SuretyResult<Self> {
        config.validate()?;

        let airlines = AirlineRegistry::new(
            first_airline,
            first_airline_name,
            config.bootstrap_airline_count,
            config.min_airline_funding,
        );
        let escrow = InsuranceEscrow::new(
            config.max_premium,
            config.payout_multiplier_num,
            config.payout_multiplier_den,
        );
        let oracles = OracleConsensus::new(
            OracleParams {
                registration_fee: config.oracle_registration_fee,
                index_space: config.oracle_index_space,
                indexes_per_oracle: config.oracle_indexes_per_oracle,
                quorum: config.oracle_quorum,
                request_timeout_secs: config.request_timeout_secs,
            },
            config.rng_seed,
        )?;

        let mut events = EventLog::new();
        events.emit(SuretyEvent::AirlineRegistered {
            airline: first_airline,
            name: first_airline_name.to_string(),
        });
        info!("FlightSurety deployed by {}", owner.short());

        Ok(Self {
            owner,
            operational: true,
            config,
            ledger,
            clock: Box::new(SystemClock),
            airlines,
            flights: FlightRegistry::new(),
            escrow,
            oracles,
            oracle_stakes: 0,
            events,
        })
    }

    /// Replace the wall clock, e.g. with a `ManualClock` in tests.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn require_operational(&self) -> SuretyResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::OperationsPaused)
        }
    }

    // --- Operations and settings ---

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn set_operating_status(&mut self, caller: &AccountId, operational: bool) -> SuretyResult<()> {
        if *caller != self.owner {
            return Err(SuretyError::Unauthorized(format!(
                "only the contract owner may change the operating status, not {}",
                caller
            )));
        }
        if self.operational != operational {
            self.operational = operational;
            info!("Operating status set to {}", operational);
            self.events.emit(SuretyEvent::OperatingStatusChanged { operational });
        }
        Ok(())
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    // --- Airlines ---

    pub fn register_airline(
        &mut self,
        caller: &AccountId,
        candidate: AccountId,
        name: &str,
    ) -> SuretyResult<Registration> {
        self.require_operational()?;
        let registration = self.airlines.register_airline(candidate, name, caller)?;
        match registration {
            Registration::Registered => {
                let name = self
                    .airlines
                    .airline(&candidate)
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| name.to_string());
                self.events.emit(SuretyEvent::AirlineRegistered {
                    airline: candidate,
                    name,
                });
            }
            Registration::Pending { votes, required } => {
                self.events.emit(SuretyEvent::AirlineVoted {
                    candidate,
                    voter: *caller,
                    votes,
                    required,
                });
            }
        }
        Ok(registration)
    }

    /// Caller pays `amount` into escrow as airline funding.
    pub fn fund(&mut self, caller: &AccountId, amount: Balance) -> SuretyResult<AirlineState> {
        self.require_operational()?;
        if !self.airlines.is_registered(caller) {
            return Err(SuretyError::UnknownAirline(*caller));
        }
        if amount == 0 {
            return Err(SuretyError::InvalidAmount("funding amount must be positive".to_string()));
        }
        if self.escrow.balance().checked_add(amount).is_none() {
            return Err(SuretyError::InvalidAmount(format!("funding of {} overflows escrow", amount)));
        }

        self.ledger.debit(caller, amount)?;
        self.escrow.deposit(amount)?;
        let state = self.airlines.fund(caller, amount)?;

        self.events.emit(SuretyEvent::AirlineFunded {
            airline: *caller,
            amount,
            funded: state == AirlineState::Funded,
        });
        Ok(state)
    }

    pub fn is_airline(&self, account: &AccountId) -> bool {
        self.airlines.is_airline(account)
    }

    pub fn is_registered_airline(&self, account: &AccountId) -> bool {
        self.airlines.is_registered(account)
    }

    pub fn is_funded_airline(&self, account: &AccountId) -> bool {
        self.airlines.is_funded(account)
    }

    pub fn airlines(&self) -> &AirlineRegistry {
        &self.airlines
    }

    // --- Flights ---

    /// Airlines register their own flights only.
    pub fn register_flight(
        &mut self,
        caller: &AccountId,
        flight_number: u32,
        scheduled_time: u64,
        airline: AccountId,
    ) -> SuretyResult<FlightKey> {
        self.require_operational()?;
        if *caller != airline {
            return Err(SuretyError::Unauthorized(format!(
                "{} cannot register flights for airline {}",
                caller, airline
            )));
        }
        let key = self
            .flights
            .register_flight(&self.airlines, flight_number, scheduled_time, airline)?;
        self.events.emit(SuretyEvent::FlightRegistered { flight: key });
        Ok(key)
    }

    pub fn is_registered_flight(&self, airline: AccountId, flight_number: u32, scheduled_time: u64) -> bool {
        self.flights
            .is_registered_flight(&FlightKey::new(airline, flight_number, scheduled_time))
    }

    pub fn get_flight_status_code(
        &self,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
    ) -> SuretyResult<FlightStatus> {
        self.flights
            .status_code(&FlightKey::new(airline, flight_number, scheduled_time))
    }

    pub fn get_flight_num_list(&self) -> &[u32] {
        self.flights.flight_num_list()
    }

    pub fn get_num_to_time(&self, flight_number: u32) -> Option<u64> {
        self.flights.num_to_time(flight_number)
    }

    pub fn flights(&self) -> &FlightRegistry {
        &self.flights
    }

    // --- Insurance ---

    pub fn buy_insurance(
        &mut self,
        caller: &AccountId,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        amount: Balance,
    ) -> SuretyResult<Balance> {
        self.require_operational()?;
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        let premium = self
            .escrow
            .buy_insurance(&mut self.ledger, &self.flights, &key, caller, amount)?;
        self.events.emit(SuretyEvent::InsurancePurchased {
            flight: key,
            passenger: *caller,
            premium,
        });
        Ok(premium)
    }

    /// Credit insurees of a flight with its finalized status.
    ///
    /// `status` must match what the oracles decided. Finalization already
    /// credits, so this is a retry path and never credits twice.
    pub fn credit_insurees(
        &mut self,
        caller: &AccountId,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        status: FlightStatus,
    ) -> SuretyResult<Vec<(AccountId, Balance)>> {
        self.require_operational()?;
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        let decided = self.flights.status_code(&key)?;
        if decided != status {
            warn!(
                "{} asked to credit {} with status {} but oracles decided {}",
                caller.short(),
                key,
                status,
                decided
            );
            return Err(SuretyError::Unauthorized(format!(
                "status {} does not match the finalized status {} of flight {}",
                status, decided, key
            )));
        }
        self.credit_flight(&key, status)
    }

    fn credit_flight(&mut self, key: &FlightKey, status: FlightStatus) -> SuretyResult<Vec<(AccountId, Balance)>> {
        let credited = self.escrow.credit_insurees(&self.flights, key, status)?;
        for (passenger, amount) in &credited {
            self.events.emit(SuretyEvent::InsureeCredited {
                flight: *key,
                passenger: *passenger,
                amount: *amount,
            });
        }
        Ok(credited)
    }

    /// Withdraw the caller's credited payout.
    pub fn insuree_payout(
        &mut self,
        caller: &AccountId,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
    ) -> SuretyResult<Balance> {
        self.require_operational()?;
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        let amount = self.escrow.insuree_payout(&mut self.ledger, &key, caller)?;
        self.events.emit(SuretyEvent::InsureePaid {
            flight: key,
            passenger: *caller,
            amount,
        });
        Ok(amount)
    }

    pub fn get_balance(&self) -> Balance {
        self.escrow.balance()
    }

    pub fn get_insurees_balance(
        &self,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        passenger: &AccountId,
    ) -> Balance {
        self.escrow
            .insurees_balance(&FlightKey::new(airline, flight_number, scheduled_time), passenger)
    }

    pub fn get_insurance_payout(
        &self,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        passenger: &AccountId,
    ) -> Balance {
        self.escrow
            .insurance_payout(&FlightKey::new(airline, flight_number, scheduled_time), passenger)
    }

    /// Payout multiplier as (numerator, denominator)
    pub fn insurance_multiplier(&self) -> (u64, u64) {
        self.escrow.multiplier()
    }

    pub fn escrow(&self) -> &InsuranceEscrow {
        &self.escrow
    }

    // --- Oracles ---

    /// Caller stakes `stake` and receives its indexes.
    pub fn register_oracle(&mut self, caller: &AccountId, stake: Balance) -> SuretyResult<Vec<OracleIndex>> {
        self.require_operational()?;
        let fee = self.oracles.params().registration_fee;
        if stake < fee {
            return Err(SuretyError::InsufficientStake {
                provided: stake,
                required: fee,
            });
        }
        if self.oracles.is_oracle(caller) {
            return Err(SuretyError::Duplicate(format!("oracle {} is already registered", caller)));
        }

        self.ledger.debit(caller, stake)?;
        let indexes = match self.oracles.register_oracle(*caller, stake) {
            Ok(indexes) => indexes,
            Err(err) => {
                self.ledger.credit(caller, stake)?;
                return Err(err);
            }
        };
        self.oracle_stakes = self.oracle_stakes.saturating_add(stake);

        self.events.emit(SuretyEvent::OracleRegistered {
            oracle: *caller,
            indexes: indexes.clone(),
        });
        Ok(indexes)
    }

    pub fn get_my_indexes(&self, caller: &AccountId) -> SuretyResult<Vec<OracleIndex>> {
        self.oracles.indexes_of(caller).map(|i| i.to_vec())
    }

    pub fn get_num_oracles(&self) -> usize {
        self.oracles.oracle_count()
    }

    /// Stakes paid by registered oracles
    pub fn oracle_stakes(&self) -> Balance {
        self.oracle_stakes
    }

    /// Ask the oracles for a flight's status; returns the index the request
    /// was addressed to.
    pub fn fetch_flight_status(
        &mut self,
        caller: &AccountId,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
    ) -> SuretyResult<OracleIndex> {
        self.require_operational()?;
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        if !self.flights.is_registered_flight(&key) {
            return Err(SuretyError::UnknownFlight(key.to_string()));
        }

        let now = self.clock.now();
        let opened = self.oracles.open_request(key, *caller, now);
        self.events.emit(SuretyEvent::OracleRequest {
            index: opened.index,
            flight: key,
            request_id: opened.request_id,
        });
        Ok(opened.index)
    }

    /// An oracle's answer to an open request.
    ///
    /// The report that completes the quorum writes the status to the flight
    /// and credits its insurees before returning.
    pub fn submit_oracle_response(
        &mut self,
        caller: &AccountId,
        index: OracleIndex,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        status: FlightStatus,
    ) -> SuretyResult<ResponseOutcome> {
        self.require_operational()?;
        let key = FlightKey::new(airline, flight_number, scheduled_time);
        let now = self.clock.now();
        let outcome = self.oracles.submit_response(index, key, status, caller, now)?;

        match outcome {
            ResponseOutcome::Recorded { .. } => {
                self.events.emit(SuretyEvent::OracleReport { index, flight: key, status });
            }
            ResponseOutcome::Finalized { status, request_id } => {
                self.events.emit(SuretyEvent::OracleReport { index, flight: key, status });
                if self.flights.resolve_status(&key, status, request_id)? {
                    self.events.emit(SuretyEvent::FlightStatusInfo { index, flight: key, status });
                }
                self.credit_flight(&key, status)?;
            }
            ResponseOutcome::Ignored { decided } => {
                debug!("Report for {} ignored, already decided as {}", key, decided);
            }
        }
        Ok(outcome)
    }

    /// Reports for `status` on the request at `index`
    pub fn get_response_info(
        &self,
        index: OracleIndex,
        airline: AccountId,
        flight_number: u32,
        scheduled_time: u64,
        status: FlightStatus,
    ) -> usize {
        self.oracles.response_count(
            index,
            &FlightKey::new(airline, flight_number, scheduled_time),
            status,
        )
    }

    /// Expire open requests past the configured timeout.
    pub fn expire_stale_requests(&mut self) -> Vec<RequestKey> {
        let now = self.clock.now();
        self.oracles.expire_stale_requests(now)
    }

    pub fn oracles(&self) -> &OracleConsensus {
        &self.oracles
    }

    // --- Ledger and events ---

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn take_events(&mut self) -> Vec<SuretyEvent> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[SuretyEvent] {
        self.events.pending()
    }
}

#[cfg(test)]
mod tests;
