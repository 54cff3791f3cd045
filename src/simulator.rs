// Multi-threaded oracle network simulation
// One worker thread per oracle; the coordinator opens status requests and
// forwards each `OracleRequest` to the workers holding the drawn index.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use crate::config::SuretyConfig;
use crate::errors::SuretyResult;
use crate::ledger::{AccountId, Balance, InMemoryLedger, Ledger, UNIT};
use crate::surety::{FlightKey, FlightStatus, FlightSurety, OracleIndex, SuretyEvent};
use crate::utils::ManualClock;

/// Simulated departure of the first flight
pub const SIMULATION_EPOCH: u64 = 1_700_000_000;

const PARTY_BALANCE: Balance = 1_000 * UNIT;

#[derive(Debug, Clone, Copy)]
pub struct SimulationParams {
    pub oracles: usize,
    pub flights: usize,
    pub seed: u64,
    /// Probability that an oracle reports the true status
    pub accuracy: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            oracles: 20,
            flights: 5,
            seed: 7,
            accuracy: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightReport {
    pub flight_number: u32,
    pub scheduled_time: u64,
    pub index: OracleIndex,
    /// Status the oracles observed in the simulated world
    pub actual: FlightStatus,
    /// Status recorded by the contract; `Unknown` if no quorum formed
    pub status: FlightStatus,
    pub oracles_asked: usize,
    pub rejected_reports: usize,
    pub passenger: AccountId,
    pub premium: Balance,
    pub payout: Balance,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub oracles: usize,
    pub flights: Vec<FlightReport>,
    pub escrow_balance: Balance,
    pub oracle_stakes: Balance,
    pub events: usize,
}

impl SimulationReport {
    pub fn decided(&self) -> usize {
        self.flights
            .iter()
            .filter(|f| f.status != FlightStatus::Unknown)
            .count()
    }

    pub fn total_paid(&self) -> Balance {
        self.flights.iter().map(|f| f.payout).sum()
    }
}

struct OracleJob {
    index: OracleIndex,
    flight: FlightKey,
    actual: FlightStatus,
}

struct WorkerAck {
    oracle: AccountId,
    rejected: Option<&'static str>,
}

type SharedSurety = Arc<Mutex<FlightSurety<InMemoryLedger>>>;

fn spawn_oracle_worker(
    oracle: AccountId,
    seed: u64,
    accuracy: f64,
    app: SharedSurety,
    jobs: Receiver<OracleJob>,
    acks: Sender<WorkerAck>,
) -> JoinHandle<()> {
    let accuracy = if accuracy.is_finite() {
        accuracy.clamp(0.0, 1.0)
    } else {
        1.0
    };
    thread::spawn(move || {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        for job in jobs.iter() {
            let status = if rng.gen_bool(accuracy) {
                job.actual
            } else {
                FlightStatus::ALL[rng.gen_range(0..FlightStatus::ALL.len())]
            };

            let result = app.lock().submit_oracle_response(
                &oracle,
                job.index,
                job.flight.airline,
                job.flight.flight_number,
                job.flight.scheduled_time,
                status,
            );
            let rejected = match result {
                Ok(outcome) => {
                    debug!("Oracle {} reported {}: {:?}", oracle.short(), status, outcome);
                    None
                }
                Err(err) => {
                    warn!("Oracle {} report rejected: {}", oracle.short(), err);
                    Some(err.kind())
                }
            };
            if acks.send(WorkerAck { oracle, rejected }).is_err() {
                break;
            }
        }
    })
}

fn oracle_account(n: usize) -> AccountId {
    AccountId::from_label(&format!("oracle-{}", n))
}

fn passenger_account(n: usize) -> AccountId {
    AccountId::from_label(&format!("passenger-{}", n))
}

/// Deploy a contract, register flights and oracles, insure one passenger per
/// flight, then let the oracle threads settle every flight.
pub fn run_simulation(config: SuretyConfig, params: SimulationParams) -> SuretyResult<SimulationReport> {
    let owner = AccountId::from_label("owner");
    let airline = AccountId::from_label("airline-1");

    let mut genesis = vec![(airline, PARTY_BALANCE)];
    genesis.extend((1..=params.flights).map(|n| (passenger_account(n), PARTY_BALANCE)));
    genesis.extend((1..=params.oracles).map(|n| (oracle_account(n), PARTY_BALANCE)));

    let clock = ManualClock::new(SIMULATION_EPOCH - 7_200);
    let premium = config.max_premium;
    let funding = config.min_airline_funding;
    let stake = config.oracle_registration_fee;

    let mut app = FlightSurety::new(
        config,
        owner,
        airline,
        "Simulated Air",
        InMemoryLedger::with_balances(genesis),
    )?
    .with_clock(clock);

    app.fund(&airline, funding)?;
    let mut keys = Vec::with_capacity(params.flights);
    for n in 0..params.flights {
        let key = app.register_flight(&airline, 100 + n as u32, SIMULATION_EPOCH + 3_600 * n as u64, airline)?;
        app.buy_insurance(
            &passenger_account(n + 1),
            airline,
            key.flight_number,
            key.scheduled_time,
            premium,
        )?;
        keys.push(key);
    }
    for n in 1..=params.oracles {
        app.register_oracle(&oracle_account(n), stake)?;
    }
    info!(
        "Simulation ready: {} flights, {} oracles",
        params.flights, params.oracles
    );

    let app: SharedSurety = Arc::new(Mutex::new(app));
    let (ack_tx, ack_rx) = mpsc::channel();
    let mut senders: HashMap<AccountId, Sender<OracleJob>> = HashMap::new();
    let mut workers = Vec::with_capacity(params.oracles);
    for n in 1..=params.oracles {
        let (job_tx, job_rx) = mpsc::channel();
        let oracle = oracle_account(n);
        senders.insert(oracle, job_tx);
        workers.push(spawn_oracle_worker(
            oracle,
            params.seed.wrapping_add(n as u64),
            params.accuracy,
            Arc::clone(&app),
            job_rx,
            ack_tx.clone(),
        ));
    }
    drop(ack_tx);

    let mut world = ChaCha20Rng::seed_from_u64(params.seed);
    let mut reports = Vec::with_capacity(keys.len());
    let mut event_count = 0;

    for (n, key) in keys.iter().enumerate() {
        let actual = FlightStatus::ALL[world.gen_range(1..FlightStatus::ALL.len())];
        let passenger = passenger_account(n + 1);

        let (index, holders) = {
            let mut app = app.lock();
            let index = app.fetch_flight_status(&passenger, key.airline, key.flight_number, key.scheduled_time)?;
            let events = app.take_events();
            event_count += events.len();
            let announced = events
                .iter()
                .any(|e| matches!(e, SuretyEvent::OracleRequest { index: i, flight, .. } if *i == index && flight == key));
            if !announced {
                warn!("No OracleRequest event for {}", key);
            }
            (index, app.oracles().oracles_for_index(index))
        };

        let mut sent = 0;
        for oracle in &holders {
            if let Some(tx) = senders.get(oracle) {
                if tx.send(OracleJob { index, flight: *key, actual }).is_ok() {
                    sent += 1;
                }
            }
        }

        let mut rejected = 0;
        for ack in ack_rx.iter().take(sent) {
            if let Some(kind) = ack.rejected {
                debug!("{} rejected for {}: {}", ack.oracle.short(), key, kind);
                rejected += 1;
            }
        }

        let mut app = app.lock();
        let status = app.get_flight_status_code(key.airline, key.flight_number, key.scheduled_time)?;
        let credited = app.get_insurance_payout(key.airline, key.flight_number, key.scheduled_time, &passenger);
        let payout = if credited > 0 {
            app.insuree_payout(&passenger, key.airline, key.flight_number, key.scheduled_time)?
        } else {
            0
        };
        event_count += app.take_events().len();

        reports.push(FlightReport {
            flight_number: key.flight_number,
            scheduled_time: key.scheduled_time,
            index,
            actual,
            status,
            oracles_asked: sent,
            rejected_reports: rejected,
            passenger,
            premium,
            payout,
        });
    }

    drop(senders);
    for worker in workers {
        if worker.join().is_err() {
            warn!("Oracle worker panicked");
        }
    }

    let app = app.lock();
    let report = SimulationReport {
        oracles: app.get_num_oracles(),
        flights: reports,
        escrow_balance: app.get_balance(),
        oracle_stakes: app.oracle_stakes(),
        events: event_count,
    };
    info!(
        "Simulation finished: {}/{} flights decided, {} paid out",
        report.decided(),
        report.flights.len(),
        crate::ledger::format_units(report.total_paid())
    );
    debug!(
        "Airline balance after simulation: {}",
        app.ledger().balance_of(&airline)
    );
    Ok(report)
}
