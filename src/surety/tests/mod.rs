pub mod oracle_tests;

use crate::config::SuretyConfig;
use crate::ledger::{AccountId, Balance, InMemoryLedger, UNIT};
use crate::surety::FlightSurety;
use crate::utils::ManualClock;

pub const START_TIME: u64 = 1_700_000_000;
pub const STARTING_BALANCE: Balance = 100 * UNIT;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn account(label: &str) -> AccountId {
    AccountId::from_label(label)
}

pub fn airline(n: usize) -> AccountId {
    account(&format!("airline-{}", n))
}

pub fn passenger(n: usize) -> AccountId {
    account(&format!("passenger-{}", n))
}

pub fn oracle(n: usize) -> AccountId {
    account(&format!("oracle-{}", n))
}

/// Every oracle holds every index, so any request reaches all of them.
pub fn dense_oracle_config() -> SuretyConfig {
    SuretyConfig {
        oracle_index_space: 3,
        oracle_indexes_per_oracle: 3,
        request_timeout_secs: Some(600),
        ..SuretyConfig::default()
    }
}

pub fn funded_ledger() -> InMemoryLedger {
    let mut allocations = Vec::new();
    for n in 1..=8 {
        allocations.push((airline(n), STARTING_BALANCE));
    }
    for n in 1..=8 {
        allocations.push((passenger(n), STARTING_BALANCE));
    }
    for n in 1..=10 {
        allocations.push((oracle(n), STARTING_BALANCE));
    }
    InMemoryLedger::with_balances(allocations)
}

/// Deployed contract with `airline(1)` registered but unfunded.
pub fn deploy(config: SuretyConfig) -> (FlightSurety, ManualClock) {
    init_logging();
    let clock = ManualClock::new(START_TIME);
    let app = FlightSurety::new(
        config,
        account("owner"),
        airline(1),
        "First Air",
        funded_ledger(),
    )
    .unwrap()
    .with_clock(clock.clone());
    (app, clock)
}

/// `airline(1)` funded, one flight registered, `count` oracles registered.
pub fn deploy_with_flight(oracles: usize) -> (FlightSurety, ManualClock) {
    let (mut app, clock) = deploy(dense_oracle_config());
    app.fund(&airline(1), 10 * UNIT).unwrap();
    app.register_flight(&airline(1), 101, START_TIME + 3600, airline(1)).unwrap();
    for n in 1..=oracles {
        app.register_oracle(&oracle(n), UNIT).unwrap();
    }
    (app, clock)
}
