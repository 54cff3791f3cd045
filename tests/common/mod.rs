#![allow(dead_code)]

use flightsurety_core::config::SuretyConfig;
use flightsurety_core::ledger::{AccountId, Balance, InMemoryLedger, UNIT};
use flightsurety_core::surety::FlightSurety;
use flightsurety_core::utils::ManualClock;

pub const START_TIME: u64 = 1_700_000_000;
pub const STARTING_BALANCE: Balance = 50 * UNIT;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn account(label: &str) -> AccountId {
    AccountId::from_label(label)
}

pub fn owner() -> AccountId {
    account("owner")
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

pub fn genesis() -> InMemoryLedger {
    let parties = (1..=8)
        .map(airline)
        .chain((1..=8).map(passenger))
        .chain((1..=12).map(oracle));
    InMemoryLedger::with_balances(parties.map(|a| (a, STARTING_BALANCE)))
}

/// Contract deployed with `airline(1)` as the first airline and a manual clock.
pub fn deploy(config: SuretyConfig) -> (FlightSurety, ManualClock) {
    init_logging();
    let clock = ManualClock::new(START_TIME);
    let app = FlightSurety::new(config, owner(), airline(1), "First Air", genesis())
        .expect("valid configuration")
        .with_clock(clock.clone());
    (app, clock)
}
