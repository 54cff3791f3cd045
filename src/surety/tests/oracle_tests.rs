use std::collections::HashSet;

use proptest::prelude::*;

use crate::config::ConfigValidationError;
use crate::errors::SuretyError;
use crate::ledger::UNIT;
use crate::surety::flight::FlightKey;
use crate::surety::oracle::{OracleConsensus, OracleParams, RequestState, ResponseOutcome};
use crate::surety::status::FlightStatus;

use super::{airline, init_logging, oracle, START_TIME};

fn params(index_space: u8, indexes_per_oracle: usize, timeout: Option<u64>) -> OracleParams {
    OracleParams {
        registration_fee: UNIT,
        index_space,
        indexes_per_oracle,
        quorum: 3,
        request_timeout_secs: timeout,
    }
}

fn flight() -> FlightKey {
    FlightKey::new(airline(1), 101, START_TIME + 3600)
}

/// Consensus where each of `count` oracles holds all three indexes.
fn dense_consensus(count: usize, timeout: Option<u64>) -> OracleConsensus {
    init_logging();
    let mut consensus = OracleConsensus::new(params(3, 3, timeout), 42).unwrap();
    for n in 1..=count {
        consensus.register_oracle(oracle(n), UNIT).unwrap();
    }
    consensus
}

#[test]
fn test_registration_assigns_distinct_indexes() {
    init_logging();
    let mut consensus = OracleConsensus::new(params(10, 3, None), 7).unwrap();
    for n in 1..=20 {
        let indexes = consensus.register_oracle(oracle(n), UNIT).unwrap();
        assert_eq!(indexes.len(), 3);
        let distinct: HashSet<_> = indexes.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert!(indexes.iter().all(|i| *i < 10));
        assert_eq!(consensus.indexes_of(&oracle(n)).unwrap(), indexes.as_slice());
        for index in indexes {
            assert!(consensus.oracles_for_index(index).contains(&oracle(n)));
        }
    }
    assert_eq!(consensus.oracle_count(), 20);
}

#[test]
fn test_same_seed_same_assignment() {
    let mut a = OracleConsensus::new(params(10, 3, None), 99).unwrap();
    let mut b = OracleConsensus::new(params(10, 3, None), 99).unwrap();
    for n in 1..=5 {
        assert_eq!(
            a.register_oracle(oracle(n), UNIT).unwrap(),
            b.register_oracle(oracle(n), UNIT).unwrap()
        );
    }
}

#[test]
fn test_new_rejects_unusable_params() {
    for bad in [
        params(0, 3, None),
        params(10, 0, None),
        OracleParams { quorum: 0, ..params(10, 3, None) },
    ] {
        assert!(matches!(
            OracleConsensus::new(bad, 1),
            Err(SuretyError::Config(ConfigValidationError::InvalidValue(_)))
        ));
    }

    // A single index still works: every request lands on it
    let mut consensus = OracleConsensus::new(params(1, 3, None), 1).unwrap();
    assert_eq!(consensus.register_oracle(oracle(1), UNIT).unwrap(), vec![0]);
    assert_eq!(consensus.open_request(flight(), airline(1), START_TIME).index, 0);
}

#[test]
fn test_registration_rejections() {
    let mut consensus = dense_consensus(1, None);
    assert!(matches!(
        consensus.register_oracle(oracle(2), UNIT - 1),
        Err(SuretyError::InsufficientStake { .. })
    ));
    assert!(matches!(
        consensus.register_oracle(oracle(1), UNIT),
        Err(SuretyError::Duplicate(_))
    ));
    assert!(matches!(
        consensus.indexes_of(&oracle(2)),
        Err(SuretyError::UnknownOracle(_))
    ));
    assert_eq!(consensus.oracle_count(), 1);
}

#[test]
fn test_quorum_finalizes_on_third_matching_report() {
    let mut consensus = dense_consensus(5, None);
    let opened = consensus.open_request(flight(), airline(1), START_TIME);
    assert!(opened.created);

    let index = opened.index;
    let late = FlightStatus::LateAirline;
    assert_eq!(
        consensus.submit_response(index, flight(), late, &oracle(1), START_TIME).unwrap(),
        ResponseOutcome::Recorded { status: late, count: 1 }
    );
    // A dissenting report does not count towards the majority bucket
    assert_eq!(
        consensus
            .submit_response(index, flight(), FlightStatus::OnTime, &oracle(2), START_TIME)
            .unwrap(),
        ResponseOutcome::Recorded { status: FlightStatus::OnTime, count: 1 }
    );
    assert_eq!(
        consensus.submit_response(index, flight(), late, &oracle(3), START_TIME).unwrap(),
        ResponseOutcome::Recorded { status: late, count: 2 }
    );
    assert_eq!(
        consensus.submit_response(index, flight(), late, &oracle(4), START_TIME).unwrap(),
        ResponseOutcome::Finalized { status: late, request_id: opened.request_id }
    );

    let request = consensus.request(index, &flight()).unwrap();
    assert_eq!(request.state, RequestState::Finalized(late));
    assert_eq!(consensus.response_count(index, &flight(), late), 3);
    assert_eq!(consensus.response_count(index, &flight(), FlightStatus::OnTime), 1);
}

#[test]
fn test_reports_after_finalization_are_ignored() {
    let mut consensus = dense_consensus(5, None);
    let index = consensus.open_request(flight(), airline(1), START_TIME).index;
    for n in 1..=3 {
        consensus
            .submit_response(index, flight(), FlightStatus::OnTime, &oracle(n), START_TIME)
            .unwrap();
    }

    let outcome = consensus
        .submit_response(index, flight(), FlightStatus::LateAirline, &oracle(4), START_TIME)
        .unwrap();
    assert_eq!(outcome, ResponseOutcome::Ignored { decided: FlightStatus::OnTime });

    let request = consensus.request(index, &flight()).unwrap();
    assert_eq!(request.late_reports, vec![(oracle(4), FlightStatus::LateAirline)]);
    assert_eq!(consensus.response_count(index, &flight(), FlightStatus::LateAirline), 0);
}

#[test]
fn test_repeated_late_reports_recorded_once() {
    let mut consensus = dense_consensus(5, None);
    let index = consensus.open_request(flight(), airline(1), START_TIME).index;
    for n in 1..=3 {
        consensus
            .submit_response(index, flight(), FlightStatus::OnTime, &oracle(n), START_TIME)
            .unwrap();
    }

    for _ in 0..1_000 {
        for n in [1, 4] {
            assert_eq!(
                consensus
                    .submit_response(index, flight(), FlightStatus::LateAirline, &oracle(n), START_TIME)
                    .unwrap(),
                ResponseOutcome::Ignored { decided: FlightStatus::OnTime }
            );
        }
    }

    // oracle(1) already counted towards quorum, oracle(4) is kept once
    let request = consensus.request(index, &flight()).unwrap();
    assert_eq!(request.late_reports, vec![(oracle(4), FlightStatus::LateAirline)]);
    assert_eq!(request.state, RequestState::Finalized(FlightStatus::OnTime));
}

#[test]
fn test_duplicate_report_rejected() {
    let mut consensus = dense_consensus(3, None);
    let index = consensus.open_request(flight(), airline(1), START_TIME).index;
    consensus
        .submit_response(index, flight(), FlightStatus::OnTime, &oracle(1), START_TIME)
        .unwrap();

    // A second report, even for another status, is refused
    let err = consensus
        .submit_response(index, flight(), FlightStatus::LateAirline, &oracle(1), START_TIME)
        .unwrap_err();
    assert!(matches!(err, SuretyError::DuplicateReport { .. }));
    assert_eq!(consensus.response_count(index, &flight(), FlightStatus::LateAirline), 0);
}

#[test]
fn test_report_authorization() {
    init_logging();
    let mut consensus = OracleConsensus::new(params(10, 3, None), 3).unwrap();
    let indexes = consensus.register_oracle(oracle(1), UNIT).unwrap();
    let foreign = (0..10u8).find(|i| !indexes.contains(i)).unwrap();

    let err = consensus
        .submit_response(indexes[0], flight(), FlightStatus::OnTime, &oracle(2), START_TIME)
        .unwrap_err();
    assert!(matches!(err, SuretyError::Unauthorized(_)));

    let err = consensus
        .submit_response(foreign, flight(), FlightStatus::OnTime, &oracle(1), START_TIME)
        .unwrap_err();
    assert!(matches!(err, SuretyError::Unauthorized(_)));

    // Held index but nothing was requested there
    let err = consensus
        .submit_response(indexes[0], flight(), FlightStatus::OnTime, &oracle(1), START_TIME)
        .unwrap_err();
    assert!(matches!(err, SuretyError::RequestNotOpen(_)));
}

#[test]
fn test_open_request_reuses_live_request() {
    let mut consensus = dense_consensus(3, None);
    let first = consensus.open_request(flight(), airline(1), START_TIME);

    // Keep asking until the same index is drawn again
    let again = (0..64)
        .map(|_| consensus.open_request(flight(), airline(1), START_TIME))
        .find(|o| o.index == first.index)
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.request_id, first.request_id);
}

#[test]
fn test_reopening_finalized_request_starts_new_lifecycle() {
    let mut consensus = dense_consensus(3, None);
    let first = consensus.open_request(flight(), airline(1), START_TIME);
    for n in 1..=3 {
        consensus
            .submit_response(first.index, flight(), FlightStatus::OnTime, &oracle(n), START_TIME)
            .unwrap();
    }

    let again = (0..64)
        .map(|_| consensus.open_request(flight(), airline(1), START_TIME))
        .find(|o| o.index == first.index)
        .unwrap();
    assert!(again.created);
    assert_ne!(again.request_id, first.request_id);

    let request = consensus.request(first.index, &flight()).unwrap();
    assert!(request.is_open());
    assert_eq!(request.response_count(FlightStatus::OnTime), 0);
}

#[test]
fn test_request_expires_after_timeout() {
    let mut consensus = dense_consensus(3, Some(600));
    let index = consensus.open_request(flight(), airline(1), START_TIME).index;
    consensus
        .submit_response(index, flight(), FlightStatus::OnTime, &oracle(1), START_TIME + 10)
        .unwrap();

    let err = consensus
        .submit_response(index, flight(), FlightStatus::OnTime, &oracle(2), START_TIME + 601)
        .unwrap_err();
    assert!(matches!(err, SuretyError::RequestNotOpen(_)));

    // A rejected report leaves the request untouched
    let request = consensus.request(index, &flight()).unwrap();
    assert_eq!(request.state, RequestState::Open);
    assert!(!request.has_reported(&oracle(2)));
    assert_eq!(request.response_count(FlightStatus::OnTime), 1);

    assert_eq!(consensus.expire_stale_requests(START_TIME + 601).len(), 1);
    assert_eq!(
        consensus.request(index, &flight()).unwrap().state,
        RequestState::Expired
    );
}

#[test]
fn test_expire_stale_requests() {
    let mut consensus = dense_consensus(3, Some(600));
    consensus.open_request(flight(), airline(1), START_TIME);
    assert_eq!(consensus.open_request_count(), 1);

    assert!(consensus.expire_stale_requests(START_TIME + 600).is_empty());
    let expired = consensus.expire_stale_requests(START_TIME + 601);
    assert_eq!(expired.len(), 1);
    assert_eq!(consensus.open_request_count(), 0);

    // Without a timeout nothing ever expires
    let mut untimed = dense_consensus(3, None);
    untimed.open_request(flight(), airline(1), START_TIME);
    assert!(untimed.expire_stale_requests(u64::MAX).is_empty());
}

fn any_status() -> impl Strategy<Value = FlightStatus> {
    prop::sample::select(FlightStatus::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_indexes_distinct_for_any_seed(seed in any::<u64>(), per_oracle in 1usize..=5) {
        let mut consensus = OracleConsensus::new(params(10, per_oracle, None), seed).unwrap();
        for n in 1..=8 {
            let indexes = consensus.register_oracle(oracle(n), UNIT).unwrap();
            let distinct: HashSet<_> = indexes.iter().collect();
            prop_assert_eq!(distinct.len(), per_oracle);
            prop_assert!(indexes.iter().all(|i| *i < 10));
        }
    }

    #[test]
    fn prop_single_finalization_at_quorum(reports in prop::collection::vec(any_status(), 1..12)) {
        let mut consensus = dense_consensus(reports.len(), None);
        let index = consensus.open_request(flight(), airline(1), START_TIME).index;

        let mut finalized = None;
        for (n, status) in reports.iter().enumerate() {
            let outcome = consensus
                .submit_response(index, flight(), *status, &oracle(n + 1), START_TIME)
                .unwrap();
            match outcome {
                ResponseOutcome::Finalized { status, .. } => {
                    prop_assert!(finalized.is_none());
                    prop_assert_eq!(consensus.response_count(index, &flight(), status), 3);
                    finalized = Some(status);
                }
                ResponseOutcome::Ignored { decided } => {
                    prop_assert_eq!(Some(decided), finalized);
                }
                ResponseOutcome::Recorded { count, .. } => {
                    prop_assert!(finalized.is_none());
                    prop_assert!(count < 3);
                }
            }
        }

        // Decided iff some status got three reports before the end
        let mut counts = std::collections::HashMap::new();
        let mut first_to_quorum = None;
        for status in &reports {
            let count = counts.entry(*status).or_insert(0);
            *count += 1;
            if *count == 3 && first_to_quorum.is_none() {
                first_to_quorum = Some(*status);
            }
        }
        prop_assert_eq!(finalized, first_to_quorum);
    }
}
