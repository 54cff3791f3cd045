use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigValidationError;
use crate::errors::{SuretyError, SuretyResult};
use crate::ledger::{format_units, AccountId, Balance};
use crate::surety::flight::FlightKey;
use crate::surety::status::FlightStatus;
use crate::utils::time_since;

/// Oracle shard index
pub type OracleIndex = u8;

/// Parameters of the oracle protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleParams {
    pub registration_fee: Balance,
    pub index_space: u8,
    pub indexes_per_oracle: usize,
    pub quorum: usize,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRegistration {
    pub account: AccountId,
    pub indexes: Vec<OracleIndex>,
    pub stake: Balance,
}

impl OracleRegistration {
    pub fn holds(&self, index: OracleIndex) -> bool {
        self.indexes.contains(&index)
    }
}

/// A status request is addressed to the oracles holding `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub index: OracleIndex,
    pub flight: FlightKey,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index, self.flight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Open,
    Finalized(FlightStatus),
    /// Timed out before reaching quorum
    Expired,
}

#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub id: u64,
    pub key: RequestKey,
    pub requester: AccountId,
    pub opened_at: u64,
    pub state: RequestState,
    /// status -> oracles that reported it
    pub responses: BTreeMap<FlightStatus, BTreeSet<AccountId>>,
    reporters: HashSet<AccountId>,
    /// Reports received after finalization, kept for bookkeeping only
    pub late_reports: Vec<(AccountId, FlightStatus)>,
}

impl StatusRequest {
    fn new(id: u64, key: RequestKey, requester: AccountId, opened_at: u64) -> Self {
        Self {
            id,
            key,
            requester,
            opened_at,
            state: RequestState::Open,
            responses: BTreeMap::new(),
            reporters: HashSet::new(),
            late_reports: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == RequestState::Open
    }

    pub fn has_reported(&self, oracle: &AccountId) -> bool {
        self.reporters.contains(oracle)
    }

    pub fn response_count(&self, status: FlightStatus) -> usize {
        self.responses.get(&status).map(|s| s.len()).unwrap_or(0)
    }
}

/// What a submitted report did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseOutcome {
    /// Added to its bucket; quorum not reached yet
    Recorded { status: FlightStatus, count: usize },
    /// This report completed the quorum
    Finalized { status: FlightStatus, request_id: u64 },
    /// The request had already been decided
    Ignored { decided: FlightStatus },
}

/// Newly opened (or still open) request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedRequest {
    pub index: OracleIndex,
    pub request_id: u64,
    /// `false` when an open request for the same key already existed
    pub created: bool,
}

/// Oracle registry and per-request quorum aggregation.
pub struct OracleConsensus {
    params: OracleParams,
    oracles: HashMap<AccountId, OracleRegistration>,
    /// index -> oracles holding it
    shards: Vec<HashSet<AccountId>>,
    requests: HashMap<RequestKey, StatusRequest>,
    rng: ChaCha20Rng,
    next_request_id: u64,
}

impl fmt::Debug for OracleConsensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConsensus")
            .field("params", &self.params)
            .field("oracles", &self.oracles.len())
            .field("requests", &self.requests.len())
            .finish()
    }
}

impl OracleConsensus {
    /// Build an empty registry. Rejects parameters that leave no index to draw
    /// or no report able to finalize a request.
    pub fn new(params: OracleParams, seed: u64) -> SuretyResult<Self> {
        if params.index_space == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "oracle index space must be at least 1".to_string(),
            )
            .into());
        }
        if params.indexes_per_oracle == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "each oracle needs at least one index".to_string(),
            )
            .into());
        }
        if params.quorum == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "oracle quorum must be at least 1".to_string(),
            )
            .into());
        }

        Ok(Self {
            shards: vec![HashSet::new(); params.index_space as usize],
            params,
            oracles: HashMap::new(),
            requests: HashMap::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            next_request_id: 1,
        })
    }

    pub fn params(&self) -> &OracleParams {
        &self.params
    }

    fn draw_index(&mut self) -> OracleIndex {
        self.rng.gen_range(0..self.params.index_space)
    }

    /// Register an oracle and assign its distinct indexes.
    pub fn register_oracle(&mut self, account: AccountId, stake: Balance) -> SuretyResult<Vec<OracleIndex>> {
        if stake < self.params.registration_fee {
            return Err(SuretyError::InsufficientStake {
                provided: stake,
                required: self.params.registration_fee,
            });
        }
        if self.oracles.contains_key(&account) {
            return Err(SuretyError::Duplicate(format!("oracle {} is already registered", account)));
        }

        let wanted = self.params.indexes_per_oracle.min(self.params.index_space as usize);
        let mut indexes: Vec<OracleIndex> = Vec::with_capacity(wanted);
        while indexes.len() < wanted {
            let index = self.draw_index();
            if !indexes.contains(&index) {
                indexes.push(index);
            }
        }

        for index in &indexes {
            self.shards[*index as usize].insert(account);
        }
        info!(
            "Oracle {} registered with stake {} at indexes {:?}",
            account.short(),
            format_units(stake),
            indexes
        );
        self.oracles.insert(
            account,
            OracleRegistration {
                account,
                indexes: indexes.clone(),
                stake,
            },
        );
        Ok(indexes)
    }

    /// Open a status request for a flight at a freshly drawn index.
    ///
    /// An open request already sitting at that index is reused; a finalized
    /// or expired one is replaced by a new lifecycle.
    pub fn open_request(&mut self, flight: FlightKey, requester: AccountId, now: u64) -> OpenedRequest {
        let index = self.draw_index();
        let key = RequestKey { index, flight };

        if let Some(existing) = self.requests.get(&key) {
            if existing.is_open() && !self.is_expired(existing, now) {
                debug!("Request {} already open as #{}", key, existing.id);
                return OpenedRequest {
                    index,
                    request_id: existing.id,
                    created: false,
                };
            }
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.requests.insert(key, StatusRequest::new(id, key, requester, now));
        info!("Opened oracle request #{} for {}", id, key);
        OpenedRequest {
            index,
            request_id: id,
            created: true,
        }
    }

    fn is_expired(&self, request: &StatusRequest, now: u64) -> bool {
        match self.params.request_timeout_secs {
            Some(timeout) => time_since(request.opened_at, now) > timeout,
            None => false,
        }
    }

    /// Record an oracle's report and finalize on quorum.
    pub fn submit_response(
        &mut self,
        index: OracleIndex,
        flight: FlightKey,
        status: FlightStatus,
        reporter: &AccountId,
        now: u64,
    ) -> SuretyResult<ResponseOutcome> {
        let registration = self
            .oracles
            .get(reporter)
            .ok_or_else(|| SuretyError::Unauthorized(format!("{} is not a registered oracle", reporter)))?;
        if !registration.holds(index) {
            return Err(SuretyError::Unauthorized(format!(
                "oracle {} does not hold index {}",
                reporter, index
            )));
        }

        let key = RequestKey { index, flight };
        let quorum = self.params.quorum;
        let expired = match self.requests.get(&key) {
            Some(request) => request.is_open() && self.is_expired(request, now),
            None => return Err(SuretyError::RequestNotOpen(key.to_string())),
        };
        // Left Open here; expire_stale_requests or the next open_request retires it
        if expired {
            warn!("Report from {} for {} arrived after the request timeout", reporter.short(), key);
            return Err(SuretyError::RequestNotOpen(key.to_string()));
        }
        let request = self
            .requests
            .get_mut(&key)
            .ok_or_else(|| SuretyError::RequestNotOpen(key.to_string()))?;

        match request.state {
            RequestState::Expired => return Err(SuretyError::RequestNotOpen(key.to_string())),
            RequestState::Finalized(decided) => {
                // One late entry per oracle
                if request.reporters.insert(*reporter) {
                    debug!(
                        "Late report {} from {} on finalized request #{}",
                        status,
                        reporter.short(),
                        request.id
                    );
                    request.late_reports.push((*reporter, status));
                }
                return Ok(ResponseOutcome::Ignored { decided });
            }
            RequestState::Open => {}
        }

        if request.has_reported(reporter) {
            return Err(SuretyError::DuplicateReport {
                oracle: *reporter,
                request: key.to_string(),
            });
        }

        request.reporters.insert(*reporter);
        let bucket = request.responses.entry(status).or_default();
        bucket.insert(*reporter);
        let count = bucket.len();
        debug!(
            "Oracle {} reported {} for {} ({}/{})",
            reporter.short(),
            status,
            key,
            count,
            quorum
        );

        if count >= quorum {
            request.state = RequestState::Finalized(status);
            info!("Request #{} for {} finalized with status {}", request.id, key, status);
            return Ok(ResponseOutcome::Finalized {
                status,
                request_id: request.id,
            });
        }
        Ok(ResponseOutcome::Recorded { status, count })
    }

    /// Mark every open request older than the timeout as expired.
    ///
    /// No-op when no timeout is configured.
    pub fn expire_stale_requests(&mut self, now: u64) -> Vec<RequestKey> {
        let Some(timeout) = self.params.request_timeout_secs else {
            return Vec::new();
        };
        let mut expired = Vec::new();
        for (key, request) in self.requests.iter_mut() {
            if request.is_open() && time_since(request.opened_at, now) > timeout {
                request.state = RequestState::Expired;
                expired.push(*key);
            }
        }
        if !expired.is_empty() {
            warn!("Expired {} oracle requests without quorum", expired.len());
        }
        expired
    }

    pub fn request(&self, index: OracleIndex, flight: &FlightKey) -> Option<&StatusRequest> {
        self.requests.get(&RequestKey { index, flight: *flight })
    }

    /// Reports received for one status of one request
    pub fn response_count(&self, index: OracleIndex, flight: &FlightKey, status: FlightStatus) -> usize {
        self.request(index, flight)
            .map(|r| r.response_count(status))
            .unwrap_or(0)
    }

    pub fn indexes_of(&self, oracle: &AccountId) -> SuretyResult<&[OracleIndex]> {
        self.oracles
            .get(oracle)
            .map(|r| r.indexes.as_slice())
            .ok_or(SuretyError::UnknownOracle(*oracle))
    }

    /// Oracles a request at `index` fans out to
    pub fn oracles_for_index(&self, index: OracleIndex) -> Vec<AccountId> {
        let mut oracles: Vec<AccountId> = self
            .shards
            .get(index as usize)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        oracles.sort();
        oracles
    }

    pub fn is_oracle(&self, account: &AccountId) -> bool {
        self.oracles.contains_key(account)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn open_request_count(&self) -> usize {
        self.requests.values().filter(|r| r.is_open()).count()
    }
}
