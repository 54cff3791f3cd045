use thiserror::Error;

use crate::config::validation::ConfigValidationError;
use crate::ledger::{AccountId, Balance};

/// Errors returned by the insurance core.
///
/// Every failing operation leaves state untouched, so callers can surface the
/// reason and retry without reconciling partial writes.
#[derive(Debug, Error)]
pub enum SuretyError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Airline {voter} already endorsed candidate {candidate}")]
    DuplicateVote {
        voter: AccountId,
        candidate: AccountId,
    },

    #[error("Oracle {oracle} already reported for request {request}")]
    DuplicateReport { oracle: AccountId, request: String },

    #[error("Unknown flight: {0}")]
    UnknownFlight(String),

    #[error("Unknown airline: {0}")]
    UnknownAirline(AccountId),

    #[error("Unknown oracle: {0}")]
    UnknownOracle(AccountId),

    #[error("No open oracle request for {0}")]
    RequestNotOpen(String),

    #[error("Premium {amount} exceeds the maximum of {max}")]
    PremiumTooHigh { amount: Balance, max: Balance },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Flight {0} already has a resolved status")]
    FlightAlreadyResolved(String),

    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Balance, available: Balance },

    #[error("Insufficient stake: provided {provided}, required {required}")]
    InsufficientStake { provided: Balance, required: Balance },

    #[error("Nothing credited for withdrawal")]
    NothingCredited,

    #[error("Contract operations are paused")]
    OperationsPaused,

    #[error("Invalid flight status code: {0}")]
    InvalidStatusCode(u8),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),
}

pub type SuretyResult<T> = Result<T, SuretyError>;

impl SuretyError {
    /// Short machine-readable name, used in events and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            SuretyError::Unauthorized(_) => "Unauthorized",
            SuretyError::Duplicate(_) => "Duplicate",
            SuretyError::DuplicateVote { .. } => "DuplicateVote",
            SuretyError::DuplicateReport { .. } => "DuplicateReport",
            SuretyError::UnknownFlight(_) => "UnknownFlight",
            SuretyError::UnknownAirline(_) => "UnknownAirline",
            SuretyError::UnknownOracle(_) => "UnknownOracle",
            SuretyError::RequestNotOpen(_) => "RequestNotOpen",
            SuretyError::PremiumTooHigh { .. } => "PremiumTooHigh",
            SuretyError::InvalidAmount(_) => "InvalidAmount",
            SuretyError::FlightAlreadyResolved(_) => "FlightAlreadyResolved",
            SuretyError::InsufficientFunds { .. } => "InsufficientFunds",
            SuretyError::InsufficientStake { .. } => "InsufficientStake",
            SuretyError::NothingCredited => "NothingCredited",
            SuretyError::OperationsPaused => "OperationsPaused",
            SuretyError::InvalidStatusCode(_) => "InvalidStatusCode",
            SuretyError::Config(_) => "Config",
        }
    }
}
