// Configuration module for FlightSurety
// Contract parameters with layered loading: defaults, TOML file, environment.

pub mod validation;

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::ledger::{Balance, UNIT};

pub use validation::{ConfigValidationError, ConfigValidator, ValidationResult};

/// Prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "FLIGHTSURETY";

/// Contract parameters.
///
/// Defaults reproduce the deployed contract: 10 units of airline funding,
/// voting from the 5th airline on, 1 unit premium cap paid back at 1.5x,
/// 1 unit oracle fee, 10 oracle indexes with 3 per oracle and a quorum of 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    /// Cumulative funding an airline needs before it may act
    pub min_airline_funding: Balance,

    /// Number of registered airlines admitted without a vote
    pub bootstrap_airline_count: usize,

    /// Premium cap per policy
    pub max_premium: Balance,

    pub payout_multiplier_num: u64,
    pub payout_multiplier_den: u64,

    /// Stake an oracle pays to register
    pub oracle_registration_fee: Balance,

    /// Size of the oracle index space (indexes are 0..space)
    pub oracle_index_space: u8,

    pub oracle_indexes_per_oracle: usize,

    /// Matching reports needed to finalize a status request
    pub oracle_quorum: usize,

    /// Seed of the index assignment stream
    pub rng_seed: u64,

    /// Seconds after which an open status request stops accepting reports.
    /// `None` keeps requests open until quorum.
    pub request_timeout_secs: Option<u64>,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            min_airline_funding: 10 * UNIT,
            bootstrap_airline_count: 4,
            max_premium: UNIT,
            payout_multiplier_num: 3,
            payout_multiplier_den: 2,
            oracle_registration_fee: UNIT,
            oracle_index_space: 10,
            oracle_indexes_per_oracle: 3,
            oracle_quorum: 3,
            rng_seed: 0x5eed_f11e,
            request_timeout_secs: None,
        }
    }
}

impl SuretyConfig {
    /// Load configuration from defaults, an optional TOML file and
    /// `FLIGHTSURETY_*` environment variables, in that order of precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigValidationError> {
        let defaults = ::config::Config::try_from(&SuretyConfig::default())
            .map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(
                ::config::File::new(&path.to_string_lossy(), ::config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))?;

        let config: SuretyConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigValidationError> {
        let config: SuretyConfig =
            toml::from_str(s).map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigValidationError> {
        toml::to_string_pretty(self).map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))
    }

    /// Run the default rule set; warnings are logged, the first error is returned.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let warnings = ConfigValidator::new().validate(self).into_result()?;
        for warning in warnings {
            warn!("{}", warning);
        }
        Ok(())
    }

    /// Payout owed for `premium` under the configured multiplier.
    pub fn payout_for(&self, premium: Balance) -> Balance {
        let payout = premium as u128 * self.payout_multiplier_num as u128
            / self.payout_multiplier_den as u128;
        payout.min(Balance::MAX as u128) as Balance
    }
}
