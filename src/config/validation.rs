use std::collections::BTreeMap;

use log::{debug, error};
use thiserror::Error;

use crate::config::SuretyConfig;

/// Error type for configuration validation issues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Incompatible settings: {0}")]
    IncompatibleSettings(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Everything the rule set found, errors first
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    /// Accepted, but probably not what an operator wants
    pub warnings: Vec<String>,
    /// setting -> suggested value
    pub suggested_fixes: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, or the warnings when every rule passed
    pub fn into_result(mut self) -> Result<Vec<String>, ConfigValidationError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.errors.remove(0))
        }
    }

    /// One line per finding, for `show-config`
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => lines.push("Configuration OK".to_string()),
            (0, n) => lines.push(format!("Configuration OK with {} warning(s)", n)),
            (e, n) => lines.push(format!("Configuration rejected: {} error(s), {} warning(s)", e, n)),
        }
        lines.extend(self.errors.iter().map(|e| format!("  error: {}", e)));
        lines.extend(self.warnings.iter().map(|w| format!("  warning: {}", w)));
        lines.extend(
            self.suggested_fixes
                .iter()
                .map(|(setting, fix)| format!("  fix {}: {}", setting, fix)),
        );
        lines.join("\n")
    }
}

/// Configuration validation rule
pub trait ValidationRule {
    fn name(&self) -> &str;

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError>;

    /// Suggest a fix for validation failures
    fn suggest_fix(&self, config: &SuretyConfig) -> Option<(String, String)>;
}

/// Applies the rule set to a `SuretyConfig`
pub struct ConfigValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Create a new configuration validator with default rules
    pub fn new() -> Self {
        let mut validator = Self { rules: Vec::new() };

        validator.add_rule(Box::new(PayoutMultiplierRule));
        validator.add_rule(Box::new(OracleIndexSpaceRule));
        validator.add_rule(Box::new(QuorumRule));
        validator.add_rule(Box::new(BootstrapRule));
        validator.add_rule(Box::new(NonZeroAmountsRule));

        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn validate(&self, config: &SuretyConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        for rule in &self.rules {
            match rule.validate(config) {
                Ok(()) => {
                    debug!("Validation rule '{}' passed", rule.name());
                }
                Err(err) => {
                    error!("Validation rule '{}' failed: {}", rule.name(), err);
                    result.errors.push(err);
                    if let Some((setting, suggestion)) = rule.suggest_fix(config) {
                        result.suggested_fixes.insert(setting, suggestion);
                    }
                }
            }
        }

        if config.oracle_quorum == 1 {
            result.warnings.push(
                "A quorum of 1 lets a single oracle decide a flight status.".to_string(),
            );
        }

        if config.payout_multiplier_den > 0
            && config.payout_multiplier_num < config.payout_multiplier_den
        {
            result.warnings.push(
                "Payout multiplier is below 1x; insured passengers get back less than their premium."
                    .to_string(),
            );
        }

        if config.request_timeout_secs.is_none() {
            result.warnings.push(
                "No oracle request timeout configured; requests without quorum stay open forever."
                    .to_string(),
            );
        }

        result
    }
}

/// Denominator must be non-zero, numerator must be non-zero
struct PayoutMultiplierRule;

impl ValidationRule for PayoutMultiplierRule {
    fn name(&self) -> &str {
        "PayoutMultiplier"
    }

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError> {
        if config.payout_multiplier_den == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "payout_multiplier_den must be greater than zero".to_string(),
            ));
        }
        if config.payout_multiplier_num == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "payout_multiplier_num must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &SuretyConfig) -> Option<(String, String)> {
        Some((
            "payout_multiplier".to_string(),
            "Use 3/2 for the standard 1.5x payout".to_string(),
        ))
    }
}

/// Each oracle needs that many distinct indexes in the index space
struct OracleIndexSpaceRule;

impl ValidationRule for OracleIndexSpaceRule {
    fn name(&self) -> &str {
        "OracleIndexSpace"
    }

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError> {
        if config.oracle_indexes_per_oracle == 0 {
            return Err(ConfigValidationError::ValueOutOfRange(
                "oracle_indexes_per_oracle must be at least 1".to_string(),
            ));
        }
        if (config.oracle_index_space as usize) < config.oracle_indexes_per_oracle {
            return Err(ConfigValidationError::IncompatibleSettings(format!(
                "oracle_index_space ({}) is smaller than oracle_indexes_per_oracle ({})",
                config.oracle_index_space, config.oracle_indexes_per_oracle
            )));
        }
        Ok(())
    }

    fn suggest_fix(&self, config: &SuretyConfig) -> Option<(String, String)> {
        Some((
            "oracle_index_space".to_string(),
            format!("Use at least {} indexes", config.oracle_indexes_per_oracle.max(1)),
        ))
    }
}

struct QuorumRule;

impl ValidationRule for QuorumRule {
    fn name(&self) -> &str {
        "OracleQuorum"
    }

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError> {
        if config.oracle_quorum == 0 {
            return Err(ConfigValidationError::ValueOutOfRange(
                "oracle_quorum must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &SuretyConfig) -> Option<(String, String)> {
        Some(("oracle_quorum".to_string(), "Use 3 matching reports".to_string()))
    }
}

struct BootstrapRule;

impl ValidationRule for BootstrapRule {
    fn name(&self) -> &str {
        "AirlineBootstrap"
    }

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError> {
        if config.bootstrap_airline_count == 0 {
            return Err(ConfigValidationError::ValueOutOfRange(
                "bootstrap_airline_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &SuretyConfig) -> Option<(String, String)> {
        Some((
            "bootstrap_airline_count".to_string(),
            "Admit the first 4 airlines without a vote".to_string(),
        ))
    }
}

/// Fees, funding minimum and premium cap cannot be zero
struct NonZeroAmountsRule;

impl ValidationRule for NonZeroAmountsRule {
    fn name(&self) -> &str {
        "NonZeroAmounts"
    }

    fn validate(&self, config: &SuretyConfig) -> Result<(), ConfigValidationError> {
        let amounts = [
            ("min_airline_funding", config.min_airline_funding),
            ("max_premium", config.max_premium),
            ("oracle_registration_fee", config.oracle_registration_fee),
        ];
        for (name, value) in amounts {
            if value == 0 {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    fn suggest_fix(&self, _config: &SuretyConfig) -> Option<(String, String)> {
        None
    }
}
