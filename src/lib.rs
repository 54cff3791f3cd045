pub mod config;
pub mod errors;
pub mod ledger;
pub mod simulator;
pub mod surety;
pub mod token;
pub mod utils;

// Re-export commonly used items
pub use config::{ConfigValidationError, SuretyConfig};
pub use errors::{SuretyError, SuretyResult};
pub use ledger::{AccountId, Balance, InMemoryLedger, Ledger, UNIT};
pub use surety::{FlightKey, FlightStatus, FlightSurety, ResponseOutcome, SuretyEvent};
pub use token::{MintableToken, SolutionMintGate, TokenError};
