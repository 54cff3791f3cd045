// Proof-gated token minting
// Independent of the insurance core; shares only account identities.

pub mod erc721;
pub mod errors;
pub mod solution;
pub mod verifier;

pub use erc721::{MintableToken, TokenId};
pub use errors::{TokenError, TokenResult};
pub use solution::{solution_key, Solution, SolutionKey, SolutionMintGate};
pub use verifier::{verify_proof, Proof, Verifier, VerifyingKey};
