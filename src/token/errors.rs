use thiserror::Error;

use crate::ledger::AccountId;
use crate::token::erc721::TokenId;

/// Errors of the token contract and its proof-gated minter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token contract is paused")]
    Paused,

    #[error("Token {0} does not exist")]
    NonexistentToken(TokenId),

    #[error("Token {0} already minted")]
    TokenExists(TokenId),

    #[error("Invalid recipient {0}")]
    InvalidRecipient(AccountId),

    #[error("Expected {expected} public inputs, got {got}")]
    InputCountMismatch { expected: usize, got: usize },

    #[error("Proof does not verify")]
    InvalidProof,

    #[error("Solution {0} was already submitted")]
    DuplicateSolution(String),

    #[error("No solution stored for {0}")]
    SolutionNotFound(String),

    #[error("Solution {0} already minted a token")]
    SolutionAlreadyMinted(String),

    #[error("Trusted setup failed: {0}")]
    Setup(String),
}

pub type TokenResult<T> = Result<T, TokenError>;
