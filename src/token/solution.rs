use std::collections::HashMap;

use blstrs::Scalar;
use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::ledger::AccountId;
use crate::token::erc721::{MintableToken, TokenId};
use crate::token::errors::{TokenError, TokenResult};
use crate::token::verifier::{Proof, Verifier};

/// Identity of a solution: SHA-256 over its public inputs
pub type SolutionKey = [u8; 32];

pub fn solution_key(inputs: &[Scalar]) -> SolutionKey {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input.to_bytes_le());
    }
    hasher.finalize().into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Token id this solution mints
    pub index: TokenId,
    pub submitter: AccountId,
    pub minted: bool,
}

/// Token minter that only mints against verified, unused solutions.
#[derive(Debug)]
pub struct SolutionMintGate {
    verifier: Verifier,
    token: MintableToken,
    solutions: HashMap<SolutionKey, Solution>,
    next_index: TokenId,
}

impl SolutionMintGate {
    pub fn new(verifier: Verifier, token: MintableToken) -> Self {
        Self {
            verifier,
            token,
            solutions: HashMap::new(),
            next_index: 1,
        }
    }

    pub fn token(&self) -> &MintableToken {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut MintableToken {
        &mut self.token
    }

    pub fn verify_proof(&self, proof: &Proof, inputs: &[Scalar]) -> bool {
        self.verifier.verify(proof, inputs)
    }

    /// Next sequence id not already taken by a direct mint.
    fn take_free_id(&mut self) -> TokenId {
        while self.token.owner_of(self.next_index).is_ok() {
            self.next_index += 1;
        }
        let id = self.next_index;
        self.next_index += 1;
        id
    }

    /// Owner-only direct mint, bypassing solutions.
    pub fn mint(&mut self, caller: &AccountId, to: AccountId, token_id: TokenId) -> TokenResult<()> {
        self.token.mint(caller, to, token_id)
    }

    /// Verify and store a solution; returns its key.
    pub fn add_solution(
        &mut self,
        caller: &AccountId,
        proof: &Proof,
        inputs: &[Scalar],
    ) -> TokenResult<SolutionKey> {
        let key = solution_key(inputs);
        if self.solutions.contains_key(&key) {
            return Err(TokenError::DuplicateSolution(hex::encode(key)));
        }
        if let Err(err) = self.verifier.check(proof, inputs) {
            warn!("Solution from {} rejected: {}", caller.short(), err);
            return Err(err);
        }

        let index = self.take_free_id();
        self.solutions.insert(
            key,
            Solution {
                index,
                submitter: *caller,
                minted: false,
            },
        );
        info!("Solution #{} added by {}", index, caller.short());
        Ok(key)
    }

    /// Mint the token for a stored solution to `to`. Each solution mints once.
    pub fn mint_new_nft(&mut self, caller: &AccountId, inputs: &[Scalar], to: AccountId) -> TokenResult<TokenId> {
        let key = solution_key(inputs);
        let solution = self
            .solutions
            .get(&key)
            .ok_or_else(|| TokenError::SolutionNotFound(hex::encode(key)))?;
        if solution.minted {
            return Err(TokenError::SolutionAlreadyMinted(hex::encode(key)));
        }
        if solution.submitter != *caller {
            return Err(TokenError::Unauthorized(format!(
                "{} did not submit this solution",
                caller
            )));
        }

        // The owner may have minted this id directly since the solution was stored
        let mut index = solution.index;
        if self.token.owner_of(index).is_ok() {
            let taken = index;
            index = self.take_free_id();
            warn!("Token {} was minted directly, solution moves to token {}", taken, index);
        }
        let minter = *self.token.owner();
        self.token.mint(&minter, to, index)?;
        if let Some(solution) = self.solutions.get_mut(&key) {
            solution.index = index;
            solution.minted = true;
        }
        Ok(index)
    }

    pub fn solution(&self, inputs: &[Scalar]) -> Option<&Solution> {
        self.solutions.get(&solution_key(inputs))
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.len()
    }
}
