use std::collections::{HashMap, HashSet};

use log::info;

use crate::ledger::AccountId;
use crate::token::errors::{TokenError, TokenResult};

pub type TokenId = u64;

/// Enumerable, owner-mintable non-fungible token with approvals and a pause
/// switch.
#[derive(Debug)]
pub struct MintableToken {
    name: String,
    symbol: String,
    base_uri: String,
    owner: AccountId,
    paused: bool,
    token_owners: HashMap<TokenId, AccountId>,
    /// Tokens held by each account, in acquisition order
    owned_tokens: HashMap<AccountId, Vec<TokenId>>,
    all_tokens: Vec<TokenId>,
    token_approvals: HashMap<TokenId, AccountId>,
    operator_approvals: HashMap<AccountId, HashSet<AccountId>>,
}

impl MintableToken {
    pub fn new(name: &str, symbol: &str, base_uri: &str, owner: AccountId) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            base_uri: base_uri.to_string(),
            owner,
            paused: false,
            token_owners: HashMap::new(),
            owned_tokens: HashMap::new(),
            all_tokens: Vec::new(),
            token_approvals: HashMap::new(),
            operator_approvals: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    fn require_owner(&self, caller: &AccountId) -> TokenResult<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(TokenError::Unauthorized(format!("{} is not the contract owner", caller)))
        }
    }

    fn require_unpaused(&self) -> TokenResult<()> {
        if self.paused {
            Err(TokenError::Paused)
        } else {
            Ok(())
        }
    }

    pub fn transfer_ownership(&mut self, caller: &AccountId, new_owner: AccountId) -> TokenResult<()> {
        self.require_owner(caller)?;
        if new_owner == AccountId::default() {
            return Err(TokenError::InvalidRecipient(new_owner));
        }
        info!("Token contract ownership moved to {}", new_owner.short());
        self.owner = new_owner;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, caller: &AccountId, paused: bool) -> TokenResult<()> {
        self.require_owner(caller)?;
        self.paused = paused;
        Ok(())
    }

    pub fn mint(&mut self, caller: &AccountId, to: AccountId, token_id: TokenId) -> TokenResult<()> {
        self.require_unpaused()?;
        self.require_owner(caller)?;
        if to == AccountId::default() {
            return Err(TokenError::InvalidRecipient(to));
        }
        if self.token_owners.contains_key(&token_id) {
            return Err(TokenError::TokenExists(token_id));
        }

        self.token_owners.insert(token_id, to);
        self.owned_tokens.entry(to).or_default().push(token_id);
        self.all_tokens.push(token_id);
        info!("Minted token {} to {}", token_id, to.short());
        Ok(())
    }

    pub fn balance_of(&self, account: &AccountId) -> usize {
        self.owned_tokens.get(account).map(|t| t.len()).unwrap_or(0)
    }

    pub fn owner_of(&self, token_id: TokenId) -> TokenResult<AccountId> {
        self.token_owners
            .get(&token_id)
            .copied()
            .ok_or(TokenError::NonexistentToken(token_id))
    }

    pub fn total_supply(&self) -> usize {
        self.all_tokens.len()
    }

    pub fn token_by_index(&self, index: usize) -> Option<TokenId> {
        self.all_tokens.get(index).copied()
    }

    pub fn token_of_owner_by_index(&self, owner: &AccountId, index: usize) -> Option<TokenId> {
        self.owned_tokens.get(owner).and_then(|t| t.get(index)).copied()
    }

    pub fn token_uri(&self, token_id: TokenId) -> TokenResult<String> {
        self.owner_of(token_id)?;
        Ok(format!("{}{}", self.base_uri, token_id))
    }

    pub fn approve(&mut self, caller: &AccountId, to: AccountId, token_id: TokenId) -> TokenResult<()> {
        let holder = self.owner_of(token_id)?;
        if to == holder {
            return Err(TokenError::InvalidRecipient(to));
        }
        if *caller != holder && !self.is_approved_for_all(&holder, caller) {
            return Err(TokenError::Unauthorized(format!(
                "{} may not approve transfers of token {}",
                caller, token_id
            )));
        }
        self.token_approvals.insert(token_id, to);
        Ok(())
    }

    pub fn get_approved(&self, token_id: TokenId) -> TokenResult<Option<AccountId>> {
        self.owner_of(token_id)?;
        Ok(self.token_approvals.get(&token_id).copied())
    }

    pub fn set_approval_for_all(
        &mut self,
        caller: &AccountId,
        operator: AccountId,
        approved: bool,
    ) -> TokenResult<()> {
        if operator == *caller {
            return Err(TokenError::InvalidRecipient(operator));
        }
        let operators = self.operator_approvals.entry(*caller).or_default();
        if approved {
            operators.insert(operator);
        } else {
            operators.remove(&operator);
        }
        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: &AccountId, operator: &AccountId) -> bool {
        self.operator_approvals
            .get(owner)
            .map(|ops| ops.contains(operator))
            .unwrap_or(false)
    }

    fn is_approved_or_owner(&self, spender: &AccountId, token_id: TokenId) -> TokenResult<bool> {
        let holder = self.owner_of(token_id)?;
        Ok(*spender == holder
            || self.token_approvals.get(&token_id) == Some(spender)
            || self.is_approved_for_all(&holder, spender))
    }

    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: AccountId,
        token_id: TokenId,
    ) -> TokenResult<()> {
        self.require_unpaused()?;
        if !self.is_approved_or_owner(caller, token_id)? {
            return Err(TokenError::Unauthorized(format!(
                "{} may not transfer token {}",
                caller, token_id
            )));
        }
        if self.owner_of(token_id)? != *from {
            return Err(TokenError::Unauthorized(format!("{} does not own token {}", from, token_id)));
        }
        if to == AccountId::default() {
            return Err(TokenError::InvalidRecipient(to));
        }

        self.token_approvals.remove(&token_id);
        if let Some(tokens) = self.owned_tokens.get_mut(from) {
            if let Some(pos) = tokens.iter().position(|t| *t == token_id) {
                tokens.swap_remove(pos);
            }
        }
        self.owned_tokens.entry(to).or_default().push(token_id);
        self.token_owners.insert(token_id, to);
        info!("Token {} moved from {} to {}", token_id, from.short(), to.short());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    fn token() -> MintableToken {
        MintableToken::new("Real Estate", "RE", "https://tokens.example/api/token/", account("owner"))
    }

    #[test]
    fn test_owner_mints_and_enumerates() {
        let mut token = token();
        let owner = account("owner");
        token.mint(&owner, account("alice"), 1).unwrap();
        token.mint(&owner, account("alice"), 2).unwrap();
        token.mint(&owner, account("bob"), 3).unwrap();

        assert_eq!(token.total_supply(), 3);
        assert_eq!(token.balance_of(&account("alice")), 2);
        assert_eq!(token.owner_of(3).unwrap(), account("bob"));
        assert_eq!(token.token_by_index(2), Some(3));
        assert_eq!(token.token_of_owner_by_index(&account("alice"), 1), Some(2));
        assert_eq!(token.token_uri(1).unwrap(), "https://tokens.example/api/token/1");
        assert_eq!(token.token_uri(9), Err(TokenError::NonexistentToken(9)));
    }

    #[test]
    fn test_mint_restrictions() {
        let mut token = token();
        let owner = account("owner");
        assert!(matches!(
            token.mint(&account("alice"), account("alice"), 1),
            Err(TokenError::Unauthorized(_))
        ));
        assert_eq!(
            token.mint(&owner, AccountId::default(), 1),
            Err(TokenError::InvalidRecipient(AccountId::default()))
        );
        token.mint(&owner, account("alice"), 1).unwrap();
        assert_eq!(token.mint(&owner, account("bob"), 1), Err(TokenError::TokenExists(1)));

        token.set_paused(&owner, true).unwrap();
        assert_eq!(token.mint(&owner, account("bob"), 2), Err(TokenError::Paused));
        assert!(token.set_paused(&account("alice"), false).is_err());
    }

    #[test]
    fn test_ownership_transfer() {
        let mut token = token();
        assert!(token
            .transfer_ownership(&account("alice"), account("alice"))
            .is_err());
        token
            .transfer_ownership(&account("owner"), account("carol"))
            .unwrap();
        assert_eq!(token.owner(), &account("carol"));
        assert!(token.mint(&account("owner"), account("bob"), 1).is_err());
        token.mint(&account("carol"), account("bob"), 1).unwrap();
    }

    #[test]
    fn test_transfer_with_approval() {
        let mut token = token();
        let (alice, bob, carol) = (account("alice"), account("bob"), account("carol"));
        token.mint(&account("owner"), alice, 1).unwrap();

        assert!(matches!(
            token.transfer_from(&bob, &alice, bob, 1),
            Err(TokenError::Unauthorized(_))
        ));

        token.approve(&alice, bob, 1).unwrap();
        assert_eq!(token.get_approved(1).unwrap(), Some(bob));
        token.transfer_from(&bob, &alice, carol, 1).unwrap();

        assert_eq!(token.owner_of(1).unwrap(), carol);
        assert_eq!(token.get_approved(1).unwrap(), None);
        assert_eq!(token.balance_of(&alice), 0);
        assert_eq!(token.token_of_owner_by_index(&carol, 0), Some(1));
    }

    #[test]
    fn test_operator_approval() {
        let mut token = token();
        let (alice, bob) = (account("alice"), account("bob"));
        token.mint(&account("owner"), alice, 1).unwrap();

        assert!(token.set_approval_for_all(&alice, alice, true).is_err());
        token.set_approval_for_all(&alice, bob, true).unwrap();
        assert!(token.is_approved_for_all(&alice, &bob));

        // Operators can approve on the holder's behalf
        token.approve(&bob, account("carol"), 1).unwrap();
        token.transfer_from(&bob, &alice, bob, 1).unwrap();
        assert_eq!(token.owner_of(1).unwrap(), bob);

        token.set_approval_for_all(&alice, bob, false).unwrap();
        assert!(!token.is_approved_for_all(&alice, &bob));
    }

    #[test]
    fn test_transfer_checks_holder_and_pause() {
        let mut token = token();
        let (alice, bob) = (account("alice"), account("bob"));
        token.mint(&account("owner"), alice, 1).unwrap();

        assert!(matches!(
            token.transfer_from(&alice, &bob, bob, 1),
            Err(TokenError::Unauthorized(_))
        ));
        token.set_paused(&account("owner"), true).unwrap();
        assert_eq!(token.transfer_from(&alice, &alice, bob, 1), Err(TokenError::Paused));
    }
}
