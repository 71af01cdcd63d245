//! # Token Collaborators
//!
//! The farm never touches token balances directly. Each token it handles is
//! reached through a [`TokenVault`]: the farm's custody account for that token
//! plus the ability to pull tokens in from an account and push them out.
//!
//! Vaults are untrusted. A pull may deliver less than requested (transfer
//! taxes, deflationary tokens), so the farm measures what actually arrived by
//! comparing custody balances around the call.
//!
//! [`MemoryToken`] is an in-process ERC20-like ledger used by tests and the
//! simulator. It supports a per-transfer tax and freezing accounts to inject
//! transfer failures.

use crate::error::TransferError;
use crate::types::{AccountId, Amount, TokenId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Farm custody of a single token
pub trait TokenVault: Send + Sync {
    /// Token handled by this vault
    fn token(&self) -> TokenId;

    /// Balance currently held by the farm's custody account
    fn custody_balance(&self) -> Amount;

    /// Move `amount` from `from` into custody.
    ///
    /// Returns the amount the collaborator claims was credited to custody.
    fn pull(&self, from: &AccountId, amount: Amount) -> Result<Amount, TransferError>;

    /// Move `amount` out of custody to `to`.
    ///
    /// Returns the amount credited to the recipient.
    fn push(&self, to: &AccountId, amount: Amount) -> Result<Amount, TransferError>;

    /// Dry run of [`TokenVault::push`]. Collaborators that can refuse a
    /// recipient report it here so the farm can abort before anything moves.
    fn check_push(&self, _to: &AccountId, _amount: Amount) -> Result<(), TransferError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<AccountId, Amount>,
    frozen: Vec<AccountId>,
    total_supply: Amount,
}

impl TokenBook {
    /// Validate a transfer, returning the sender's balance
    fn check(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<Amount, TransferError> {
        for account in [from, to] {
            if self.frozen.contains(account) {
                return Err(TransferError::Frozen(*account));
            }
        }

        let available = self.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(available)
    }
}

/// In-memory fungible token with an optional transfer tax.
///
/// The tax is `amount * tax_percent / 100`, burned from every transfer: the
/// sender is debited the full amount and the recipient credited the rest.
#[derive(Clone, Debug)]
pub struct MemoryToken {
    id: TokenId,
    symbol: String,
    tax_percent: u8,
    book: Arc<RwLock<TokenBook>>,
}

impl MemoryToken {
    /// Create a token without transfer tax
    pub fn new(symbol: &str) -> Self {
        Self::with_tax(symbol, 0)
    }

    /// Create a deflationary token burning `tax_percent` of each transfer
    pub fn with_tax(symbol: &str, tax_percent: u8) -> Self {
        Self {
            id: TokenId::from_symbol(symbol),
            symbol: symbol.to_string(),
            tax_percent: tax_percent.min(100),
            book: Arc::new(RwLock::new(TokenBook::default())),
        }
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tax_percent(&self) -> u8 {
        self.tax_percent
    }

    /// Mint new tokens to an account
    pub fn mint(&self, to: &AccountId, amount: Amount) {
        let mut book = self.book.write();
        *book.balances.entry(*to).or_insert(0) += amount;
        book.total_supply += amount;
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.book.read().balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.book.read().total_supply
    }

    /// Freeze or unfreeze an account; transfers touching it fail
    pub fn set_frozen(&self, account: &AccountId, frozen: bool) {
        let mut book = self.book.write();
        book.frozen.retain(|a| a != account);
        if frozen {
            book.frozen.push(*account);
        }
    }

    /// Whether a transfer would succeed, without performing it
    pub fn check_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.book.read().check(from, to, amount).map(|_| ())
    }

    /// Transfer between two accounts, returning the amount received
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<Amount, TransferError> {
        let mut book = self.book.write();
        let available = book.check(from, to, amount)?;

        let tax = amount * self.tax_percent as u128 / 100;
        let received = amount - tax;

        book.balances.insert(*from, available - amount);
        *book.balances.entry(*to).or_insert(0) += received;
        book.total_supply -= tax;

        tracing::trace!(token = %self.symbol, %from, %to, amount, received, "transfer");
        Ok(received)
    }

    /// Vault view of this token held by `custody`
    pub fn vault(&self, custody: AccountId) -> MemoryVault {
        MemoryVault {
            token: self.clone(),
            custody,
        }
    }
}

/// [`TokenVault`] over a [`MemoryToken`]
#[derive(Clone, Debug)]
pub struct MemoryVault {
    token: MemoryToken,
    custody: AccountId,
}

impl MemoryVault {
    pub fn custody(&self) -> AccountId {
        self.custody
    }
}

impl TokenVault for MemoryVault {
    fn token(&self) -> TokenId {
        self.token.id()
    }

    fn custody_balance(&self) -> Amount {
        self.token.balance_of(&self.custody)
    }

    fn pull(&self, from: &AccountId, amount: Amount) -> Result<Amount, TransferError> {
        self.token.transfer(from, &self.custody, amount)
    }

    fn push(&self, to: &AccountId, amount: Amount) -> Result<Amount, TransferError> {
        self.token.transfer(&self.custody, to, amount)
    }

    fn check_push(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.token.check_transfer(&self.custody, to, amount)
    }
}
