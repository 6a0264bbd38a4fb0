//! # Asset Ledger — Fungible Balances per Principal
//!
//! The asset ledger is the collaborator that actually holds the money: a
//! map of `(asset, principal) -> balance` with mint, burn, and transfer
//! operations. The vault ledger never touches raw balances itself — every
//! value-moving vault operation goes through [`AssetLedger::transfer`],
//! which keeps the conservation story in one place.
//!
//! In a deployed system this role is played by the host chain's token
//! contract; the in-process implementation here reproduces its semantics
//! (atomicity, overflow checks, no negative balances) for the engine and
//! its tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An account identity: a wallet address or a contract principal.
///
/// Principals are opaque strings to the ledger — it compares them for
/// equality and nothing else.
pub type Principal = String;

/// Asset identifier: the token symbol (e.g. `"eBTC"`).
pub type AssetId = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during asset-ledger operations.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Attempted to debit more than the available balance.
    #[error("insufficient funds: {principal} has {available}, requested {requested} ({asset})")]
    InsufficientFunds {
        /// The asset being debited.
        asset: AssetId,
        /// The principal whose balance fell short.
        principal: Principal,
        /// The balance at the time of the attempt.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// Arithmetic overflow during a credit or mint.
    ///
    /// If you're hitting this, someone is trying to credit more than
    /// 18.4 quintillion smallest units. That's either a bug or an attack.
    #[error("balance overflow: {principal} at {current}, credit {credit} ({asset})")]
    Overflow {
        /// The asset being credited.
        asset: AssetId,
        /// The principal whose balance would overflow.
        principal: Principal,
        /// The balance before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// Fungible balances for any number of assets, keyed by principal.
///
/// Each operation either commits in full or fails with no state change —
/// the same single-call atomicity the host chain would provide.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssetLedger {
    /// `asset -> (principal -> balance)`.
    balances: BTreeMap<AssetId, BTreeMap<Principal, u64>>,
    /// Total minted-minus-burned supply per asset.
    supplies: BTreeMap<AssetId, u64>,
}

impl AssetLedger {
    /// Creates an empty asset ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints new units of `asset` to `to`, increasing total supply.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::Overflow`] if the recipient balance or the
    /// total supply would exceed `u64::MAX`.
    pub fn mint(&mut self, asset: &str, to: &str, amount: u64) -> Result<u64, AssetError> {
        let supply = self.supplies.entry(asset.to_string()).or_insert(0);
        let new_supply = supply.checked_add(amount).ok_or(AssetError::Overflow {
            asset: asset.to_string(),
            principal: to.to_string(),
            current: *supply,
            credit: amount,
        })?;

        let balance = self
            .balances
            .entry(asset.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0);
        let new_balance = balance.checked_add(amount).ok_or(AssetError::Overflow {
            asset: asset.to_string(),
            principal: to.to_string(),
            current: *balance,
            credit: amount,
        })?;

        *balance = new_balance;
        *self
            .supplies
            .get_mut(asset)
            .expect("supply entry inserted above") = new_supply;
        Ok(new_balance)
    }

    /// Burns units of `asset` held by `from`, decreasing total supply.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::InsufficientFunds`] if `from` holds less
    /// than `amount`.
    pub fn burn(&mut self, asset: &str, from: &str, amount: u64) -> Result<u64, AssetError> {
        let balance = self.balance_of(asset, from);
        if balance < amount {
            return Err(AssetError::InsufficientFunds {
                asset: asset.to_string(),
                principal: from.to_string(),
                available: balance,
                requested: amount,
            });
        }

        if let Some(entry) = self
            .balances
            .get_mut(asset)
            .and_then(|per_asset| per_asset.get_mut(from))
        {
            *entry -= amount;
        }
        if let Some(supply) = self.supplies.get_mut(asset) {
            *supply = supply.saturating_sub(amount);
        }
        Ok(self.balance_of(asset, from))
    }

    /// Moves `amount` of `asset` from one principal to another.
    ///
    /// Validates the debit before touching either balance, so a failed
    /// transfer leaves the ledger exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::InsufficientFunds`] if the sender's balance
    /// is short, or [`AssetError::Overflow`] if the recipient's balance
    /// would wrap.
    pub fn transfer(
        &mut self,
        asset: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), AssetError> {
        let from_balance = self.balance_of(asset, from);
        if from_balance < amount {
            return Err(AssetError::InsufficientFunds {
                asset: asset.to_string(),
                principal: from.to_string(),
                available: from_balance,
                requested: amount,
            });
        }

        let to_balance = self.balance_of(asset, to);
        let new_to_balance = to_balance.checked_add(amount).ok_or(AssetError::Overflow {
            asset: asset.to_string(),
            principal: to.to_string(),
            current: to_balance,
            credit: amount,
        })?;

        let per_asset = self.balances.entry(asset.to_string()).or_default();
        *per_asset.entry(from.to_string()).or_insert(0) = from_balance - amount;
        *per_asset.entry(to.to_string()).or_insert(0) = new_to_balance;
        Ok(())
    }

    /// Returns the balance of `principal` for `asset`, or 0.
    pub fn balance_of(&self, asset: &str, principal: &str) -> u64 {
        self.balances
            .get(asset)
            .and_then(|per_asset| per_asset.get(principal))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the total supply of `asset`, or 0 if it was never minted.
    pub fn total_supply(&self, asset: &str) -> u64 {
        self.supplies.get(asset).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRIMARY_ASSET;

    #[test]
    fn mint_credits_balance_and_supply() {
        let mut ledger = AssetLedger::new();
        let balance = ledger.mint(PRIMARY_ASSET, "ember:alice", 1_000).unwrap();
        assert_eq!(balance, 1_000);
        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:alice"), 1_000);
        assert_eq!(ledger.total_supply(PRIMARY_ASSET), 1_000);
    }

    #[test]
    fn mint_accumulates() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 500).unwrap();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 300).unwrap();
        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:alice"), 800);
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", u64::MAX).unwrap();
        let result = ledger.mint(PRIMARY_ASSET, "ember:alice", 1);
        assert!(matches!(result, Err(AssetError::Overflow { .. })));
        // Failed mint must not have touched anything.
        assert_eq!(ledger.total_supply(PRIMARY_ASSET), u64::MAX);
    }

    #[test]
    fn transfer_moves_value() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 1_000).unwrap();
        ledger
            .transfer(PRIMARY_ASSET, "ember:alice", "ember:bob", 400)
            .unwrap();

        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:alice"), 600);
        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:bob"), 400);
        // Transfers conserve supply.
        assert_eq!(ledger.total_supply(PRIMARY_ASSET), 1_000);
    }

    #[test]
    fn transfer_insufficient_funds_rejected() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 100).unwrap();
        let result = ledger.transfer(PRIMARY_ASSET, "ember:alice", "ember:bob", 200);
        assert!(matches!(
            result,
            Err(AssetError::InsufficientFunds {
                available: 100,
                requested: 200,
                ..
            })
        ));
        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:bob"), 0);
    }

    #[test]
    fn transfer_from_unknown_principal_rejected() {
        let mut ledger = AssetLedger::new();
        let result = ledger.transfer(PRIMARY_ASSET, "ember:ghost", "ember:bob", 1);
        assert!(matches!(
            result,
            Err(AssetError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn burn_reduces_balance_and_supply() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 1_000).unwrap();
        let remaining = ledger.burn(PRIMARY_ASSET, "ember:alice", 400).unwrap();
        assert_eq!(remaining, 600);
        assert_eq!(ledger.total_supply(PRIMARY_ASSET), 600);
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 100).unwrap();
        assert!(ledger.burn(PRIMARY_ASSET, "ember:alice", 200).is_err());
    }

    #[test]
    fn assets_are_isolated() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 1_000).unwrap();
        ledger.mint("FOO", "ember:alice", 77).unwrap();

        assert_eq!(ledger.balance_of(PRIMARY_ASSET, "ember:alice"), 1_000);
        assert_eq!(ledger.balance_of("FOO", "ember:alice"), 77);
        assert_eq!(ledger.total_supply("FOO"), 77);
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = AssetLedger::new();
        ledger.mint(PRIMARY_ASSET, "ember:alice", 42).unwrap();

        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: AssetLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.balance_of(PRIMARY_ASSET, "ember:alice"), 42);
    }
}
