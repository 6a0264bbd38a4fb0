//! # The Vault Ledger
//!
//! The core state machine. Owns the vault record set, the escrowed asset
//! balances, the event log, and the safety module, and implements every
//! vault operation: create, deposit, withdraw, early-withdraw, harvest,
//! compound, renew, close, plus pause and rescue.
//!
//! ## Atomicity
//!
//! The host environment executes one entry point at a time, to completion.
//! The ledger reproduces that contract in-process: every method validates
//! and pre-computes first, then commits — fallible asset-ledger calls run
//! before any record mutation, and multi-leg payouts pre-validate every
//! credit, so an `Err` return always means "nothing changed".
//!
//! ## Lazy accrual
//!
//! Yield is a pure function of `(balance, elapsed_blocks)`. The ledger
//! stores only `accrued_yield` and `last_accrual_height`; any operation
//! that changes the balance first folds the pending delta (computed
//! against the pre-change balance) into `accrued_yield`, so the formula
//! never retroactively applies a new balance to an old interval.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, AdapterId, YieldAdapter};
use crate::admin::SafetyModule;
use crate::asset::{AssetError, AssetId, AssetLedger, Principal};
use crate::config;
use crate::error::VaultError;
use crate::events::{EventKind, EventLog};
use crate::timelock::{self, BlockHeight};

use super::record::{Vault, VaultId, VaultStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens to collected early-withdrawal penalties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyDisposition {
    /// Penalties are burned, shrinking total supply.
    Burn,
    /// Penalties accumulate at the treasury principal.
    Treasury,
}

/// Construction-time configuration for the vault engine.
///
/// Injected explicitly — mutating operations check their caller against
/// `admins`, never against ambient global state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// The primary vault asset.
    pub asset: AssetId,
    /// Escrow principal holding all locked balances.
    pub vault_principal: Principal,
    /// Recipient of penalties under [`PenaltyDisposition::Treasury`].
    pub treasury_principal: Principal,
    /// Early-withdrawal penalty rate in basis points.
    pub penalty_rate_bps: u32,
    /// Where collected penalties go.
    pub penalty_disposition: PenaltyDisposition,
    /// Principals allowed to pause, rescue, and manage allowlists.
    pub admins: BTreeSet<Principal>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let mut admins = BTreeSet::new();
        admins.insert(config::DEPLOYER_PRINCIPAL.to_string());
        Self {
            asset: config::PRIMARY_ASSET.to_string(),
            vault_principal: config::VAULT_PRINCIPAL.to_string(),
            treasury_principal: config::TREASURY_PRINCIPAL.to_string(),
            penalty_rate_bps: config::PENALTY_RATE_BPS,
            penalty_disposition: PenaltyDisposition::Treasury,
            admins,
        }
    }
}

/// Result of an early withdrawal: what was kept and what was paid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyWithdrawal {
    /// Amount retained as the early-exit penalty.
    pub penalty: u64,
    /// Amount credited to the withdrawing owner.
    pub received: u64,
}

// ---------------------------------------------------------------------------
// VaultLedger
// ---------------------------------------------------------------------------

/// The vault record set and everything needed to move its money.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultLedger {
    config: VaultConfig,
    safety: SafetyModule,
    assets: AssetLedger,
    vaults: std::collections::BTreeMap<VaultId, Vault>,
    /// Next id to assign. Ids are dense, start at 1, and are never reused.
    next_id: VaultId,
    events: EventLog,
}

impl VaultLedger {
    /// Creates an empty ledger with the given configuration.
    pub fn new(config: VaultConfig) -> Self {
        let safety = SafetyModule::new(config.admins.clone());
        Self {
            config,
            safety,
            assets: AssetLedger::new(),
            vaults: std::collections::BTreeMap::new(),
            next_id: 1,
            events: EventLog::new(),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The safety module (pause flag, admin checks).
    pub fn safety(&self) -> &SafetyModule {
        &self.safety
    }

    /// The underlying asset ledger.
    pub fn assets(&self) -> &AssetLedger {
        &self.assets
    }

    /// Mutable asset-ledger access, for the host to seed balances.
    ///
    /// In a deployed system the asset ledger is the chain's token
    /// contract; minting through here stands in for on-chain issuance.
    pub fn assets_mut(&mut self) -> &mut AssetLedger {
        &mut self.assets
    }

    /// The append-only event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Looks up a vault record.
    pub fn get(&self, vault_id: VaultId) -> Option<&Vault> {
        self.vaults.get(&vault_id)
    }

    /// Number of vaults ever created (closed ones included).
    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// Sum of all vault balances — the escrow amount the ledger accounts
    /// for. Anything the escrow principal holds beyond this is stray.
    pub fn total_accounted(&self) -> u64 {
        let total: u128 = self.vaults.values().map(|v| u128::from(v.balance)).sum();
        u64::try_from(total).unwrap_or(u64::MAX)
    }

    // -----------------------------------------------------------------------
    // Lifecycle Operations
    // -----------------------------------------------------------------------

    /// Creates a vault with an initial deposit and returns its id.
    ///
    /// Pulls `amount` from `owner` into escrow and arms the lock at
    /// `now + duration_blocks`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidAmount`] for a zero deposit,
    /// [`VaultError::InvalidDuration`] / [`VaultError::DurationOverflow`]
    /// for a bad lock, [`VaultError::Paused`] during an emergency pause,
    /// and an asset error if the owner cannot fund the deposit.
    pub fn create(
        &mut self,
        owner: &str,
        amount: u64,
        duration_blocks: u64,
        adapter: Option<AdapterId>,
        perpetual: bool,
        now: BlockHeight,
    ) -> Result<VaultId, VaultError> {
        self.safety.require_active()?;
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }
        let lock_end_height = timelock::compute_unlock(now, duration_blocks)?;

        self.assets
            .transfer(&self.config.asset, owner, &self.config.vault_principal, amount)?;

        let id = self.next_id;
        self.next_id += 1;
        self.vaults.insert(
            id,
            Vault::new(
                id,
                owner,
                amount,
                now,
                duration_blocks,
                lock_end_height,
                adapter,
                perpetual,
            ),
        );
        self.events
            .record(id, EventKind::Created, amount, None, now);
        tracing::info!(
            vault_id = id,
            owner,
            amount,
            lock_end_height,
            perpetual,
            "vault created"
        );
        Ok(id)
    }

    /// Deposits additional funds into an existing vault.
    ///
    /// Does not alter the lock timing. Pending yield is folded against the
    /// pre-deposit balance first.
    pub fn deposit(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        adapter: Option<&YieldAdapter>,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        self.safety.require_active()?;
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let new_accrued = accrued_after_fold(vault, adapter, &self.config.vault_principal, now)?;
        let new_balance = vault
            .balance
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;

        self.assets
            .transfer(&self.config.asset, caller, &self.config.vault_principal, amount)?;

        vault.accrued_yield = new_accrued;
        vault.last_accrual_height = now;
        vault.balance = new_balance;
        vault.touch(now);
        self.events
            .record(vault_id, EventKind::Deposit, amount, None, now);
        tracing::debug!(vault_id, amount, new_balance, "deposit accepted");
        Ok(new_balance)
    }

    /// Withdraws funds after the lock has expired. 1:1, no penalty.
    pub fn withdraw(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        adapter: Option<&YieldAdapter>,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        self.safety.require_active()?;
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }
        if !vault.is_unlocked(now) {
            return Err(VaultError::StillLocked {
                vault_id,
                unlock_height: vault.lock_end_height,
                now,
            });
        }
        if amount > vault.balance {
            return Err(VaultError::InsufficientFunds {
                vault_id,
                available: vault.balance,
                requested: amount,
            });
        }

        let new_accrued = accrued_after_fold(vault, adapter, &self.config.vault_principal, now)?;

        self.assets
            .transfer(&self.config.asset, &self.config.vault_principal, caller, amount)?;

        vault.accrued_yield = new_accrued;
        vault.last_accrual_height = now;
        vault.balance -= amount;
        vault.touch(now);
        let remaining = vault.balance;
        self.events
            .record(vault_id, EventKind::Withdrawal, amount, None, now);
        tracing::debug!(vault_id, amount, remaining, "withdrawal paid out");
        Ok(remaining)
    }

    /// Withdraws before the lock expires, deducting the configured
    /// penalty from the payout.
    ///
    /// The penalty is `floor(amount * penalty_rate_bps / 10_000)`; it is
    /// burned or sent to the treasury per the configured disposition and
    /// is never credited back to the caller.
    pub fn early_withdraw(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        adapter: Option<&YieldAdapter>,
        now: BlockHeight,
    ) -> Result<EarlyWithdrawal, VaultError> {
        self.safety.require_active()?;
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }
        if vault.is_unlocked(now) {
            return Err(VaultError::LockExpired {
                vault_id,
                unlock_height: vault.lock_end_height,
                now,
            });
        }
        if amount > vault.balance {
            return Err(VaultError::InsufficientFunds {
                vault_id,
                available: vault.balance,
                requested: amount,
            });
        }

        let penalty = penalty_for(amount, self.config.penalty_rate_bps);
        let received = amount - penalty;
        let new_accrued = accrued_after_fold(vault, adapter, &self.config.vault_principal, now)?;

        // Pre-validate both credits so the two-step payout cannot commit
        // halfway: the escrow debit is covered by the accounting invariant,
        // leaving recipient overflow as the only failure mode.
        let caller_balance = self.assets.balance_of(&self.config.asset, caller);
        if caller_balance.checked_add(received).is_none() {
            return Err(VaultError::Overflow);
        }
        if self.config.penalty_disposition == PenaltyDisposition::Treasury {
            let treasury_balance = self
                .assets
                .balance_of(&self.config.asset, &self.config.treasury_principal);
            if treasury_balance.checked_add(penalty).is_none() {
                return Err(VaultError::Overflow);
            }
        }

        self.assets.transfer(
            &self.config.asset,
            &self.config.vault_principal,
            caller,
            received,
        )?;
        if penalty > 0 {
            match self.config.penalty_disposition {
                PenaltyDisposition::Burn => {
                    self.assets
                        .burn(&self.config.asset, &self.config.vault_principal, penalty)?;
                }
                PenaltyDisposition::Treasury => {
                    self.assets.transfer(
                        &self.config.asset,
                        &self.config.vault_principal,
                        &self.config.treasury_principal,
                        penalty,
                    )?;
                }
            }
        }

        vault.accrued_yield = new_accrued;
        vault.last_accrual_height = now;
        vault.balance -= amount;
        vault.touch(now);
        self.events
            .record(vault_id, EventKind::Penalty, amount, Some(penalty), now);
        tracing::info!(vault_id, amount, penalty, received, "early withdrawal");
        Ok(EarlyWithdrawal { penalty, received })
    }

    /// Realizes accrued yield and pays it out to the harvester.
    ///
    /// Callable by the owner or a delegated harvester. Idempotent within a
    /// height: a second call at the same `now` harvests 0.
    pub fn harvest_yield(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        adapter: Option<&YieldAdapter>,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        self.safety.require_active()?;
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if !vault.may_harvest(caller) {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }

        let harvested = accrued_after_fold(vault, adapter, &self.config.vault_principal, now)?;
        if harvested > 0 {
            // Yield enters circulation here: the venue behind the strategy
            // is the economic source, modeled as issuance.
            self.assets.mint(&self.config.asset, caller, harvested)?;
        }

        vault.accrued_yield = 0;
        vault.last_accrual_height = now;
        vault.touch(now);
        if harvested > 0 {
            self.events
                .record(vault_id, EventKind::Harvest, harvested, None, now);
        }
        tracing::debug!(vault_id, harvested, "yield harvested");
        Ok(harvested)
    }

    /// Realizes accrued yield and folds it into the vault balance instead
    /// of paying it out. Compounding zero pending yield is a no-op.
    pub fn compound_yield(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        adapter: Option<&YieldAdapter>,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        self.safety.require_active()?;
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if !vault.may_harvest(caller) {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }

        let harvested = accrued_after_fold(vault, adapter, &self.config.vault_principal, now)?;
        let new_balance = vault
            .balance
            .checked_add(harvested)
            .ok_or(VaultError::Overflow)?;
        if harvested > 0 {
            self.assets
                .mint(&self.config.asset, &self.config.vault_principal, harvested)?;
        }

        vault.accrued_yield = 0;
        vault.last_accrual_height = now;
        vault.balance = new_balance;
        vault.touch(now);
        if harvested > 0 {
            self.events
                .record(vault_id, EventKind::Compound, harvested, None, now);
        }
        tracing::debug!(vault_id, harvested, new_balance, "yield compounded");
        Ok(new_balance)
    }

    /// Re-arms an expired perpetual vault for another lock period of the
    /// original duration.
    pub fn renew_perpetual(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        now: BlockHeight,
    ) -> Result<(), VaultError> {
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::VaultClosed(vault_id));
        }
        if !vault.perpetual {
            return Err(VaultError::NotPerpetual(vault_id));
        }
        if !vault.is_unlocked(now) {
            return Err(VaultError::StillLocked {
                vault_id,
                unlock_height: vault.lock_end_height,
                now,
            });
        }

        // now >= old lock end and the duration is at least one block, so
        // the new unlock height strictly increases.
        let lock_end_height = timelock::compute_unlock(now, vault.lock_duration_blocks)?;
        vault.lock_start = now;
        vault.lock_end_height = lock_end_height;
        vault.touch(now);
        debug_assert_eq!(vault.status, VaultStatus::Active);
        self.events
            .record(vault_id, EventKind::Renewal, vault.balance, None, now);
        tracing::info!(vault_id, lock_end_height, "perpetual vault renewed");
        Ok(())
    }

    /// Closes a drained vault. Terminal and audit-retained; a second call
    /// fails with [`VaultError::AlreadyClosed`].
    ///
    /// Un-harvested yield at close time is forfeited — harvest first.
    pub fn close(&mut self, vault_id: VaultId, caller: &str) -> Result<(), VaultError> {
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if vault.is_closed() {
            return Err(VaultError::AlreadyClosed(vault_id));
        }
        if vault.balance != 0 {
            return Err(VaultError::VaultNotEmpty {
                vault_id,
                balance: vault.balance,
            });
        }

        vault.status = VaultStatus::Closed;
        vault.updated_at = chrono::Utc::now();
        tracing::info!(vault_id, "vault closed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Harvest Delegation
    // -----------------------------------------------------------------------

    /// Grants `delegate` the right to harvest this vault's yield.
    /// Owner-only; idempotent. Returns `true` if newly granted.
    pub fn authorize_harvester(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        delegate: &str,
    ) -> Result<bool, VaultError> {
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(vault.harvest_delegates.insert(delegate.to_string()))
    }

    /// Revokes a previously granted harvest right. Owner-only.
    /// Returns `true` if the delegate was present.
    pub fn revoke_harvester(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        delegate: &str,
    ) -> Result<bool, VaultError> {
        let vault = self
            .vaults
            .get_mut(&vault_id)
            .ok_or(VaultError::NotFound(vault_id))?;
        if vault.owner != caller {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(vault.harvest_delegates.remove(delegate))
    }

    // -----------------------------------------------------------------------
    // Safety Valve
    // -----------------------------------------------------------------------

    /// Toggles the emergency pause. Admin-only.
    pub fn set_paused(&mut self, caller: &str, paused: bool) -> Result<(), VaultError> {
        self.safety.set_paused(caller, paused)
    }

    /// Returns the pause flag.
    pub fn is_paused(&self) -> bool {
        self.safety.is_paused()
    }

    /// Transfers stray tokens out of the escrow principal. Admin-only,
    /// and only while paused.
    ///
    /// For the primary asset, only the portion of the escrow balance NOT
    /// accounted to any vault is rescuable — the escape hatch cannot be
    /// used to drain locked deposits. Foreign assets are rescuable in full.
    pub fn rescue_token(
        &mut self,
        caller: &str,
        asset: &str,
        amount: u64,
        to: &str,
    ) -> Result<(), VaultError> {
        self.safety.require_admin(caller)?;
        self.safety.require_paused()?;
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let held = self.assets.balance_of(asset, &self.config.vault_principal);
        let available = if asset == self.config.asset {
            held.saturating_sub(self.total_accounted())
        } else {
            held
        };
        if amount > available {
            return Err(AssetError::InsufficientFunds {
                asset: asset.to_string(),
                principal: self.config.vault_principal.clone(),
                available,
                requested: amount,
            }
            .into());
        }

        self.assets
            .transfer(asset, &self.config.vault_principal, to, amount)?;
        tracing::warn!(asset, amount, to, admin = caller, "rescue transfer executed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accrual helpers
// ---------------------------------------------------------------------------

/// Penalty on an early withdrawal: `floor(amount * rate_bps / 10_000)`.
fn penalty_for(amount: u64, rate_bps: u32) -> u64 {
    let numerator = u128::from(amount) * u128::from(rate_bps);
    u64::try_from(numerator / u128::from(config::BPS_DENOMINATOR)).unwrap_or(u64::MAX)
}

/// Computes `accrued_yield` as it would stand after folding the pending
/// delta at `now`. Pure — commits nothing.
///
/// A vault without an adapter accrues nothing. A vault whose adapter is
/// registered but not supplied (or supplied under the wrong id) is a
/// wiring bug surfaced as [`AdapterError::UnknownAdapter`].
fn accrued_after_fold(
    vault: &Vault,
    adapter: Option<&YieldAdapter>,
    engine: &str,
    now: BlockHeight,
) -> Result<u64, VaultError> {
    let Some(adapter_id) = &vault.adapter else {
        return Ok(vault.accrued_yield);
    };
    let adapter = adapter
        .filter(|a| &a.id == adapter_id)
        .ok_or_else(|| AdapterError::UnknownAdapter(adapter_id.clone()))?;
    let elapsed = now.saturating_sub(vault.last_accrual_height);
    let delta = adapter.accrue_for(engine, vault.balance, elapsed)?;
    vault
        .accrued_yield
        .checked_add(delta)
        .ok_or(VaultError::Overflow)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
