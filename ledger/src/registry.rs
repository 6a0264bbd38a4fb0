//! # Vault Factory / Registry
//!
//! Thin orchestration over the [`VaultLedger`]: the factory validates
//! yield strategies against the approved-adapter allowlist, resolves
//! adapter instances for accrual, maintains the per-owner vault index,
//! and exposes the read-only projections a frontend needs.
//!
//! The owner index is maintained transactionally alongside creation —
//! appended only after the ledger committed the vault — never derived by
//! scanning all records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, AdapterId, AdapterRegistry, YieldAdapter};
use crate::asset::Principal;
use crate::config;
use crate::error::VaultError;
use crate::events::EventLog;
use crate::timelock::{BlockHeight, TimeLockAuthority};
use crate::vault::{EarlyWithdrawal, VaultConfig, VaultId, VaultLedger, VaultStatus};

// ---------------------------------------------------------------------------
// VaultView
// ---------------------------------------------------------------------------

/// Read-only projection of a vault, as served to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultView {
    /// The vault id.
    pub id: VaultId,
    /// The owning principal.
    pub owner: Principal,
    /// Locked balance in smallest units.
    pub balance: u64,
    /// Height at which the current lock period began.
    pub lock_start: BlockHeight,
    /// Lock duration in blocks.
    pub lock_duration_blocks: u64,
    /// Height at which the lock opens.
    pub lock_end_height: BlockHeight,
    /// Status at the queried height.
    pub status: VaultStatus,
    /// Yield strategy in use, if any.
    pub adapter: Option<AdapterId>,
    /// Whether the vault re-arms at expiry.
    pub perpetual: bool,
    /// Yield accrued but not yet harvested (as of the last touch).
    pub accrued_yield: u64,
    /// Height at which yield was last computed.
    pub last_accrual_height: BlockHeight,
}

// ---------------------------------------------------------------------------
// VaultFactory
// ---------------------------------------------------------------------------

/// The public face of the vault engine.
///
/// Owns the ledger, the adapter registry, the time-lock authority, and
/// the per-owner index. All mutating entry points delegate to the ledger
/// after the factory-level checks (adapter approval, preset resolution).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultFactory {
    ledger: VaultLedger,
    adapters: AdapterRegistry,
    timelock: TimeLockAuthority,
    /// Append-only vault ids per owner, in creation order.
    owner_index: BTreeMap<Principal, Vec<VaultId>>,
}

impl VaultFactory {
    /// Builds a factory around a fresh ledger.
    ///
    /// The factory and escrow principals are pre-authorized on the
    /// time-lock authority, the same wiring a deployment script performs
    /// on-chain.
    pub fn new(vault_config: VaultConfig) -> Self {
        let mut timelock = TimeLockAuthority::new(vault_config.admins.clone());
        timelock.grant(config::FACTORY_PRINCIPAL);
        timelock.grant(&vault_config.vault_principal);

        Self {
            ledger: VaultLedger::new(vault_config),
            adapters: AdapterRegistry::new(),
            timelock,
            owner_index: BTreeMap::new(),
        }
    }

    /// The underlying ledger (read-only).
    pub fn ledger(&self) -> &VaultLedger {
        &self.ledger
    }

    /// Mutable ledger access, for the host to seed asset balances.
    pub fn ledger_mut(&mut self) -> &mut VaultLedger {
        &mut self.ledger
    }

    /// The time-lock authority.
    pub fn timelock(&self) -> &TimeLockAuthority {
        &self.timelock
    }

    /// Mutable time-lock authority access (allowlist management).
    pub fn timelock_mut(&mut self) -> &mut TimeLockAuthority {
        &mut self.timelock
    }

    /// The committed event log.
    pub fn events(&self) -> &EventLog {
        self.ledger.events()
    }

    // -----------------------------------------------------------------------
    // Adapter Management
    // -----------------------------------------------------------------------

    /// Registers a yield adapter instance. Admin-only.
    ///
    /// The escrow principal is granted caller status on the adapter so
    /// the engine can accrue against it.
    pub fn register_adapter(
        &mut self,
        caller: &str,
        mut adapter: YieldAdapter,
    ) -> Result<(), VaultError> {
        self.ledger.safety().require_admin(caller)?;
        adapter.grant_caller(&self.ledger.config().vault_principal);
        tracing::info!(adapter_id = %adapter.id, "yield adapter registered");
        self.adapters.register(adapter);
        Ok(())
    }

    /// Adds a registered adapter to the approved allowlist. Admin-only;
    /// idempotent. Returns `true` if newly approved.
    pub fn add_approved_adapter(&mut self, caller: &str, id: &str) -> Result<bool, VaultError> {
        self.ledger.safety().require_admin(caller)?;
        let added = self.adapters.approve(id)?;
        if added {
            tracing::info!(adapter_id = id, "yield adapter approved");
        }
        Ok(added)
    }

    /// Returns `true` if `id` is on the approved allowlist.
    pub fn is_adapter_approved(&self, id: &str) -> bool {
        self.adapters.is_approved(id)
    }

    /// Posts an external rate quote to a registered adapter on behalf of
    /// `caller` (authorized callers only — typically an auto-yield engine).
    pub fn post_adapter_rate(
        &mut self,
        caller: &str,
        id: &str,
        rate_bps: u32,
    ) -> Result<(), VaultError> {
        let adapter = self
            .adapters
            .get_mut(id)
            .ok_or_else(|| AdapterError::UnknownAdapter(id.to_string()))?;
        adapter.post_rate(caller, rate_bps)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Vault Creation
    // -----------------------------------------------------------------------

    /// Creates a vault with an initial deposit, validating the requested
    /// adapter against the approved allowlist first.
    pub fn create_with_deposit(
        &mut self,
        owner: &str,
        amount: u64,
        duration_blocks: u64,
        adapter: Option<AdapterId>,
        perpetual: bool,
        now: BlockHeight,
    ) -> Result<VaultId, VaultError> {
        if let Some(adapter_id) = &adapter {
            if !self.adapters.is_approved(adapter_id) {
                return Err(VaultError::AdapterNotApproved(adapter_id.clone()));
            }
        }
        let vault_id = self
            .ledger
            .create(owner, amount, duration_blocks, adapter, perpetual, now)?;
        self.owner_index
            .entry(owner.to_string())
            .or_default()
            .push(vault_id);
        Ok(vault_id)
    }

    /// Creates a plain vault: no yield strategy, no perpetual flag.
    pub fn create_vault(
        &mut self,
        owner: &str,
        amount: u64,
        duration_blocks: u64,
        now: BlockHeight,
    ) -> Result<VaultId, VaultError> {
        self.create_with_deposit(owner, amount, duration_blocks, None, false, now)
    }

    /// Creates a vault from a lock-preset label (`"7d"`, `"30d"`, `"90d"`,
    /// `"180d"`). Equivalent to [`create_with_deposit`](Self::create_with_deposit)
    /// with the label's block count.
    pub fn create_with_preset(
        &mut self,
        owner: &str,
        amount: u64,
        preset: &str,
        adapter: Option<AdapterId>,
        perpetual: bool,
        now: BlockHeight,
    ) -> Result<VaultId, VaultError> {
        let duration_blocks =
            config::preset_duration_blocks(preset).ok_or(VaultError::InvalidDuration)?;
        self.create_with_deposit(owner, amount, duration_blocks, adapter, perpetual, now)
    }

    // -----------------------------------------------------------------------
    // Vault Operations (delegated)
    // -----------------------------------------------------------------------

    /// Deposits into an existing vault. See [`VaultLedger::deposit`].
    pub fn deposit(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        let adapter = resolve_adapter(&self.adapters, &self.ledger, vault_id)?;
        self.ledger.deposit(vault_id, caller, amount, adapter, now)
    }

    /// Penalty-free withdrawal after unlock. See [`VaultLedger::withdraw`].
    pub fn withdraw(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        let adapter = resolve_adapter(&self.adapters, &self.ledger, vault_id)?;
        self.ledger.withdraw(vault_id, caller, amount, adapter, now)
    }

    /// Early withdrawal with penalty. See [`VaultLedger::early_withdraw`].
    pub fn early_withdraw(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        amount: u64,
        now: BlockHeight,
    ) -> Result<EarlyWithdrawal, VaultError> {
        let adapter = resolve_adapter(&self.adapters, &self.ledger, vault_id)?;
        self.ledger
            .early_withdraw(vault_id, caller, amount, adapter, now)
    }

    /// Harvests accrued yield. See [`VaultLedger::harvest_yield`].
    pub fn harvest_yield(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        let adapter = resolve_adapter(&self.adapters, &self.ledger, vault_id)?;
        self.ledger.harvest_yield(vault_id, caller, adapter, now)
    }

    /// Compounds accrued yield. See [`VaultLedger::compound_yield`].
    pub fn compound_yield(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        now: BlockHeight,
    ) -> Result<u64, VaultError> {
        let adapter = resolve_adapter(&self.adapters, &self.ledger, vault_id)?;
        self.ledger.compound_yield(vault_id, caller, adapter, now)
    }

    /// Renews an expired perpetual vault. See [`VaultLedger::renew_perpetual`].
    pub fn renew_perpetual(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        now: BlockHeight,
    ) -> Result<(), VaultError> {
        self.ledger.renew_perpetual(vault_id, caller, now)
    }

    /// Closes a drained vault. See [`VaultLedger::close`].
    pub fn close_vault(&mut self, vault_id: VaultId, caller: &str) -> Result<(), VaultError> {
        self.ledger.close(vault_id, caller)
    }

    /// Grants a harvest delegate. See [`VaultLedger::authorize_harvester`].
    pub fn authorize_harvester(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        delegate: &str,
    ) -> Result<bool, VaultError> {
        self.ledger.authorize_harvester(vault_id, caller, delegate)
    }

    /// Revokes a harvest delegate. See [`VaultLedger::revoke_harvester`].
    pub fn revoke_harvester(
        &mut self,
        vault_id: VaultId,
        caller: &str,
        delegate: &str,
    ) -> Result<bool, VaultError> {
        self.ledger.revoke_harvester(vault_id, caller, delegate)
    }

    // -----------------------------------------------------------------------
    // Safety Valve (delegated)
    // -----------------------------------------------------------------------

    /// Toggles the emergency pause. Admin-only.
    pub fn set_paused(&mut self, caller: &str, paused: bool) -> Result<(), VaultError> {
        self.ledger.set_paused(caller, paused)
    }

    /// Rescues stray tokens while paused. See [`VaultLedger::rescue_token`].
    pub fn rescue_token(
        &mut self,
        caller: &str,
        asset: &str,
        amount: u64,
        to: &str,
    ) -> Result<(), VaultError> {
        self.ledger.rescue_token(caller, asset, amount, to)
    }

    // -----------------------------------------------------------------------
    // Read-only Projections
    // -----------------------------------------------------------------------

    /// Returns the vault projection at the queried height, or `None` for
    /// unknown ids.
    pub fn get_vault_info(&self, vault_id: VaultId, now: BlockHeight) -> Option<VaultView> {
        self.ledger.get(vault_id).map(|vault| VaultView {
            id: vault.id,
            owner: vault.owner.clone(),
            balance: vault.balance,
            lock_start: vault.lock_start,
            lock_duration_blocks: vault.lock_duration_blocks,
            lock_end_height: vault.lock_end_height,
            status: vault.status_at(now),
            adapter: vault.adapter.clone(),
            perpetual: vault.perpetual,
            accrued_yield: vault.accrued_yield,
            last_accrual_height: vault.last_accrual_height,
        })
    }

    /// Returns the owner's vault ids in creation order. Never contains
    /// duplicates or ids owned by others.
    pub fn get_user_vaults(&self, owner: &str) -> Vec<VaultId> {
        self.owner_index.get(owner).cloned().unwrap_or_default()
    }
}

/// Resolves the adapter instance a vault's stored id points at.
///
/// Unknown vault ids resolve to `None` here and fail with `NotFound`
/// inside the ledger, keeping the error source in one place.
fn resolve_adapter<'a>(
    adapters: &'a AdapterRegistry,
    ledger: &VaultLedger,
    vault_id: VaultId,
) -> Result<Option<&'a YieldAdapter>, VaultError> {
    let Some(vault) = ledger.get(vault_id) else {
        return Ok(None);
    };
    match &vault.adapter {
        None => Ok(None),
        Some(adapter_id) => adapters
            .get(adapter_id)
            .map(Some)
            .ok_or_else(|| AdapterError::UnknownAdapter(adapter_id.clone()).into()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
