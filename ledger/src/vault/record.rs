//! # The Vault Record
//!
//! One [`Vault`] per savings position: a locked balance, its unlock
//! height, and the lazy-accrual yield bookkeeping. The record enforces
//! nothing on its own — all gating lives in the
//! [`VaultLedger`](super::ledger::VaultLedger) — but it owns the status
//! machine:
//!
//! ```text
//!    ┌──────────┐  lock end reached   ┌──────────┐  balance drained  ┌────────┐
//!    │  Active   │ ──────────────────► │ Unlocked │ ────────────────► │ Closed │
//!    └────▲─────┘                     └────┬─────┘    + close()      └────────┘
//!         │        renew (perpetual)       │
//!         └─────────────────────────────────┘
//! ```
//!
//! `Closed` is terminal; no transition leaves it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::AdapterId;
use crate::asset::Principal;
use crate::timelock::BlockHeight;

/// Vault identifier: dense, monotonically assigned starting at 1,
/// never reused.
pub type VaultId = u64;

// ---------------------------------------------------------------------------
// VaultStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    /// Before the unlock height; withdrawals pay the early-exit penalty.
    Active,
    /// Past the unlock height; funds are withdrawable penalty-free.
    Unlocked,
    /// Balance is zero and the owner closed the vault. Terminal.
    Closed,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultStatus::Active => write!(f, "Active"),
            VaultStatus::Unlocked => write!(f, "Unlocked"),
            VaultStatus::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A single savings position.
///
/// The lock fields (`lock_start`, `lock_duration_blocks`,
/// `lock_end_height`) are immutable once set, except through perpetual
/// renewal, which strictly increases `lock_end_height`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    /// Unique vault id.
    pub id: VaultId,
    /// The owning principal. Immutable after creation.
    pub owner: Principal,
    /// Locked balance in smallest units. Never negative by construction.
    pub balance: u64,
    /// Height at which the current lock period began.
    pub lock_start: BlockHeight,
    /// Lock duration in blocks; reused verbatim on perpetual renewal.
    pub lock_duration_blocks: u64,
    /// `lock_start + lock_duration_blocks`.
    pub lock_end_height: BlockHeight,
    /// Current lifecycle status. Refreshed on every ledger touch.
    pub status: VaultStatus,
    /// Yield strategy in use, if any.
    pub adapter: Option<AdapterId>,
    /// If `true`, the vault re-arms at expiry instead of winding down.
    pub perpetual: bool,
    /// Yield accrued but not yet harvested.
    pub accrued_yield: u64,
    /// Height at which yield was last computed.
    pub last_accrual_height: BlockHeight,
    /// Principals the owner delegated harvest rights to.
    pub harvest_delegates: BTreeSet<Principal>,
    /// Timestamp when the vault was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent state change.
    pub updated_at: DateTime<Utc>,
}

impl Vault {
    /// Creates an `Active` vault holding its initial deposit.
    pub(crate) fn new(
        id: VaultId,
        owner: &str,
        balance: u64,
        now: BlockHeight,
        lock_duration_blocks: u64,
        lock_end_height: BlockHeight,
        adapter: Option<AdapterId>,
        perpetual: bool,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            owner: owner.to_string(),
            balance,
            lock_start: now,
            lock_duration_blocks,
            lock_end_height,
            status: VaultStatus::Active,
            adapter,
            perpetual,
            accrued_yield: 0,
            last_accrual_height: now,
            harvest_delegates: BTreeSet::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Returns `true` once the lock period has elapsed.
    pub fn is_unlocked(&self, now: BlockHeight) -> bool {
        now >= self.lock_end_height
    }

    /// Returns `true` if the vault reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.status == VaultStatus::Closed
    }

    /// The status the vault has at the given height.
    ///
    /// The stored `status` field is only refreshed when the ledger touches
    /// the record; this computes the height-accurate view for reads.
    pub fn status_at(&self, now: BlockHeight) -> VaultStatus {
        if self.is_closed() {
            VaultStatus::Closed
        } else if self.is_unlocked(now) {
            VaultStatus::Unlocked
        } else {
            VaultStatus::Active
        }
    }

    /// Returns `true` if `caller` may harvest this vault's yield.
    pub fn may_harvest(&self, caller: &str) -> bool {
        self.owner == caller || self.harvest_delegates.contains(caller)
    }

    /// Syncs the stored status with the clock and stamps the record.
    pub(crate) fn touch(&mut self, now: BlockHeight) {
        if !self.is_closed() {
            self.status = if self.is_unlocked(now) {
                VaultStatus::Unlocked
            } else {
                VaultStatus::Active
            };
        }
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
