//! # Yield Adapters
//!
//! A yield adapter answers one question: given a principal balance and a
//! number of elapsed blocks, how much yield accrued? The formula itself is
//! pure and monotone in elapsed blocks — state lives in the vault record
//! (`accrued_yield`, `last_accrual_height`), never in the strategy.
//!
//! Two reference strategies ship with the protocol:
//!
//! - [`FixedApy`] — a constant annual rate, accrued pro rata per block.
//! - [`ExternalVenue`] — the rate is quoted by an external yield source;
//!   posting a fresh quote (and accruing on behalf of a vault) is
//!   restricted to the adapter's authorized-caller set, so a third party
//!   cannot steer the strategy's accounting.
//!
//! Strategies are a tagged enum dispatched by the adapter identifier a
//! vault stores — not trait objects in persistent state. The
//! [`YieldFormula`] trait is the seam; the enum is the wire format.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::Principal;
use crate::config::{BLOCKS_PER_YEAR, BPS_DENOMINATOR};

/// Identifier of a registered yield adapter (its contract principal).
pub type AdapterId = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The caller is not in the adapter's authorized-caller set.
    #[error("caller {caller} is not authorized on adapter {adapter_id}")]
    Unauthorized {
        /// The adapter that refused the call.
        adapter_id: AdapterId,
        /// The rejected caller.
        caller: Principal,
    },

    /// The referenced adapter is not registered.
    #[error("unknown adapter: {0}")]
    UnknownAdapter(AdapterId),

    /// Attempted to post a rate quote to a strategy with a fixed rate.
    #[error("adapter {0} uses a static strategy; rates cannot be posted")]
    StaticStrategy(AdapterId),
}

// ---------------------------------------------------------------------------
// Accrual formula
// ---------------------------------------------------------------------------

/// The strategy contract: pure accrual over an elapsed interval.
///
/// Implementations must be monotone non-decreasing in `elapsed_blocks`
/// for a fixed balance, and must return 0 when `elapsed_blocks == 0` —
/// that zero is what makes harvesting idempotent within a single height.
pub trait YieldFormula {
    /// Returns the yield accrued on `principal_balance` over
    /// `elapsed_blocks`, in smallest units.
    fn accrue(&self, principal_balance: u64, elapsed_blocks: u64) -> u64;
}

/// Linear pro-rata accrual: `balance * rate_bps * elapsed / (10_000 * blocks_per_year)`.
///
/// Computed in `u128` so the product cannot wrap; floor division.
fn linear_accrual(principal_balance: u64, rate_bps: u32, elapsed_blocks: u64) -> u64 {
    let numerator =
        u128::from(principal_balance) * u128::from(rate_bps) * u128::from(elapsed_blocks);
    let denominator = u128::from(BPS_DENOMINATOR) * u128::from(BLOCKS_PER_YEAR);
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Constant annual rate, accrued pro rata per elapsed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedApy {
    /// Annual rate in basis points (500 = 5.00% APY).
    pub apy_bps: u32,
}

impl YieldFormula for FixedApy {
    fn accrue(&self, principal_balance: u64, elapsed_blocks: u64) -> u64 {
        linear_accrual(principal_balance, self.apy_bps, elapsed_blocks)
    }
}

/// A strategy whose rate is quoted by an external yield venue.
///
/// The quoted rate is cached here and refreshed by [`ExternalVenue::rate_bps`]
/// consumers through [`YieldAdapter::post_rate`]; the accrual itself stays
/// pure over the cached quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVenue {
    /// Human-readable identifier of the venue (e.g. `"granite"`).
    pub venue: String,
    /// Most recently posted annual rate, in basis points.
    pub rate_bps: u32,
}

impl YieldFormula for ExternalVenue {
    fn accrue(&self, principal_balance: u64, elapsed_blocks: u64) -> u64 {
        linear_accrual(principal_balance, self.rate_bps, elapsed_blocks)
    }
}

/// Tagged set of concrete strategies. Serializable so adapter state can
/// live in storage and on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// Fixed annual rate.
    FixedApy(FixedApy),
    /// External-venue quoted rate.
    ExternalVenue(ExternalVenue),
}

impl YieldFormula for Strategy {
    fn accrue(&self, principal_balance: u64, elapsed_blocks: u64) -> u64 {
        match self {
            Strategy::FixedApy(s) => s.accrue(principal_balance, elapsed_blocks),
            Strategy::ExternalVenue(s) => s.accrue(principal_balance, elapsed_blocks),
        }
    }
}

// ---------------------------------------------------------------------------
// YieldAdapter
// ---------------------------------------------------------------------------

/// A registered strategy instance with its access-control state.
///
/// The operator manages the authorized-caller set; only authorized callers
/// may accrue on behalf of a vault or post external rate quotes. The vault
/// engine's escrow principal is granted automatically at registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YieldAdapter {
    /// The adapter's identifier (its contract principal).
    pub id: AdapterId,
    /// Principal allowed to manage the authorized-caller set.
    operator: Principal,
    /// Principals allowed to invoke privileged entry points.
    authorized_callers: BTreeSet<Principal>,
    /// The accrual strategy.
    strategy: Strategy,
}

impl YieldAdapter {
    /// Creates an adapter with an empty authorized-caller set.
    pub fn new(id: &str, operator: &str, strategy: Strategy) -> Self {
        Self {
            id: id.to_string(),
            operator: operator.to_string(),
            authorized_callers: BTreeSet::new(),
            strategy,
        }
    }

    /// Returns the adapter's strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Adds a principal to the authorized-caller set. Operator-only;
    /// idempotent. Returns `true` if the caller was newly added.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unauthorized`] unless `caller` is the
    /// adapter's operator.
    pub fn set_authorized_caller(
        &mut self,
        caller: &str,
        grantee: &str,
    ) -> Result<bool, AdapterError> {
        if caller != self.operator {
            return Err(AdapterError::Unauthorized {
                adapter_id: self.id.clone(),
                caller: caller.to_string(),
            });
        }
        Ok(self.authorized_callers.insert(grantee.to_string()))
    }

    /// Internal wiring hook: grants caller status without the operator
    /// check. Used by the registry when an adapter is registered, so the
    /// vault engine can accrue against it.
    pub(crate) fn grant_caller(&mut self, grantee: &str) {
        self.authorized_callers.insert(grantee.to_string());
    }

    /// Returns `true` if `caller` may invoke privileged entry points.
    pub fn is_authorized(&self, caller: &str) -> bool {
        self.authorized_callers.contains(caller)
    }

    /// Accrues yield on behalf of a vault. Authorized callers only.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unauthorized`] if `caller` is not in the
    /// authorized set.
    pub fn accrue_for(
        &self,
        caller: &str,
        principal_balance: u64,
        elapsed_blocks: u64,
    ) -> Result<u64, AdapterError> {
        if !self.is_authorized(caller) {
            return Err(AdapterError::Unauthorized {
                adapter_id: self.id.clone(),
                caller: caller.to_string(),
            });
        }
        Ok(self.strategy.accrue(principal_balance, elapsed_blocks))
    }

    /// Posts a fresh rate quote from the external venue. Authorized
    /// callers only; rejected for fixed-rate strategies.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unauthorized`] for callers outside the
    /// authorized set, and [`AdapterError::StaticStrategy`] when the
    /// strategy has no postable rate.
    pub fn post_rate(&mut self, caller: &str, rate_bps: u32) -> Result<(), AdapterError> {
        if !self.is_authorized(caller) {
            return Err(AdapterError::Unauthorized {
                adapter_id: self.id.clone(),
                caller: caller.to_string(),
            });
        }
        match &mut self.strategy {
            Strategy::ExternalVenue(venue) => {
                venue.rate_bps = rate_bps;
                Ok(())
            }
            Strategy::FixedApy(_) => Err(AdapterError::StaticStrategy(self.id.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// AdapterRegistry
// ---------------------------------------------------------------------------

/// The set of registered adapters plus the approved allowlist.
///
/// Registration stores the adapter instance; approval (a separate,
/// admin-gated step at the factory) marks it usable for new vaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdapterRegistry {
    adapters: BTreeMap<AdapterId, YieldAdapter>,
    approved: BTreeSet<AdapterId>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an adapter instance, replacing any previous registration
    /// under the same id.
    pub fn register(&mut self, adapter: YieldAdapter) {
        self.adapters.insert(adapter.id.clone(), adapter);
    }

    /// Marks an adapter approved for new vaults. Idempotent; returns
    /// `true` if newly approved.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownAdapter`] if no adapter is
    /// registered under `id`.
    pub fn approve(&mut self, id: &str) -> Result<bool, AdapterError> {
        if !self.adapters.contains_key(id) {
            return Err(AdapterError::UnknownAdapter(id.to_string()));
        }
        Ok(self.approved.insert(id.to_string()))
    }

    /// Returns `true` if `id` is in the approved set.
    pub fn is_approved(&self, id: &str) -> bool {
        self.approved.contains(id)
    }

    /// Looks up a registered adapter.
    pub fn get(&self, id: &str) -> Option<&YieldAdapter> {
        self.adapters.get(id)
    }

    /// Looks up a registered adapter mutably (rate posts, caller grants).
    pub fn get_mut(&mut self, id: &str) -> Option<&mut YieldAdapter> {
        self.adapters.get_mut(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
