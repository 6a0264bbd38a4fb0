// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # EMBER Ledger — Core Library
//!
//! EMBER is a time-locked savings vault: deposit a fungible asset, pick a
//! lock duration measured in block heights, and either wait out the lock for
//! a penalty-free withdrawal or exit early and pay for the privilege. Vaults
//! can accrue yield through a pluggable strategy, compound it back into the
//! locked balance, and — for the patient — renew themselves forever.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual components of the
//! vault system:
//!
//! - **asset** — Fungible balances per principal. The money itself.
//! - **timelock** — Unlock-height arithmetic and the caller allowlist.
//! - **adapter** — Yield strategies: fixed APY and external-venue backed.
//! - **vault** — The vault record and the ledger state machine. The core.
//! - **registry** — Vault factory: id assignment, owner index, adapter allowlist.
//! - **admin** — Pause flag and the rescue-token escape hatch.
//! - **events** — Append-only event log consumed by indexers.
//! - **error** — The full rejection taxonomy with stable numeric codes.
//! - **config** — Protocol constants and network parameters.
//!
//! ## Design Philosophy
//!
//! 1. All monetary operations check for overflow — `checked_add` and
//!    `checked_sub` everywhere, because wrapping arithmetic and money do
//!    not mix.
//! 2. Validation precedes mutation. An `Err` return means no state changed.
//! 3. State transitions are explicit: enum variants, not boolean flags.
//! 4. The logical clock is a block height supplied by the host at call
//!    time. There is no background timer anywhere in this crate.
//! 5. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod admin;
pub mod adapter;
pub mod asset;
pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod timelock;
pub mod vault;

pub use adapter::{
    AdapterError, AdapterId, AdapterRegistry, ExternalVenue, FixedApy, Strategy, YieldAdapter,
    YieldFormula,
};
pub use admin::SafetyModule;
pub use asset::{AssetError, AssetId, AssetLedger, Principal};
pub use error::VaultError;
pub use events::{EventKind, EventLog, VaultEvent};
pub use registry::{VaultFactory, VaultView};
pub use timelock::{compute_unlock, BlockHeight, TimeLockAuthority, TimeLockError, UnlockStatus};
pub use vault::{
    EarlyWithdrawal, PenaltyDisposition, Vault, VaultConfig, VaultId, VaultLedger, VaultStatus,
};
