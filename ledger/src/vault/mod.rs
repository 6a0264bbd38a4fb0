//! # Vault Module — Records & the Ledger State Machine
//!
//! This is where the savings vault actually lives. If the asset ledger is
//! the circulatory system, the vault ledger is the heart — every deposit,
//! withdrawal, penalty, and harvest passes through it, and it is the only
//! component allowed to move escrowed funds.
//!
//! ```text
//! record.rs — the Vault record: lock fields, status machine, yield bookkeeping
//! ledger.rs — the VaultLedger: create/deposit/withdraw/early-withdraw/
//!             harvest/compound/renew/close, plus pause & rescue
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** No floating
//!    point, no decimals in arithmetic.
//! 2. **The clock arrives with the call.** Every entry point takes
//!    `now: BlockHeight`; nothing in here polls or sleeps.
//! 3. **Validation precedes mutation.** An error return means the vault
//!    set, the asset ledger, and the event log are all untouched.
//! 4. **Closed is terminal.** Records are never deleted — a closed vault
//!    stays on the books for audit.

pub mod ledger;
pub mod record;

pub use ledger::{
    EarlyWithdrawal, PenaltyDisposition, VaultConfig, VaultLedger,
};
pub use record::{Vault, VaultId, VaultStatus};
