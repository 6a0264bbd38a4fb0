//! # Error Taxonomy
//!
//! Every entry point of the vault engine returns `Result<_, VaultError>`.
//! There are no partial commits: a returned error means no balance moved
//! and no record changed.
//!
//! Each error kind carries a stable numeric rejection code in the style
//! of the on-chain contract it mirrors (`u400` invalid-amount, `u403`
//! unauthorized, `u405` still-locked, ...). The RPC layer surfaces the
//! code so a client can distinguish "retry after unlock" from "fix your
//! input" from "wrong wallet" without string matching.

use thiserror::Error;

use crate::adapter::{AdapterError, AdapterId};
use crate::asset::{AssetError, Principal};
use crate::timelock::{BlockHeight, TimeLockError};
use crate::vault::VaultId;

/// Errors that can occur across the vault engine's entry points.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Zero (or otherwise meaningless) amount.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// Zero-block lock duration or unknown preset label.
    #[error("invalid lock duration")]
    InvalidDuration,

    /// The requested amount exceeds the vault balance.
    #[error("insufficient funds: vault {vault_id} holds {available}, requested {requested}")]
    InsufficientFunds {
        /// The vault that was debited.
        vault_id: VaultId,
        /// Balance at the time of the attempt.
        available: u64,
        /// Amount that was requested.
        requested: u64,
    },

    /// The caller is not the owner (or lacks the delegated right).
    #[error("unauthorized: caller {caller}")]
    Unauthorized {
        /// The rejected caller.
        caller: Principal,
    },

    /// No vault exists under this id.
    #[error("vault not found: {0}")]
    NotFound(VaultId),

    /// Penalty-free withdrawal attempted before the unlock height.
    #[error("vault {vault_id} is still locked until height {unlock_height} (now {now})")]
    StillLocked {
        /// The locked vault.
        vault_id: VaultId,
        /// Height at which the lock opens.
        unlock_height: BlockHeight,
        /// The current height.
        now: BlockHeight,
    },

    /// Renewal attempted on a vault without the perpetual flag.
    #[error("vault {0} is not perpetual")]
    NotPerpetual(VaultId),

    /// The requested yield strategy is not on the approved allowlist.
    #[error("adapter not approved: {0}")]
    AdapterNotApproved(AdapterId),

    /// Lock arithmetic exceeded the clock's representable range.
    #[error("duration overflow: {now} + {duration_blocks} exceeds the clock range")]
    DurationOverflow {
        /// The current height.
        now: BlockHeight,
        /// The requested lock duration.
        duration_blocks: u64,
    },

    /// Operation on a closed (terminal) vault.
    #[error("vault {0} is closed")]
    VaultClosed(VaultId),

    /// Second close on an already-closed vault.
    #[error("vault {0} is already closed")]
    AlreadyClosed(VaultId),

    /// Penalty path used after the lock already expired; use `withdraw`.
    #[error("vault {vault_id} unlocked at height {unlock_height} (now {now}); use withdraw")]
    LockExpired {
        /// The unlocked vault.
        vault_id: VaultId,
        /// Height at which the lock opened.
        unlock_height: BlockHeight,
        /// The current height.
        now: BlockHeight,
    },

    /// Value-moving operation attempted while the protocol is paused.
    #[error("protocol is paused")]
    Paused,

    /// Rescue attempted while the protocol is live; pause first.
    #[error("rescue requires the protocol to be paused")]
    NotPaused,

    /// Close attempted while the vault still holds a balance.
    #[error("vault {vault_id} still holds {balance}; withdraw to zero before closing")]
    VaultNotEmpty {
        /// The vault that refused to close.
        vault_id: VaultId,
        /// Its remaining balance.
        balance: u64,
    },

    /// Balance arithmetic would wrap.
    #[error("balance overflow")]
    Overflow,

    /// An asset-ledger operation failed.
    #[error("asset ledger: {0}")]
    Asset(#[from] AssetError),

    /// A yield-adapter operation failed.
    #[error("yield adapter: {0}")]
    Adapter(#[from] AdapterError),
}

impl From<TimeLockError> for VaultError {
    fn from(err: TimeLockError) -> Self {
        match err {
            TimeLockError::DurationOverflow {
                now,
                duration_blocks,
            } => VaultError::DurationOverflow {
                now,
                duration_blocks,
            },
            TimeLockError::InvalidDuration => VaultError::InvalidDuration,
            TimeLockError::UnauthorizedCaller(caller) => VaultError::Unauthorized { caller },
        }
    }
}

impl VaultError {
    /// Stable numeric rejection code surfaced over RPC.
    pub fn code(&self) -> u16 {
        match self {
            VaultError::InvalidAmount => 400,
            VaultError::InvalidDuration => 401,
            VaultError::InsufficientFunds { .. } => 402,
            VaultError::Unauthorized { .. } => 403,
            VaultError::NotFound(_) => 404,
            VaultError::StillLocked { .. } => 405,
            VaultError::NotPerpetual(_) => 406,
            VaultError::AdapterNotApproved(_) => 407,
            VaultError::DurationOverflow { .. } => 408,
            VaultError::VaultClosed(_) => 409,
            VaultError::AlreadyClosed(_) => 410,
            VaultError::LockExpired { .. } => 411,
            VaultError::Paused => 412,
            VaultError::NotPaused => 413,
            VaultError::VaultNotEmpty { .. } => 414,
            VaultError::Overflow => 415,
            VaultError::Asset(AssetError::InsufficientFunds { .. }) => 402,
            VaultError::Asset(AssetError::Overflow { .. }) => 415,
            VaultError::Adapter(AdapterError::Unauthorized { .. }) => 403,
            VaultError::Adapter(AdapterError::UnknownAdapter(_)) => 407,
            VaultError::Adapter(AdapterError::StaticStrategy(_)) => 416,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_facing_codes_are_stable() {
        // These three are the codes external clients are known to match on.
        assert_eq!(VaultError::InvalidAmount.code(), 400);
        assert_eq!(
            VaultError::Unauthorized {
                caller: "ember:mallory".into()
            }
            .code(),
            403
        );
        assert_eq!(
            VaultError::StillLocked {
                vault_id: 1,
                unlock_height: 4_320,
                now: 10
            }
            .code(),
            405
        );
    }

    #[test]
    fn wrapped_asset_errors_share_the_funds_code() {
        let err: VaultError = AssetError::InsufficientFunds {
            asset: "eBTC".into(),
            principal: "ember:alice".into(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.code(), 402);
    }

    #[test]
    fn timelock_errors_convert() {
        let err: VaultError = TimeLockError::DurationOverflow {
            now: u64::MAX,
            duration_blocks: 1,
        }
        .into();
        assert!(matches!(err, VaultError::DurationOverflow { .. }));
        assert_eq!(err.code(), 408);
    }
}
