//! # Time-Lock Authority
//!
//! Pure unlock-height arithmetic plus the allowlist that decides which
//! contracts may query lock status on behalf of users.
//!
//! The authority holds no vault state. It answers two questions:
//!
//! 1. Given the current height and a duration, when does the lock expire?
//!    ([`compute_unlock`] — checked arithmetic, because a wrapped unlock
//!    height is a vault that never opens.)
//! 2. Is this caller allowed to ask about someone else's lock?
//!    ([`TimeLockAuthority::unlock_status`] — gated by an append-only
//!    allowlist, so only vetted components can walk the lock book.)

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::Principal;

/// The logical clock unit: a block height on the host chain.
pub type BlockHeight = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during time-lock operations.
#[derive(Debug, Error)]
pub enum TimeLockError {
    /// `now + duration` exceeds the representable clock range.
    #[error("duration overflow: {now} + {duration_blocks} exceeds the clock range")]
    DurationOverflow {
        /// The current height.
        now: BlockHeight,
        /// The requested lock duration.
        duration_blocks: u64,
    },

    /// A zero-block lock is not a lock.
    #[error("lock duration must be at least one block")]
    InvalidDuration,

    /// The caller is not on the authorized-caller allowlist.
    #[error("caller {0} is not authorized to query the time-lock authority")]
    UnauthorizedCaller(Principal),
}

// ---------------------------------------------------------------------------
// Pure arithmetic
// ---------------------------------------------------------------------------

/// Computes the unlock height for a lock starting at `now`.
///
/// # Errors
///
/// Returns [`TimeLockError::InvalidDuration`] for a zero duration and
/// [`TimeLockError::DurationOverflow`] if the sum wraps.
pub fn compute_unlock(
    now: BlockHeight,
    duration_blocks: u64,
) -> Result<BlockHeight, TimeLockError> {
    if duration_blocks == 0 {
        return Err(TimeLockError::InvalidDuration);
    }
    now.checked_add(duration_blocks)
        .ok_or(TimeLockError::DurationOverflow {
            now,
            duration_blocks,
        })
}

/// Lock status snapshot returned by authorized queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockStatus {
    /// `true` once the current height has reached the unlock height.
    pub unlocked: bool,
    /// Blocks left until unlock; 0 once unlocked.
    pub blocks_remaining: u64,
}

// ---------------------------------------------------------------------------
// TimeLockAuthority
// ---------------------------------------------------------------------------

/// The allowlist half of the time-lock component.
///
/// The allowlist is append-only: callers can be added by an admin but
/// never removed, so a component that could read lock status yesterday
/// can read it today. Removal would let an admin silently blind an
/// integration mid-flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeLockAuthority {
    /// Principals allowed to manage the allowlist.
    admins: BTreeSet<Principal>,
    /// Principals allowed to query lock status on behalf of users.
    authorized: BTreeSet<Principal>,
}

impl TimeLockAuthority {
    /// Creates an authority with the given admin set and an empty allowlist.
    pub fn new(admins: BTreeSet<Principal>) -> Self {
        Self {
            admins,
            authorized: BTreeSet::new(),
        }
    }

    /// Adds a caller to the allowlist. Admin-only; idempotent.
    ///
    /// Returns `true` if the caller was newly added.
    ///
    /// # Errors
    ///
    /// Returns [`TimeLockError::UnauthorizedCaller`] if `admin` is not an
    /// admin of this authority.
    pub fn add_authorized_caller(
        &mut self,
        admin: &str,
        caller: &str,
    ) -> Result<bool, TimeLockError> {
        if !self.admins.contains(admin) {
            return Err(TimeLockError::UnauthorizedCaller(admin.to_string()));
        }
        Ok(self.authorized.insert(caller.to_string()))
    }

    /// Internal wiring hook: grants allowlist membership without an admin
    /// check. Used by the factory to register its own principals at
    /// construction time.
    pub(crate) fn grant(&mut self, caller: &str) {
        self.authorized.insert(caller.to_string());
    }

    /// Returns `true` if `caller` is on the allowlist.
    pub fn is_authorized(&self, caller: &str) -> bool {
        self.authorized.contains(caller)
    }

    /// Reports whether a lock ending at `lock_end_height` is open at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TimeLockError::UnauthorizedCaller`] unless `caller` is on
    /// the allowlist.
    pub fn unlock_status(
        &self,
        caller: &str,
        lock_end_height: BlockHeight,
        now: BlockHeight,
    ) -> Result<UnlockStatus, TimeLockError> {
        if !self.is_authorized(caller) {
            return Err(TimeLockError::UnauthorizedCaller(caller.to_string()));
        }
        Ok(UnlockStatus {
            unlocked: now >= lock_end_height,
            blocks_remaining: lock_end_height.saturating_sub(now),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TimeLockAuthority {
        let mut admins = BTreeSet::new();
        admins.insert("ember:deployer".to_string());
        TimeLockAuthority::new(admins)
    }

    #[test]
    fn compute_unlock_adds_duration() {
        assert_eq!(compute_unlock(100, 1_008).unwrap(), 1_108);
        assert_eq!(compute_unlock(0, 4_320).unwrap(), 4_320);
    }

    #[test]
    fn compute_unlock_zero_duration_rejected() {
        assert!(matches!(
            compute_unlock(100, 0),
            Err(TimeLockError::InvalidDuration)
        ));
    }

    #[test]
    fn compute_unlock_overflow_rejected() {
        let result = compute_unlock(u64::MAX - 10, 100);
        assert!(matches!(
            result,
            Err(TimeLockError::DurationOverflow { .. })
        ));
    }

    #[test]
    fn admin_can_authorize_caller() {
        let mut authority = authority();
        assert!(!authority.is_authorized("ember.vault-factory"));

        let added = authority
            .add_authorized_caller("ember:deployer", "ember.vault-factory")
            .unwrap();
        assert!(added);
        assert!(authority.is_authorized("ember.vault-factory"));

        // Idempotent add.
        let added_again = authority
            .add_authorized_caller("ember:deployer", "ember.vault-factory")
            .unwrap();
        assert!(!added_again);
    }

    #[test]
    fn non_admin_cannot_authorize() {
        let mut authority = authority();
        let result = authority.add_authorized_caller("ember:mallory", "ember:mallory");
        assert!(matches!(
            result,
            Err(TimeLockError::UnauthorizedCaller(_))
        ));
        assert!(!authority.is_authorized("ember:mallory"));
    }

    #[test]
    fn unlock_status_requires_authorization() {
        let authority = authority();
        let result = authority.unlock_status("ember:stranger", 1_000, 500);
        assert!(matches!(
            result,
            Err(TimeLockError::UnauthorizedCaller(_))
        ));
    }

    #[test]
    fn unlock_status_reports_remaining_blocks() {
        let mut authority = authority();
        authority
            .add_authorized_caller("ember:deployer", "ember.vault-factory")
            .unwrap();

        let locked = authority
            .unlock_status("ember.vault-factory", 1_000, 400)
            .unwrap();
        assert!(!locked.unlocked);
        assert_eq!(locked.blocks_remaining, 600);

        let open = authority
            .unlock_status("ember.vault-factory", 1_000, 1_000)
            .unwrap();
        assert!(open.unlocked);
        assert_eq!(open.blocks_remaining, 0);
    }
}
