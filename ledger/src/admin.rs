//! # Admin / Safety Module
//!
//! The emergency brake: a pause flag plus the admin set that may pull it.
//! While paused, value-moving vault operations are refused and the
//! rescue-token escape hatch opens (see
//! [`VaultLedger::rescue_token`](crate::vault::VaultLedger::rescue_token)).
//!
//! The admin set is injected through [`VaultConfig`](crate::vault::VaultConfig)
//! at construction — there is no hidden singleton, and every mutating call
//! names the caller it checks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::asset::Principal;
use crate::error::VaultError;

/// Pause flag and admin identities for the vault engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyModule {
    /// Principals allowed to pause, rescue, and manage allowlists.
    admins: BTreeSet<Principal>,
    /// When `true`, value-moving operations are refused and rescue opens.
    paused: bool,
}

impl SafetyModule {
    /// Creates an unpaused module with the given admin set.
    pub fn new(admins: BTreeSet<Principal>) -> Self {
        Self {
            admins,
            paused: false,
        }
    }

    /// Returns `true` if `caller` is an admin.
    pub fn is_admin(&self, caller: &str) -> bool {
        self.admins.contains(caller)
    }

    /// Returns the pause flag.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fails with [`VaultError::Unauthorized`] unless `caller` is an admin.
    pub fn require_admin(&self, caller: &str) -> Result<(), VaultError> {
        if !self.is_admin(caller) {
            return Err(VaultError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    /// Fails with [`VaultError::Paused`] while the pause flag is set.
    pub fn require_active(&self) -> Result<(), VaultError> {
        if self.paused {
            return Err(VaultError::Paused);
        }
        Ok(())
    }

    /// Fails with [`VaultError::NotPaused`] unless the pause flag is set.
    pub fn require_paused(&self) -> Result<(), VaultError> {
        if !self.paused {
            return Err(VaultError::NotPaused);
        }
        Ok(())
    }

    /// Sets the pause flag. Admin-only; idempotent.
    pub fn set_paused(&mut self, caller: &str, paused: bool) -> Result<(), VaultError> {
        self.require_admin(caller)?;
        if self.paused != paused {
            tracing::warn!(paused, admin = caller, "pause flag changed");
        }
        self.paused = paused;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> SafetyModule {
        let mut admins = BTreeSet::new();
        admins.insert("ember:deployer".to_string());
        SafetyModule::new(admins)
    }

    #[test]
    fn starts_unpaused() {
        let safety = module();
        assert!(!safety.is_paused());
        assert!(safety.require_active().is_ok());
        assert!(matches!(
            safety.require_paused(),
            Err(VaultError::NotPaused)
        ));
    }

    #[test]
    fn admin_can_toggle_pause() {
        let mut safety = module();
        safety.set_paused("ember:deployer", true).unwrap();
        assert!(safety.is_paused());
        assert!(matches!(safety.require_active(), Err(VaultError::Paused)));
        assert!(safety.require_paused().is_ok());

        safety.set_paused("ember:deployer", false).unwrap();
        assert!(!safety.is_paused());
    }

    #[test]
    fn non_admin_cannot_toggle_pause() {
        let mut safety = module();
        let result = safety.set_paused("ember:mallory", true);
        assert!(matches!(result, Err(VaultError::Unauthorized { .. })));
        assert!(!safety.is_paused());
    }

    #[test]
    fn set_paused_is_idempotent() {
        let mut safety = module();
        safety.set_paused("ember:deployer", true).unwrap();
        safety.set_paused("ember:deployer", true).unwrap();
        assert!(safety.is_paused());
    }
}
