//! # Protocol Configuration & Constants
//!
//! Every magic number in EMBER lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! The block cadence and lock presets are consensus-relevant: a vault
//! created with the `"30d"` preset must unlock at exactly the same height
//! everywhere, so changing these after launch means changing what "30 days"
//! means for every open vault. Choose wisely during devnet.

// ---------------------------------------------------------------------------
// Block Cadence
// ---------------------------------------------------------------------------

/// Target block time. Ten minutes — the cadence of the settlement layer
/// the vault asset is anchored to.
pub const BLOCK_TIME_MS: u64 = 600_000;

/// Blocks per day at the target cadence. 24h * 6 blocks/hour.
pub const BLOCKS_PER_DAY: u64 = 144;

/// Blocks per (non-leap) year. Used as the denominator of the pro-rata
/// APY accrual formula. Keep in sync with [`BLOCKS_PER_DAY`].
pub const BLOCKS_PER_YEAR: u64 = BLOCKS_PER_DAY * 365;

// ---------------------------------------------------------------------------
// Lock Presets
// ---------------------------------------------------------------------------

/// 7-day lock: 1,008 blocks.
pub const LOCK_7_DAYS: u64 = 7 * BLOCKS_PER_DAY;

/// 30-day lock: 4,320 blocks.
pub const LOCK_30_DAYS: u64 = 30 * BLOCKS_PER_DAY;

/// 90-day lock: 12,960 blocks.
pub const LOCK_90_DAYS: u64 = 90 * BLOCKS_PER_DAY;

/// 180-day lock: 25,920 blocks.
pub const LOCK_180_DAYS: u64 = 180 * BLOCKS_PER_DAY;

/// Resolves a lock-preset label to its duration in blocks.
///
/// Returns `None` for unrecognized labels — we don't guess.
pub fn preset_duration_blocks(label: &str) -> Option<u64> {
    match label {
        "7d" => Some(LOCK_7_DAYS),
        "30d" => Some(LOCK_30_DAYS),
        "90d" => Some(LOCK_90_DAYS),
        "180d" => Some(LOCK_180_DAYS),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Penalty & Yield Parameters
// ---------------------------------------------------------------------------

/// Early-withdrawal penalty rate in basis points. 100 bps = 1.00% of the
/// withdrawn amount, deducted before payout.
pub const PENALTY_RATE_BPS: u32 = 100;

/// Basis-point denominator. 1 bp = 0.01%, so 10,000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default annual yield rate for the reference fixed-APY strategy.
/// 500 bps = 5.00% APY, accrued pro rata per elapsed block.
pub const DEFAULT_APY_BPS: u32 = 500;

// ---------------------------------------------------------------------------
// Asset & Principals
// ---------------------------------------------------------------------------

/// Symbol of the primary vault asset. A wrapped-BTC style token with
/// 8 decimals; all balances are denominated in its smallest unit (sats).
pub const PRIMARY_ASSET: &str = "eBTC";

/// Decimal precision of the primary asset. Display only — the ledger
/// never divides.
pub const ASSET_DECIMALS: u8 = 8;

/// Escrow principal that holds all locked vault balances.
pub const VAULT_PRINCIPAL: &str = "ember.vault";

/// Treasury principal that receives collected penalties when the
/// disposition is `Treasury`.
pub const TREASURY_PRINCIPAL: &str = "ember.treasury";

/// Principal under which the factory performs cross-component calls
/// (time-lock queries, adapter accrual).
pub const FACTORY_PRINCIPAL: &str = "ember.vault-factory";

/// Default protocol admin. Overridable through [`crate::vault::VaultConfig`].
pub const DEPLOYER_PRINCIPAL: &str = "ember:deployer";

// ---------------------------------------------------------------------------
// Protocol Version & Ports
// ---------------------------------------------------------------------------

/// Semantic version of the ledger protocol.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Default RPC API port.
pub const DEFAULT_RPC_PORT: u16 = 8620;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 8621;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_labels_resolve_to_documented_blocks() {
        assert_eq!(preset_duration_blocks("7d"), Some(1_008));
        assert_eq!(preset_duration_blocks("30d"), Some(4_320));
        assert_eq!(preset_duration_blocks("90d"), Some(12_960));
        assert_eq!(preset_duration_blocks("180d"), Some(25_920));
    }

    #[test]
    fn unknown_preset_returns_none() {
        assert_eq!(preset_duration_blocks("365d"), None);
        assert_eq!(preset_duration_blocks(""), None);
        assert_eq!(preset_duration_blocks("30"), None);
    }

    #[test]
    fn cadence_constants_sanity() {
        // 144 ten-minute blocks is exactly one day. If this fails, someone
        // changed one constant without the other.
        assert_eq!(BLOCKS_PER_DAY * BLOCK_TIME_MS, 86_400_000);
        assert_eq!(BLOCKS_PER_YEAR, 52_560);
    }

    #[test]
    fn penalty_rate_is_a_sane_fraction() {
        assert!(u64::from(PENALTY_RATE_BPS) < BPS_DENOMINATOR);
        assert!(PENALTY_RATE_BPS > 0);
    }

    #[test]
    fn principals_are_distinct() {
        assert_ne!(VAULT_PRINCIPAL, TREASURY_PRINCIPAL);
        assert_ne!(VAULT_PRINCIPAL, FACTORY_PRINCIPAL);
        assert_ne!(TREASURY_PRINCIPAL, FACTORY_PRINCIPAL);
    }
}
