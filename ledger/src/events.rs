//! # Event Log
//!
//! Every value-moving vault operation appends one structured event to an
//! in-order log. External indexers (and the node's activity feed) consume
//! this log; the ledger itself never reads it back.
//!
//! Events are append-only and never rewritten — a failed operation emits
//! nothing, a committed one emits exactly one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timelock::BlockHeight;
use crate::vault::VaultId;

/// What happened to the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Vault created with its initial deposit.
    Created,
    /// Additional funds deposited.
    Deposit,
    /// Penalty-free withdrawal after unlock.
    Withdrawal,
    /// Early withdrawal; the `penalty` field carries the amount retained.
    Penalty,
    /// Accrued yield paid out to the harvester.
    Harvest,
    /// Accrued yield folded back into the vault balance.
    Compound,
    /// Perpetual vault re-armed for another lock period.
    Renewal,
}

impl EventKind {
    /// Feed label, matching the activity types external clients display.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Created => "Created",
            EventKind::Deposit => "Deposit",
            EventKind::Withdrawal => "Withdrawal",
            EventKind::Penalty => "Penalty",
            EventKind::Harvest => "Harvest",
            EventKind::Compound => "Compound",
            EventKind::Renewal => "Renewal",
        }
    }
}

/// A single committed vault operation, as seen by indexers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultEvent {
    /// Unique event id, for indexer idempotency.
    pub event_id: Uuid,
    /// The vault the event belongs to.
    pub vault_id: VaultId,
    /// What happened.
    pub kind: EventKind,
    /// Principal amount moved (deposited, withdrawn, harvested, re-locked).
    pub amount: u64,
    /// Penalty retained, present only on early withdrawals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty: Option<u64>,
    /// Height at which the operation committed.
    pub block_height: BlockHeight,
    /// Wall-clock timestamp, for audit display only.
    pub recorded_at: DateTime<Utc>,
}

/// The append-only event log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<VaultEvent>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns a reference to it.
    pub(crate) fn record(
        &mut self,
        vault_id: VaultId,
        kind: EventKind,
        amount: u64,
        penalty: Option<u64>,
        block_height: BlockHeight,
    ) -> &VaultEvent {
        self.events.push(VaultEvent {
            event_id: Uuid::new_v4(),
            vault_id,
            kind,
            amount,
            penalty,
            block_height,
            recorded_at: Utc::now(),
        });
        self.events.last().expect("event pushed above")
    }

    /// All events in commit order.
    pub fn all(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Events for a single vault, in commit order.
    pub fn for_vault(&self, vault_id: VaultId) -> Vec<&VaultEvent> {
        self.events
            .iter()
            .filter(|event| event.vault_id == vault_id)
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_commit_order() {
        let mut log = EventLog::new();
        log.record(1, EventKind::Created, 1_000, None, 10);
        log.record(1, EventKind::Deposit, 500, None, 12);
        log.record(2, EventKind::Created, 2_000, None, 13);

        let kinds: Vec<EventKind> = log.all().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Created, EventKind::Deposit, EventKind::Created]
        );
    }

    #[test]
    fn for_vault_filters_by_id() {
        let mut log = EventLog::new();
        log.record(1, EventKind::Created, 1_000, None, 10);
        log.record(2, EventKind::Created, 2_000, None, 11);
        log.record(1, EventKind::Withdrawal, 300, None, 20);

        let vault_1 = log.for_vault(1);
        assert_eq!(vault_1.len(), 2);
        assert!(vault_1.iter().all(|e| e.vault_id == 1));
    }

    #[test]
    fn penalty_field_round_trips_only_when_present() {
        let mut log = EventLog::new();
        log.record(1, EventKind::Penalty, 50_000, Some(500), 15);
        log.record(1, EventKind::Deposit, 1_000, None, 16);

        let json = serde_json::to_string(log.all()).expect("serialize");
        assert!(json.contains("\"penalty\":500"));

        let recovered: Vec<VaultEvent> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered[0].penalty, Some(500));
        assert_eq!(recovered[1].penalty, None);
    }

    #[test]
    fn event_ids_are_unique() {
        let mut log = EventLog::new();
        log.record(1, EventKind::Created, 1, None, 1);
        log.record(1, EventKind::Deposit, 1, None, 1);
        assert_ne!(log.all()[0].event_id, log.all()[1].event_id);
    }
}
