//! # Pending Set
//!
//! Everything the manager knows about transactions it has submitted but
//! not yet seen finalized.
//!
//! Entries live in an arena keyed by a stable [`PendingId`]. Two indexes
//! sit on top:
//!
//! - **Insertion order**, so resubmission walks entries first-in first-out.
//! - **Hash to id**, covering every hash an entry has ever had. A fee
//!   change re-signs the transaction and changes its hash, and the network
//!   may validate any one of those versions.
//!
//! A bounded [`ReceivedCache`] holds validated transactions that matched
//! nothing when they arrived, in case the submission they belong to shows
//! up afterwards.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use super::types::{LifecycleError, Outcome, TransactionEvent, ValidatedTransaction};
use crate::codec::{Hash256, StObject};

/// Stable handle to an entry in a [`PendingSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(u64);

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One signed submission of a pending transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Ledger in progress when the request went out.
    pub ledger_index: u32,
    pub hash: Hash256,
    pub fee: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Delivery side of a [`TransactionHandle`](super::manager::TransactionHandle).
#[derive(Debug)]
pub(crate) struct Notifier {
    events: mpsc::UnboundedSender<TransactionEvent>,
    outcome: Option<oneshot::Sender<Outcome>>,
}

impl Notifier {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<TransactionEvent>,
        outcome: oneshot::Sender<Outcome>,
    ) -> Self {
        Self {
            events,
            outcome: Some(outcome),
        }
    }

    /// Emit a non-terminal event. A dropped receiver is not an error.
    pub(crate) fn emit(&self, event: TransactionEvent) {
        let _ = self.events.send(event);
    }

    /// Emit the terminal event and resolve the outcome. Only the first
    /// call has any effect.
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        let Some(sender) = self.outcome.take() else {
            return;
        };
        let event = match &outcome {
            Ok(tx) => TransactionEvent::Success(tx.clone()),
            Err(e) => TransactionEvent::Error(e.clone()),
        };
        let _ = self.events.send(event);
        let _ = sender.send(outcome);
    }
}

/// A submitted transaction awaiting its final result.
#[derive(Debug)]
pub struct PendingTransaction {
    pub fields: StObject,
    pub sequence: u32,
    /// The manager picked the sequence, rather than the caller.
    pub sequence_autofilled: bool,
    pub fee: u64,
    /// Caller set `Fee`; load changes leave it alone.
    pub fixed_fee: bool,
    /// Caller set `LastLedgerSequence`.
    pub fixed_last_ledger: bool,
    pub last_ledger_sequence: Option<u32>,
    pub attempts: u32,
    pub responses: u32,
    pub submit_index: Option<u32>,
    pub initial_submit_index: Option<u32>,
    pub submissions: Vec<Submission>,
    /// Every hash this transaction has had, oldest first.
    pub hashes: Vec<Hash256>,
    pub finalized: bool,
    pub(crate) notifier: Notifier,
}

impl PendingTransaction {
    pub(crate) fn new(fields: StObject, sequence: u32, fee: u64, notifier: Notifier) -> Self {
        Self {
            fields,
            sequence,
            sequence_autofilled: false,
            fee,
            fixed_fee: false,
            fixed_last_ledger: false,
            last_ledger_sequence: None,
            attempts: 0,
            responses: 0,
            submit_index: None,
            initial_submit_index: None,
            submissions: Vec::new(),
            hashes: Vec::new(),
            finalized: false,
            notifier,
        }
    }

    /// Most recent hash, if the transaction has been signed.
    pub fn current_hash(&self) -> Option<Hash256> {
        self.hashes.last().copied()
    }

    pub(crate) fn emit(&self, event: TransactionEvent) {
        self.notifier.emit(event);
    }

    /// Mark finalized and deliver `outcome`.
    pub(crate) fn finalize(&mut self, outcome: Outcome) {
        self.finalized = true;
        self.notifier.finish(outcome);
    }

    pub(crate) fn fail(&mut self, error: LifecycleError) {
        self.finalize(Err(error));
    }
}

/// Arena of pending transactions with order and hash indexes.
#[derive(Debug, Default)]
pub struct PendingSet {
    next_id: u64,
    entries: HashMap<PendingId, PendingTransaction>,
    order: Vec<PendingId>,
    by_hash: HashMap<Hash256, PendingId>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: PendingTransaction) -> PendingId {
        let id = PendingId(self.next_id);
        self.next_id += 1;
        for hash in &tx.hashes {
            self.by_hash.insert(*hash, id);
        }
        self.entries.insert(id, tx);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: PendingId) -> Option<&PendingTransaction> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PendingId) -> Option<&mut PendingTransaction> {
        self.entries.get_mut(&id)
    }

    /// Record a new hash for `id`. Earlier hashes stay indexed.
    pub fn add_hash(&mut self, id: PendingId, hash: Hash256) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if !entry.hashes.contains(&hash) {
            entry.hashes.push(hash);
        }
        self.by_hash.insert(hash, id);
    }

    /// The entry that has ever carried `hash`.
    pub fn find_by_hash(&self, hash: &Hash256) -> Option<PendingId> {
        self.by_hash.get(hash).copied()
    }

    /// Snapshot of ids in submission order.
    pub fn ids(&self) -> Vec<PendingId> {
        self.order.clone()
    }

    /// Entries in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (PendingId, &PendingTransaction)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|tx| (*id, tx)))
    }

    /// Drop `id` and every hash that pointed at it.
    pub fn remove(&mut self, id: PendingId) -> Option<PendingTransaction> {
        let entry = self.entries.remove(&id)?;
        self.order.retain(|other| *other != id);
        for hash in &entry.hashes {
            if self.by_hash.get(hash) == Some(&id) {
                self.by_hash.remove(hash);
            }
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded first-in first-out cache of validated transactions that matched
/// no pending entry.
#[derive(Debug)]
pub struct ReceivedCache {
    capacity: usize,
    order: VecDeque<Hash256>,
    entries: HashMap<Hash256, ValidatedTransaction>,
}

impl ReceivedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Cache `tx`, evicting the oldest entry when full. Re-inserting a
    /// cached hash keeps its original position.
    pub fn insert(&mut self, tx: ValidatedTransaction) {
        if self.capacity == 0 {
            return;
        }
        let hash = tx.hash;
        if self.entries.insert(hash, tx).is_some() {
            return;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn get(&self, hash: &Hash256) -> Option<&ValidatedTransaction> {
        self.entries.get(hash)
    }

    /// First cached transaction matching any of `hashes`.
    pub fn find_any(&self, hashes: &[Hash256]) -> Option<&ValidatedTransaction> {
        hashes.iter().find_map(|hash| self.entries.get(hash))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
