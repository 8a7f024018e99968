//! # Transaction Lifecycle Manager
//!
//! One [`TransactionManager`] owns the outgoing transactions of one
//! account. It fills in sequence numbers and fees, signs, submits, and
//! keeps resubmitting on every ledger close until each transaction either
//! shows up validated or runs out of ledgers.
//!
//! ## Per-transaction states
//!
//! ```text
//! created ─▶ sequenced ─▶ signed ─▶ submitted ─┬─▶ proposed ──┐
//!                                              ├─▶ retry-wait ─┼─▶ finalized
//!                                              ├─▶ errored ────┤
//!                                              └─▶ expired ────┘
//! ```
//!
//! ## Driving it
//!
//! The manager does nothing on its own. Feed it [`NetworkEvent`]s through
//! [`TransactionManager::handle_event`] and submissions through
//! [`TransactionManager::submit`], or move it into a task with
//! [`TransactionManager::spawn`] and talk to it through the returned
//! [`ManagerHandle`]. Either way events are handled one at a time in the
//! order they arrive, and a handler that waits on the transport holds up
//! everything queued behind it.
//!
//! ## Sequence numbers
//!
//! The first submission loads the account's next sequence from the
//! network; an account that does not exist yet starts at 1. Later
//! submissions count up locally. Whenever the local count may be wrong
//! (a malformed rejection, an expiry below the counter, a reconnect) the
//! manager reloads it from the network.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::fees::{connected_fees, LoadPolicy, ServerLoad};
use super::pending::{
    Notifier, PendingId, PendingSet, PendingTransaction, ReceivedCache, Submission,
};
use super::transport::{HistoryRequest, NetworkEvent, Transport, TransportError};
use super::types::{
    continues_series, LifecycleError, Outcome, SubmitResponse, TransactionEvent,
    ValidatedTransaction,
};
use crate::codec::serializer::serialize_for_signing;
use crate::codec::{serialize, signing_hash, transaction_hash, AccountId, Amount, Hash256, StObject};
use crate::config::{
    DEFAULT_FEE_CUSHION, DEFAULT_FEE_UNITS, DEFAULT_HISTORY_PAGE_LIMIT,
    DEFAULT_LAST_LEDGER_OFFSET, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_FEE,
    DEFAULT_RECEIVED_CACHE_SIZE, DEFAULT_RESUBMIT_WAIT_LEDGERS, MAX_NATIVE_DROPS,
    UNFUNDED_ACCOUNT_SEQUENCE,
};
use crate::crypto::KeyPair;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a server answers a submission with "too busy".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Leave it for the next ledger close.
    #[default]
    WaitForLedger,
    /// Submit once more straight away, then wait for the next ledger.
    RetryImmediately,
}

/// Lifecycle tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Fee ceiling in drops. Computed fees are capped here, and
    /// resubmission pauses while the selected server fee is above it.
    /// Values beyond the native currency's total supply act as that
    /// supply.
    pub max_fee: u64,

    /// Cost of a reference transaction in fee units.
    pub fee_units: u64,

    /// Multiplier applied on top of the load-scaled fee.
    pub fee_cushion: f64,

    /// Recompute fees of pending transactions when load changes.
    pub local_fee: bool,

    /// Submissions allowed before a transaction fails with
    /// `tejAttemptsExceeded`.
    pub max_attempts: u32,

    /// `LastLedgerSequence` is the ledger of first submission plus this.
    pub last_ledger_offset: u32,

    /// Ledgers that must close after a submission before it is retried.
    pub resubmit_wait_ledgers: u32,

    /// Validated transactions remembered when they match nothing pending.
    pub received_cache_size: usize,

    /// Page size for history replay after a reconnect.
    pub history_page_limit: u32,

    pub load_policy: LoadPolicy,

    pub busy_policy: BusyPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_fee: DEFAULT_MAX_FEE,
            fee_units: DEFAULT_FEE_UNITS,
            fee_cushion: DEFAULT_FEE_CUSHION,
            local_fee: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_ledger_offset: DEFAULT_LAST_LEDGER_OFFSET,
            resubmit_wait_ledgers: DEFAULT_RESUBMIT_WAIT_LEDGERS,
            received_cache_size: DEFAULT_RECEIVED_CACHE_SIZE,
            history_page_limit: DEFAULT_HISTORY_PAGE_LIMIT,
            load_policy: LoadPolicy::default(),
            busy_policy: BusyPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// The submitter's view of one pending transaction.
#[derive(Debug)]
pub struct TransactionHandle {
    id: PendingId,
    hash: Option<Hash256>,
    events: mpsc::UnboundedReceiver<TransactionEvent>,
    outcome: oneshot::Receiver<Outcome>,
}

impl TransactionHandle {
    pub fn id(&self) -> PendingId {
        self.id
    }

    /// Hash of the first signed submission. `None` when the transaction
    /// was queued before the manager knew a ledger index.
    pub fn initial_hash(&self) -> Option<Hash256> {
        self.hash
    }

    /// Next lifecycle event. `None` once the terminal event has been read
    /// and the manager has let go of the transaction.
    pub async fn next_event(&mut self) -> Option<TransactionEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<TransactionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the terminal result.
    pub async fn outcome(self) -> Outcome {
        self.outcome
            .await
            .unwrap_or(Err(LifecycleError::ManagerClosed))
    }
}

/// Snapshot of the manager's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub account: AccountId,
    pub next_sequence: Option<u32>,
    pub pending: usize,
    pub paused: bool,
    pub last_closed_ledger: Option<u32>,
}

#[derive(Debug)]
enum Input {
    Submit {
        fields: StObject,
        reply: oneshot::Sender<Result<TransactionHandle, LifecycleError>>,
    },
    Event(NetworkEvent),
    Status {
        reply: oneshot::Sender<ManagerStatus>,
    },
    Shutdown,
}

/// Cloneable front end to a spawned manager.
///
/// Submissions and network events share one queue, so the manager sees
/// them in exactly the order they were sent.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    inputs: mpsc::UnboundedSender<Input>,
}

impl ManagerHandle {
    pub async fn submit(&self, fields: StObject) -> Result<TransactionHandle, LifecycleError> {
        let (reply, response) = oneshot::channel();
        self.inputs
            .send(Input::Submit { fields, reply })
            .map_err(|_| LifecycleError::ManagerClosed)?;
        response.await.map_err(|_| LifecycleError::ManagerClosed)?
    }

    /// Queue a network event.
    pub fn notify(&self, event: NetworkEvent) -> Result<(), LifecycleError> {
        self.inputs
            .send(Input::Event(event))
            .map_err(|_| LifecycleError::ManagerClosed)
    }

    pub async fn status(&self) -> Result<ManagerStatus, LifecycleError> {
        let (reply, response) = oneshot::channel();
        self.inputs
            .send(Input::Status { reply })
            .map_err(|_| LifecycleError::ManagerClosed)?;
        response.await.map_err(|_| LifecycleError::ManagerClosed)
    }

    /// Stop after the inputs already queued. Transactions still pending
    /// fail with [`LifecycleError::ManagerClosed`].
    pub fn shutdown(&self) {
        let _ = self.inputs.send(Input::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.inputs.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// How one submit request went.
#[derive(Debug)]
enum Attempt {
    Answered(SubmitResponse),
    /// Server too busy; nothing changed.
    Busy,
    /// Transport unreachable; try again later.
    Deferred,
    /// The transaction was finalized with an error.
    Fatal,
    /// Nothing to submit.
    Skipped,
}

/// Submits and tracks transactions for one account.
pub struct TransactionManager<T> {
    key: KeyPair,
    account: AccountId,
    transport: Arc<T>,
    config: ManagerConfig,
    next_sequence: Option<u32>,
    pending: PendingSet,
    received: ReceivedCache,
    servers: Vec<ServerLoad>,
    paused: bool,
    last_closed_ledger: Option<u32>,
    min_ledger: Option<u32>,
    marker: Option<(u32, u32)>,
    connected: bool,
}

impl<T: Transport + 'static> TransactionManager<T> {
    /// A manager for the account `key` controls. No network calls happen
    /// until the first submission or event.
    pub fn new(key: KeyPair, transport: Arc<T>, config: ManagerConfig) -> Self {
        let account = key.account_id();
        let received = ReceivedCache::new(config.received_cache_size);
        Self {
            key,
            account,
            transport,
            config,
            next_sequence: None,
            pending: PendingSet::new(),
            received,
            servers: Vec::new(),
            paused: false,
            last_closed_ledger: None,
            min_ledger: None,
            marker: None,
            connected: true,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn next_sequence(&self) -> Option<u32> {
        self.next_sequence
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// Whether resubmission is paused because every server is too
    /// expensive.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            account: self.account,
            next_sequence: self.next_sequence,
            pending: self.pending.len(),
            paused: self.paused,
            last_closed_ledger: self.last_closed_ledger,
        }
    }

    // -- Sequence -----------------------------------------------------------

    /// Load the next sequence number from the network.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::SequenceUnavailable`] when the transport fails.
    /// An unknown account is not a failure; it starts at 1.
    pub async fn load_sequence(&mut self) -> Result<u32, LifecycleError> {
        let sequence = match self.transport.account_sequence(&self.account).await {
            Ok(sequence) => sequence,
            Err(TransportError::AccountNotFound) => UNFUNDED_ACCOUNT_SEQUENCE,
            Err(e) => {
                warn!(account = %self.account, error = %e, "failed to load account sequence");
                return Err(LifecycleError::SequenceUnavailable);
            }
        };
        self.next_sequence = Some(sequence);
        info!(account = %self.account, sequence, "account sequence loaded");
        Ok(sequence)
    }

    async fn reload_sequence(&mut self) {
        // Failure is already logged; the old counter stays.
        let _ = self.load_sequence().await;
    }

    // -- Fees ---------------------------------------------------------------

    /// Fee for a new transaction under current load, capped at `max_fee`.
    pub fn current_fee(&self) -> u64 {
        let fees = connected_fees(&self.servers, self.config.fee_units, self.config.fee_cushion);
        let fee = self.config.load_policy.select(&fees).unwrap_or_else(|| {
            (self.config.fee_units as f64 * self.config.fee_cushion).ceil() as u64
        });
        fee.min(self.config.max_fee).min(MAX_NATIVE_DROPS)
    }

    fn load_changed(&mut self, servers: Vec<ServerLoad>) {
        self.servers = servers;
        if self.config.local_fee {
            self.adjust_fees();
        }
        self.update_pause();
    }

    fn adjust_fees(&mut self) {
        let fee = self.current_fee();
        for id in self.pending.ids() {
            let Some(entry) = self.pending.get_mut(id) else {
                continue;
            };
            if entry.fixed_fee || entry.finalized || entry.fee == fee {
                continue;
            }
            let old = entry.fee;
            entry.fee = fee;
            entry.fields.insert("Fee", native_fee(fee));
            entry.emit(TransactionEvent::FeeAdjusted { old, new: fee });
            debug!(pending = %id, old, new = fee, "fee adjusted");
        }
    }

    fn update_pause(&mut self) {
        let fees = connected_fees(&self.servers, self.config.fee_units, self.config.fee_cushion);
        let Some(fee) = self.config.load_policy.select(&fees) else {
            return;
        };
        let paused = fee > self.config.max_fee;
        if paused && !self.paused {
            warn!(fee, max_fee = self.config.max_fee, "server load above fee cap, pausing resubmission");
        } else if !paused && self.paused {
            info!(fee, "server load back under fee cap, resuming resubmission");
        }
        self.paused = paused;
    }

    // -- Submission ---------------------------------------------------------

    /// Queue a transaction and make its first submission.
    ///
    /// `Account`, `Sequence`, `Fee`, `LastLedgerSequence` and
    /// `SigningPubKey` are filled in unless the caller set them; caller
    /// values for `Fee` and `LastLedgerSequence` are never changed.
    ///
    /// Until the manager has seen a ledger index there is nothing to base
    /// `LastLedgerSequence` on, so the transaction is queued unsent and goes
    /// out on the first `LedgerClosed` or `Connected` carrying an index. Its
    /// handle then has no [`TransactionHandle::initial_hash`].
    ///
    /// # Errors
    ///
    /// Returned directly, before anything is queued: an `Account` other
    /// than the manager's, a sequence that cannot be loaded, or fields that
    /// do not serialize. Everything later arrives through the handle.
    pub async fn submit(&mut self, mut fields: StObject) -> Result<TransactionHandle, LifecycleError> {
        if let Some(got) = fields.get_account("Account") {
            if got != self.account {
                return Err(LifecycleError::AccountMismatch {
                    expected: self.account,
                    got,
                });
            }
        }
        fields.insert("Account", self.account);

        if self.next_sequence.is_none() {
            self.load_sequence().await?;
        }
        let next = self.next_sequence.ok_or(LifecycleError::SequenceUnavailable)?;
        let (sequence, autofilled) = match fields.get_u32("Sequence") {
            Some(sequence) => (sequence, false),
            None => (next, true),
        };
        fields.insert("Sequence", sequence);

        let fixed_fee = match fields.get_amount("Fee") {
            Some(Amount::Native(drops)) => Some(u64::try_from(*drops).map_err(|_| {
                crate::codec::CodecError::InvalidValue(format!("negative fee {drops}"))
            })?),
            Some(Amount::Issued(_)) => {
                return Err(crate::codec::CodecError::InvalidValue(
                    "fee must be a native amount".into(),
                )
                .into())
            }
            None => None,
        };
        let fee = fixed_fee.unwrap_or_else(|| self.current_fee());
        fields.insert("Fee", native_fee(fee));
        let fixed_last_ledger = fields.get_u32("LastLedgerSequence");
        fields.insert("SigningPubKey", self.key.public_key().to_vec());

        // Reject incomplete or ill-typed fields before taking the sequence.
        serialize_for_signing(&fields)?;
        if autofilled {
            self.next_sequence = Some(next + 1);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let mut entry =
            PendingTransaction::new(fields, sequence, fee, Notifier::new(events_tx, outcome_tx));
        entry.sequence_autofilled = autofilled;
        entry.fixed_fee = fixed_fee.is_some();
        entry.fixed_last_ledger = fixed_last_ledger.is_some();
        entry.last_ledger_sequence = fixed_last_ledger;
        let id = self.pending.push(entry);
        info!(account = %self.account, pending = %id, sequence, fee, "transaction queued");

        self.submit_with_policy(id).await;

        let hash = self
            .pending
            .get(id)
            .and_then(|entry| entry.hashes.first().copied());
        Ok(TransactionHandle {
            id,
            hash,
            events: events_rx,
            outcome: outcome_rx,
        })
    }

    async fn submit_with_policy(&mut self, id: PendingId) -> Attempt {
        let attempt = self.request(id).await;
        match (attempt, self.config.busy_policy) {
            (Attempt::Busy, BusyPolicy::RetryImmediately) => {
                debug!(pending = %id, "server busy, retrying immediately");
                self.request(id).await
            }
            (attempt, _) => attempt,
        }
    }

    /// Sign and send one submit request for `id`, then classify the answer.
    async fn request(&mut self, id: PendingId) -> Attempt {
        let Some(ledger) = self.current_ledger() else {
            debug!(pending = %id, "no ledger index yet, holding transaction");
            return Attempt::Deferred;
        };
        let offset = self.config.last_ledger_offset;
        let max_attempts = self.config.max_attempts;

        let Some(entry) = self.pending.get_mut(id) else {
            return Attempt::Skipped;
        };
        if entry.finalized {
            return Attempt::Skipped;
        }
        if entry.attempts > max_attempts {
            let attempts = entry.attempts;
            warn!(pending = %id, attempts, "giving up on transaction");
            self.finish(id, Err(LifecycleError::AttemptsExceeded(attempts)));
            self.reload_sequence().await;
            return Attempt::Fatal;
        }

        entry.submit_index = Some(ledger);
        let initial = *entry.initial_submit_index.get_or_insert(ledger);
        if !entry.fixed_last_ledger {
            let last_ledger = initial + offset;
            entry.last_ledger_sequence = Some(last_ledger);
            entry.fields.insert("LastLedgerSequence", last_ledger);
        }

        let (blob, hash) = match sign_fields(&self.key, &mut entry.fields) {
            Ok(signed) => signed,
            Err(e) => {
                self.finish(id, Err(e));
                return Attempt::Fatal;
            }
        };
        entry.attempts += 1;
        entry.submissions.push(Submission {
            ledger_index: ledger,
            hash,
            fee: entry.fee,
            submitted_at: chrono::Utc::now(),
        });
        let attempt = entry.attempts;
        self.pending.add_hash(id, hash);
        info!(account = %self.account, pending = %id, %hash, attempt, ledger, "transaction submitted");

        let result = self.transport.submit(&blob).await;
        self.handle_response(id, attempt, result).await
    }

    async fn handle_response(
        &mut self,
        id: PendingId,
        attempt: u32,
        result: Result<SubmitResponse, TransportError>,
    ) -> Attempt {
        let response = match result {
            Ok(response) => response,
            Err(TransportError::TooBusy) => {
                debug!(pending = %id, "server too busy");
                return Attempt::Busy;
            }
            Err(TransportError::Disconnected) => {
                warn!(pending = %id, "transport disconnected, will retry");
                return Attempt::Deferred;
            }
            Err(e) => {
                warn!(pending = %id, error = %e, "submission failed");
                self.finish(id, Err(LifecycleError::Transport(e.to_string())));
                self.reload_sequence().await;
                return Attempt::Fatal;
            }
        };

        if let Some(hash) = response.tx_hash {
            self.pending.add_hash(id, hash);
        }
        let Some(entry) = self.pending.get_mut(id) else {
            return Attempt::Skipped;
        };
        entry.responses += 1;
        entry.emit(if attempt > 1 {
            TransactionEvent::Resubmitted(response.clone())
        } else {
            TransactionEvent::Submitted(response.clone())
        });
        debug!(pending = %id, result = %response.engine_result, "submit response");

        let class = response.class();
        if class.is_proposed() {
            entry.emit(TransactionEvent::Proposed(response.clone()));
        } else if !class.is_tolerated() {
            self.finish(id, Err(LifecycleError::from_response(&response)));
            self.reload_sequence().await;
        }
        Attempt::Answered(response)
    }

    /// Ledger now in progress, once one has closed.
    fn current_ledger(&self) -> Option<u32> {
        self.last_closed_ledger.map(|closed| closed.saturating_add(1))
    }

    // -- Finalization -------------------------------------------------------

    /// Drop `id` from tracking and deliver its outcome.
    fn finish(&mut self, id: PendingId, outcome: Outcome) {
        let Some(mut entry) = self.pending.remove(id) else {
            return;
        };
        match &outcome {
            Ok(tx) => info!(account = %self.account, pending = %id, hash = %tx.hash, "transaction finalized"),
            Err(e) => info!(account = %self.account, pending = %id, error = %e, "transaction failed"),
        }
        entry.finalize(outcome);
    }

    fn settle(&mut self, id: PendingId, tx: ValidatedTransaction) {
        if tx.succeeded() {
            self.finish(id, Ok(tx));
        } else {
            let error = LifecycleError::from_validated(&tx);
            self.finish(id, Err(error));
        }
    }

    // -- Events -------------------------------------------------------------

    /// React to one network event.
    pub async fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::LedgerClosed {
                ledger_index,
                servers,
            } => self.ledger_closed(ledger_index, servers).await,
            NetworkEvent::LoadChanged(servers) => self.load_changed(servers),
            NetworkEvent::AccountTransaction(tx) => {
                if self.accept_stream_transaction(&tx) {
                    self.transaction_received(tx);
                }
            }
            NetworkEvent::Connected { ledger_index } => self.connected(ledger_index).await,
            NetworkEvent::Disconnected => {
                debug!(account = %self.account, "disconnected");
                self.connected = false;
            }
        }
    }

    async fn ledger_closed(&mut self, ledger_index: u32, servers: Vec<ServerLoad>) {
        if !self.connected {
            return;
        }
        if self.min_ledger.is_some_and(|min| ledger_index <= min) {
            return;
        }
        self.min_ledger = Some(ledger_index);
        debug!(ledger_index, pending = self.pending.len(), "ledger closed");

        if !servers.is_empty() {
            self.load_changed(servers);
        }
        self.expire(ledger_index).await;
        self.last_closed_ledger = Some(ledger_index);
        if !self.paused && !self.pending.is_empty() {
            self.resubmit().await;
        }
    }

    /// Fail everything whose `LastLedgerSequence` is behind `ledger_index`.
    async fn expire(&mut self, ledger_index: u32) {
        let mut reload = false;
        for id in self.pending.ids() {
            let Some(entry) = self.pending.get(id) else {
                continue;
            };
            let Some(last_ledger_sequence) = entry.last_ledger_sequence else {
                continue;
            };
            if entry.finalized || ledger_index <= last_ledger_sequence {
                continue;
            }
            let sequence = entry.sequence;
            self.finish(
                id,
                Err(LifecycleError::MaxLedgerExceeded {
                    last_ledger_sequence,
                    ledger_index,
                }),
            );
            if self.next_sequence.is_some_and(|next| sequence < next) {
                reload = true;
            }
        }
        if reload {
            self.reload_sequence().await;
        }
    }

    /// Resubmit pending transactions in submission order.
    ///
    /// Entries submitted too recently are passed over. An entry whose hash
    /// was already seen validated is settled instead of resubmitted. The
    /// series stops at the first answer that is not success-like.
    async fn resubmit(&mut self) {
        let Some(last_closed) = self.last_closed_ledger else {
            return;
        };
        let wait = self.config.resubmit_wait_ledgers;
        for id in self.pending.ids() {
            let Some(entry) = self.pending.get(id) else {
                continue;
            };
            if entry.finalized {
                continue;
            }
            if entry
                .submit_index
                .is_some_and(|index| last_closed <= index.saturating_add(wait))
            {
                continue;
            }
            if let Some(received) = self.received.find_any(&entry.hashes).cloned() {
                self.settle(id, received);
                continue;
            }

            match self.submit_with_policy(id).await {
                Attempt::Answered(response) if continues_series(&response.engine_result) => {}
                Attempt::Skipped => {}
                _ => {
                    debug!(pending = %id, "resubmission series stopped");
                    break;
                }
            }
        }
    }

    /// Stream filter: drop unvalidated transactions and anything older than
    /// the newest already processed.
    fn accept_stream_transaction(&mut self, tx: &ValidatedTransaction) -> bool {
        if !tx.validated {
            return false;
        }
        let marker = tx.marker();
        if self.marker.is_some_and(|newest| marker < newest) {
            return false;
        }
        self.marker = Some(marker);
        self.min_ledger = Some(tx.ledger_index);
        true
    }

    fn transaction_received(&mut self, tx: ValidatedTransaction) {
        if !tx.validated || tx.account != self.account {
            return;
        }
        if let Some(next) = self.next_sequence {
            if next <= tx.sequence {
                self.next_sequence = Some(tx.sequence + 1);
            }
        }
        match self.pending.find_by_hash(&tx.hash) {
            Some(id) => self.settle(id, tx),
            None => {
                debug!(hash = %tx.hash, "caching unmatched validated transaction");
                self.received.insert(tx);
            }
        }
    }

    async fn connected(&mut self, ledger_index: Option<u32>) {
        let reconnect = !self.connected;
        let first_ledger = self.last_closed_ledger.is_none() && ledger_index.is_some();
        self.connected = true;
        if reconnect {
            info!(account = %self.account, "reconnected, replaying account history");
            if let Err(e) = self.replay_history().await {
                warn!(account = %self.account, error = %e, "history replay failed");
            }
        }
        if let Some(index) = ledger_index {
            if self.last_closed_ledger.map_or(true, |closed| index > closed) {
                self.last_closed_ledger = Some(index);
            }
        }
        if reconnect {
            self.reload_sequence().await;
        }
        if (reconnect || first_ledger) && !self.paused && !self.pending.is_empty() {
            self.resubmit().await;
        }
    }

    /// Feed the account history missed while disconnected through the
    /// same path as live transactions.
    async fn replay_history(&mut self) -> Result<(), TransportError> {
        let forward = self.min_ledger.is_some_and(|min| min > 0);
        let mut request = HistoryRequest {
            account: self.account,
            ledger_index_min: self.min_ledger.map_or(-1, i64::from),
            ledger_index_max: -1,
            limit: self.config.history_page_limit,
            forward,
            marker: None,
        };
        loop {
            let mut page = self.transport.account_transactions(&request).await?;
            if !forward {
                page.transactions.sort_by_key(|tx| tx.sequence);
            }
            debug!(count = page.transactions.len(), forward, "replaying history page");
            for tx in page.transactions {
                if self.accept_stream_transaction(&tx) {
                    self.transaction_received(tx);
                }
            }
            match page.marker {
                Some(marker) if forward => request.marker = Some(marker),
                _ => return Ok(()),
            }
        }
    }

    // -- Driver -------------------------------------------------------------

    /// Move the manager into a tokio task.
    ///
    /// The task ends on [`ManagerHandle::shutdown`] or once every handle is
    /// dropped. Transactions still pending then fail with
    /// [`LifecycleError::ManagerClosed`].
    pub fn spawn(self) -> ManagerHandle {
        let (inputs, receiver) = mpsc::unbounded_channel();
        tokio::spawn(self.run(receiver));
        ManagerHandle { inputs }
    }

    async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Input>) {
        info!(account = %self.account, "transaction manager started");
        while let Some(input) = inputs.recv().await {
            match input {
                Input::Submit { fields, reply } => {
                    let result = self.submit(fields).await;
                    let _ = reply.send(result);
                }
                Input::Event(event) => self.handle_event(event).await,
                Input::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                Input::Shutdown => break,
            }
        }
        let remaining = self.pending.len();
        for id in self.pending.ids() {
            if let Some(mut entry) = self.pending.remove(id) {
                entry.fail(LifecycleError::ManagerClosed);
            }
        }
        info!(account = %self.account, remaining, "transaction manager stopped");
    }
}

/// `Fee` field for `fee` drops, saturating at the native supply.
fn native_fee(fee: u64) -> Amount {
    let drops = fee.min(MAX_NATIVE_DROPS);
    Amount::Native(i64::try_from(drops).unwrap_or(i64::MAX))
}

/// Stamp `SigningPubKey` and `TxnSignature` onto `fields`, returning the
/// signed blob and its transaction hash.
///
/// # Errors
///
/// Fields that do not serialize, or a signing failure.
pub fn sign_fields(
    key: &KeyPair,
    fields: &mut StObject,
) -> Result<(Vec<u8>, Hash256), LifecycleError> {
    fields.insert("SigningPubKey", key.public_key().to_vec());
    fields.remove("TxnSignature");
    let hash = signing_hash(fields)?;
    let signature = key.sign(&hash.0)?;
    fields.insert("TxnSignature", signature);
    let blob = serialize(fields)?;
    let id = transaction_hash(fields)?;
    Ok((blob, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::deserialize;
    use crate::transaction::transport::HistoryPage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    const ROOT_SECRET: &str = "1ACAAEDECE405B2A958212629E16F2EB46B153EEE94CDD350FDEFF52795525B7";

    // -----------------------------------------------------------------------
    // Mock transport
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct MockState {
        sequence: Option<Result<u32, TransportError>>,
        responses: VecDeque<Result<SubmitResponse, TransportError>>,
        submitted: Vec<Vec<u8>>,
        sequence_requests: usize,
        history: VecDeque<HistoryPage>,
        history_requests: Vec<HistoryRequest>,
    }

    #[derive(Default)]
    struct MockTransport {
        state: Mutex<MockState>,
    }

    impl MockTransport {
        fn with_sequence(sequence: u32) -> Arc<Self> {
            let mock = Self::default();
            mock.state.lock().sequence = Some(Ok(sequence));
            Arc::new(mock)
        }

        fn respond(&self, code: &str) {
            self.state
                .lock()
                .responses
                .push_back(Ok(SubmitResponse::new(code)));
        }

        fn fail_with(&self, error: TransportError) {
            self.state.lock().responses.push_back(Err(error));
        }

        fn submitted(&self) -> Vec<StObject> {
            self.state
                .lock()
                .submitted
                .iter()
                .map(|blob| deserialize(blob).unwrap())
                .collect()
        }

        fn sequence_requests(&self) -> usize {
            self.state.lock().sequence_requests
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn submit(&self, tx_blob: &[u8]) -> Result<SubmitResponse, TransportError> {
            let mut state = self.state.lock();
            state.submitted.push(tx_blob.to_vec());
            state
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(SubmitResponse::new("tesSUCCESS")))
        }

        async fn account_sequence(&self, _account: &AccountId) -> Result<u32, TransportError> {
            let mut state = self.state.lock();
            state.sequence_requests += 1;
            state.sequence.clone().unwrap_or(Err(TransportError::AccountNotFound))
        }

        async fn account_transactions(
            &self,
            request: &HistoryRequest,
        ) -> Result<HistoryPage, TransportError> {
            let mut state = self.state.lock();
            state.history_requests.push(request.clone());
            Ok(state.history.pop_front().unwrap_or_default())
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn key() -> KeyPair {
        KeyPair::from_hex(ROOT_SECRET).unwrap()
    }

    fn manager(transport: &Arc<MockTransport>) -> TransactionManager<MockTransport> {
        TransactionManager::new(key(), Arc::clone(transport), ManagerConfig::default())
    }

    fn payment() -> StObject {
        let destination = AccountId::from_address("r4BUhp9EYYSpLYHiKLzgvU2cZWuM92AFzK").unwrap();
        StObject::new()
            .with("TransactionType", 0u16)
            .with("Destination", destination)
            .with("Amount", Amount::Native(1_000_000))
    }

    fn validated(
        manager: &TransactionManager<MockTransport>,
        hash: Hash256,
        sequence: u32,
        ledger_index: u32,
        result: &str,
    ) -> ValidatedTransaction {
        ValidatedTransaction {
            hash,
            account: manager.account(),
            sequence,
            engine_result: result.into(),
            ledger_index,
            transaction_index: 0,
            validated: true,
            tx_json: serde_json::Value::Null,
        }
    }

    fn closed(ledger_index: u32) -> NetworkEvent {
        NetworkEvent::LedgerClosed {
            ledger_index,
            servers: Vec::new(),
        }
    }

    fn drain(handle: &mut TransactionHandle) -> Vec<TransactionEvent> {
        std::iter::from_fn(|| handle.try_next_event()).collect()
    }

    // -----------------------------------------------------------------------
    // 1. Sequencing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sequences_count_up_from_loaded_value() {
        let transport = MockTransport::with_sequence(7);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;

        manager.submit(payment()).await.unwrap();
        manager.submit(payment()).await.unwrap();
        manager.submit(payment().with("Sequence", 100u32)).await.unwrap();
        manager.submit(payment()).await.unwrap();

        let sequences: Vec<_> = transport
            .submitted()
            .iter()
            .map(|tx| tx.get_u32("Sequence").unwrap())
            .collect();
        assert_eq!(sequences, vec![7, 8, 100, 9]);
        assert_eq!(transport.sequence_requests(), 1);
        assert_eq!(manager.next_sequence(), Some(10));
    }

    #[tokio::test]
    async fn unfunded_account_starts_at_one() {
        let transport = Arc::new(MockTransport::default());
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.submit(payment()).await.unwrap();
        assert_eq!(transport.submitted()[0].get_u32("Sequence"), Some(1));
    }

    #[tokio::test]
    async fn unreachable_sequence_is_reported() {
        let transport = Arc::new(MockTransport::default());
        transport.state.lock().sequence = Some(Err(TransportError::Disconnected));
        let mut manager = manager(&transport);
        let err = manager.submit(payment()).await.unwrap_err();
        assert_eq!(err, LifecycleError::SequenceUnavailable);
        assert!(manager.pending().is_empty());
    }

    #[tokio::test]
    async fn invalid_fields_do_not_consume_a_sequence() {
        let transport = MockTransport::with_sequence(3);
        let mut manager = manager(&transport);
        let bad = payment().with("Destination", 5u32);
        assert!(matches!(
            manager.submit(bad).await,
            Err(LifecycleError::Codec(_))
        ));
        assert_eq!(manager.next_sequence(), Some(3));
    }

    #[tokio::test]
    async fn foreign_account_is_rejected() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        let other = AccountId::from_address("r4BUhp9EYYSpLYHiKLzgvU2cZWuM92AFzK").unwrap();
        let err = manager.submit(payment().with("Account", other)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AccountMismatch { .. }));
        assert!(transport.submitted().is_empty());
    }

    #[tokio::test]
    async fn submission_waits_for_first_ledger() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        let mut handle = manager.submit(payment()).await.unwrap();

        assert!(transport.submitted().is_empty());
        assert_eq!(handle.initial_hash(), None);
        assert!(drain(&mut handle).is_empty());
        assert_eq!(manager.pending().len(), 1);

        manager.handle_event(closed(90_000_000)).await;
        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].get_u32("LastLedgerSequence"), Some(90_000_004));
        let events = drain(&mut handle);
        assert!(matches!(events[0], TransactionEvent::Submitted(_)));
        assert!(matches!(events[1], TransactionEvent::Proposed(_)));

        manager.handle_event(closed(90_000_001)).await;
        assert_eq!(manager.pending().len(), 1);
        assert!(drain(&mut handle).is_empty());
    }

    #[tokio::test]
    async fn connect_with_ledger_index_releases_held_submission() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.submit(payment()).await.unwrap();
        assert!(transport.submitted().is_empty());

        manager
            .handle_event(NetworkEvent::Connected {
                ledger_index: Some(500),
            })
            .await;
        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].get_u32("LastLedgerSequence"), Some(504));
        // Not a reconnect, so no history replay or sequence reload.
        assert!(transport.state.lock().history_requests.is_empty());
        assert_eq!(transport.sequence_requests(), 1);
    }

    // -----------------------------------------------------------------------
    // 2. Signing and filled-in fields
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn submitted_blob_is_signed_and_complete() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(100)).await;
        let handle = manager.submit(payment()).await.unwrap();

        let tx = &transport.submitted()[0];
        assert_eq!(tx.get_account("Account"), Some(manager.account()));
        assert_eq!(tx.get_amount("Fee"), Some(&Amount::Native(12)));
        assert_eq!(tx.get_u32("LastLedgerSequence"), Some(104));
        let signature = tx.get_blob("TxnSignature").unwrap();
        let hash = signing_hash(tx).unwrap();
        assert!(crate::crypto::verify(key().public_key(), &hash.0, signature));
        assert_eq!(handle.initial_hash(), Some(transaction_hash(tx).unwrap()));
    }

    #[tokio::test]
    async fn caller_fee_and_last_ledger_are_kept() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let fields = payment()
            .with("Fee", Amount::Native(50))
            .with("LastLedgerSequence", 999u32);
        manager.submit(fields).await.unwrap();
        manager.handle_event(NetworkEvent::LoadChanged(vec![
            ServerLoad::idle().with_load_factor(1024),
        ]))
        .await;

        let tx = &transport.submitted()[0];
        assert_eq!(tx.get_amount("Fee"), Some(&Amount::Native(50)));
        assert_eq!(tx.get_u32("LastLedgerSequence"), Some(999));
        let (_, entry) = manager.pending().iter().next().unwrap();
        assert_eq!(entry.fee, 50);
    }

    // -----------------------------------------------------------------------
    // 3. Response classification
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn success_response_is_proposed() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        let events = drain(&mut handle);
        assert!(matches!(events[0], TransactionEvent::Submitted(_)));
        assert!(matches!(events[1], TransactionEvent::Proposed(_)));
        assert_eq!(manager.pending().len(), 1);
    }

    #[tokio::test]
    async fn malformed_response_fails_and_reloads_sequence() {
        let transport = MockTransport::with_sequence(1);
        transport.respond("temBAD_FEE");
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let handle = manager.submit(payment()).await.unwrap();

        let err = handle.outcome().await.unwrap_err();
        assert_eq!(err.code(), Some("temBAD_FEE"));
        assert_eq!(transport.sequence_requests(), 2);
        assert!(manager.pending().is_empty());

        for ledger in 11..15 {
            manager.handle_event(closed(ledger)).await;
        }
        assert_eq!(transport.submitted().len(), 1);
    }

    #[tokio::test]
    async fn tolerated_responses_stay_pending() {
        let transport = MockTransport::with_sequence(1);
        transport.respond("terQUEUED");
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        let events = drain(&mut handle);
        assert_eq!(events.len(), 1);
        assert_eq!(manager.pending().len(), 1);
    }

    #[tokio::test]
    async fn too_busy_is_silent() {
        let transport = MockTransport::with_sequence(1);
        transport.fail_with(TransportError::TooBusy);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        assert!(drain(&mut handle).is_empty());
        assert_eq!(manager.pending().len(), 1);
        assert_eq!(transport.submitted().len(), 1);
    }

    #[tokio::test]
    async fn busy_policy_can_retry_immediately() {
        let transport = MockTransport::with_sequence(1);
        transport.fail_with(TransportError::TooBusy);
        let config = ManagerConfig {
            busy_policy: BusyPolicy::RetryImmediately,
            ..ManagerConfig::default()
        };
        let mut manager = TransactionManager::new(key(), Arc::clone(&transport), config);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        assert_eq!(transport.submitted().len(), 2);
        assert!(matches!(
            drain(&mut handle).last(),
            Some(TransactionEvent::Proposed(_))
        ));
    }

    // -----------------------------------------------------------------------
    // 4. Expiry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn expiry_fires_exactly_once() {
        let transport = MockTransport::with_sequence(1);
        transport.respond("terQUEUED");
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();

        // LastLedgerSequence = 11 + 3.
        for ledger in 11..=16 {
            manager.handle_event(closed(ledger)).await;
        }
        let errors: Vec<_> = drain(&mut handle)
            .into_iter()
            .filter(|e| matches!(e, TransactionEvent::Error(_)))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            handle.outcome().await,
            Err(LifecycleError::MaxLedgerExceeded {
                last_ledger_sequence: 14,
                ledger_index: 15
            })
        );
    }

    #[tokio::test]
    async fn expiry_below_counter_reloads_sequence() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.submit(payment().with("LastLedgerSequence", 11u32)).await.unwrap();
        assert_eq!(transport.sequence_requests(), 1);
        manager.handle_event(closed(12)).await;
        assert_eq!(transport.sequence_requests(), 2);
    }

    // -----------------------------------------------------------------------
    // 5. Resubmission
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn resubmits_after_wait_in_submission_order() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let first = manager.submit(payment()).await.unwrap();
        let second = manager.submit(payment()).await.unwrap();
        assert_eq!(transport.submitted().len(), 2);

        // Submitted during ledger 11; not eligible until 12 has closed.
        manager.handle_event(closed(11)).await;
        manager.handle_event(closed(12)).await;
        assert_eq!(transport.submitted().len(), 2);
        manager.handle_event(closed(13)).await;

        let submitted = transport.submitted();
        assert_eq!(submitted.len(), 4);
        assert_eq!(submitted[2].get_u32("Sequence"), Some(1));
        assert_eq!(submitted[3].get_u32("Sequence"), Some(2));
        assert_eq!(
            manager.pending().get(first.id()).unwrap().attempts,
            2
        );
        assert_eq!(
            manager.pending().get(second.id()).unwrap().attempts,
            2
        );
    }

    #[tokio::test]
    async fn failing_entry_stops_the_series() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.submit(payment()).await.unwrap();
        manager.submit(payment()).await.unwrap();
        manager.handle_event(closed(11)).await;
        manager.handle_event(closed(12)).await;

        transport.respond("terPRE_SEQ");
        manager.handle_event(closed(13)).await;
        assert_eq!(transport.submitted().len(), 3);
    }

    #[tokio::test]
    async fn past_sequence_continues_the_series() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.submit(payment()).await.unwrap();
        manager.submit(payment()).await.unwrap();
        manager.handle_event(closed(11)).await;
        manager.handle_event(closed(12)).await;

        transport.respond("tefPAST_SEQ");
        manager.handle_event(closed(13)).await;
        assert_eq!(transport.submitted().len(), 4);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let transport = MockTransport::with_sequence(1);
        let config = ManagerConfig {
            max_attempts: 1,
            last_ledger_offset: 100,
            resubmit_wait_ledgers: 0,
            ..ManagerConfig::default()
        };
        let mut manager = TransactionManager::new(key(), Arc::clone(&transport), config);
        manager.handle_event(closed(10)).await;
        let handle = manager.submit(payment()).await.unwrap();
        for ledger in 11..15 {
            manager.handle_event(closed(ledger)).await;
        }
        assert_eq!(transport.submitted().len(), 2);
        let err = handle.outcome().await.unwrap_err();
        assert_eq!(err.code(), Some("tejAttemptsExceeded"));
    }

    #[tokio::test]
    async fn cached_validation_settles_instead_of_resubmitting() {
        let transport = MockTransport::with_sequence(1);
        transport.respond("terQUEUED");
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let handle = manager.submit(payment()).await.unwrap();
        let hash = handle.initial_hash().unwrap();

        // Validation that arrived before the hash was indexed.
        let tx = validated(&manager, hash, 1, 11, "tesSUCCESS");
        manager.received.insert(tx.clone());
        manager.handle_event(closed(12)).await;
        manager.handle_event(closed(13)).await;

        assert_eq!(transport.submitted().len(), 1);
        assert_eq!(handle.outcome().await, Ok(tx));
    }

    // -----------------------------------------------------------------------
    // 6. Reconciliation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn validated_transaction_finalizes_once() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        let hash = handle.initial_hash().unwrap();

        let tx = validated(&manager, hash, 1, 12, "tesSUCCESS");
        manager.handle_event(NetworkEvent::AccountTransaction(tx.clone())).await;
        manager.handle_event(NetworkEvent::AccountTransaction(tx.clone())).await;

        let successes = drain(&mut handle)
            .into_iter()
            .filter(|e| matches!(e, TransactionEvent::Success(_)))
            .count();
        assert_eq!(successes, 1);
        assert!(manager.pending().is_empty());
        assert_eq!(handle.outcome().await, Ok(tx));
    }

    #[tokio::test]
    async fn validated_failure_is_an_error() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let handle = manager.submit(payment()).await.unwrap();
        let hash = handle.initial_hash().unwrap();
        let tx = validated(&manager, hash, 1, 12, "tecUNFUNDED_PAYMENT");
        manager.handle_event(NetworkEvent::AccountTransaction(tx)).await;
        assert_eq!(
            handle.outcome().await.unwrap_err().code(),
            Some("tecUNFUNDED_PAYMENT")
        );
    }

    #[tokio::test]
    async fn foreign_validated_sequence_bumps_counter() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.submit(payment()).await.unwrap();
        let tx = validated(&manager, Hash256([9; 32]), 5, 20, "tesSUCCESS");
        manager.handle_event(NetworkEvent::AccountTransaction(tx)).await;
        assert_eq!(manager.next_sequence(), Some(6));
        assert_eq!(manager.received.len(), 1);
    }

    #[tokio::test]
    async fn stale_stream_entries_are_dropped() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        let newer = validated(&manager, Hash256([1; 32]), 3, 50, "tesSUCCESS");
        let older = validated(&manager, Hash256([2; 32]), 2, 40, "tesSUCCESS");
        let mut unvalidated = validated(&manager, Hash256([3; 32]), 4, 60, "tesSUCCESS");
        unvalidated.validated = false;

        manager.handle_event(NetworkEvent::AccountTransaction(newer)).await;
        manager.handle_event(NetworkEvent::AccountTransaction(older)).await;
        manager.handle_event(NetworkEvent::AccountTransaction(unvalidated)).await;
        assert_eq!(manager.received.len(), 1);
        assert!(manager.received.get(&Hash256([1; 32])).is_some());
    }

    #[tokio::test]
    async fn ledger_closes_at_or_below_min_ledger_are_ignored() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        manager.handle_event(closed(9)).await;
        manager.handle_event(closed(10)).await;
        assert_eq!(manager.status().last_closed_ledger, Some(10));
    }

    // -----------------------------------------------------------------------
    // 7. Fees and load
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn load_change_adjusts_fee_and_hash() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let mut handle = manager.submit(payment()).await.unwrap();
        drain(&mut handle);

        manager
            .handle_event(NetworkEvent::LoadChanged(vec![
                ServerLoad::idle().with_load_factor(512),
            ]))
            .await;
        assert_eq!(
            drain(&mut handle),
            vec![TransactionEvent::FeeAdjusted { old: 12, new: 24 }]
        );

        for ledger in 11..=13 {
            manager.handle_event(closed(ledger)).await;
        }
        let submitted = transport.submitted();
        assert_eq!(submitted[1].get_amount("Fee"), Some(&Amount::Native(24)));

        let entry = manager.pending().get(handle.id()).unwrap();
        assert_eq!(entry.hashes.len(), 2);
        let old_hash = entry.hashes[0];
        assert_eq!(manager.pending().find_by_hash(&old_hash), Some(handle.id()));
    }

    #[tokio::test]
    async fn expensive_servers_pause_resubmission() {
        let transport = MockTransport::with_sequence(1);
        let config = ManagerConfig {
            max_fee: 100,
            ..ManagerConfig::default()
        };
        let mut manager = TransactionManager::new(key(), Arc::clone(&transport), config);
        manager.handle_event(closed(10)).await;
        manager.submit(payment()).await.unwrap();

        let busy = ServerLoad::idle().with_load_factor(256 * 20);
        manager
            .handle_event(NetworkEvent::LoadChanged(vec![busy, busy]))
            .await;
        assert!(manager.is_paused());
        manager.handle_event(closed(11)).await;
        manager.handle_event(closed(12)).await;
        assert_eq!(transport.submitted().len(), 1);

        manager
            .handle_event(NetworkEvent::LoadChanged(vec![busy, ServerLoad::idle()]))
            .await;
        assert!(!manager.is_paused());
        manager.handle_event(closed(13)).await;
        assert_eq!(transport.submitted().len(), 2);
    }

    #[tokio::test]
    async fn fee_is_capped_at_max() {
        let transport = MockTransport::with_sequence(1);
        let config = ManagerConfig {
            max_fee: 30,
            ..ManagerConfig::default()
        };
        let mut manager = TransactionManager::new(key(), Arc::clone(&transport), config);
        manager
            .handle_event(NetworkEvent::LoadChanged(vec![
                ServerLoad::idle().with_load_factor(256 * 10),
            ]))
            .await;
        assert_eq!(manager.current_fee(), 30);
    }

    #[tokio::test]
    async fn unbounded_fee_cap_still_yields_an_encodable_fee() {
        let transport = MockTransport::with_sequence(1);
        let config = ManagerConfig {
            max_fee: u64::MAX,
            fee_units: u64::MAX,
            ..ManagerConfig::default()
        };
        let mut manager = TransactionManager::new(key(), Arc::clone(&transport), config);
        manager.handle_event(closed(10)).await;
        manager
            .handle_event(NetworkEvent::LoadChanged(vec![
                ServerLoad::idle().with_load_factor(512),
            ]))
            .await;
        assert_eq!(manager.current_fee(), MAX_NATIVE_DROPS);

        manager.submit(payment()).await.unwrap();
        let tx = &transport.submitted()[0];
        assert_eq!(
            tx.get_amount("Fee"),
            Some(&Amount::Native(MAX_NATIVE_DROPS as i64))
        );
        assert_eq!(native_fee(u64::MAX), Amount::Native(MAX_NATIVE_DROPS as i64));
    }

    // -----------------------------------------------------------------------
    // 8. Reconnect
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reconnect_replays_history_then_resubmits() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(closed(10)).await;
        let settled = manager.submit(payment()).await.unwrap();
        let open = manager.submit(payment()).await.unwrap();
        let settled_hash = settled.initial_hash().unwrap();

        manager.handle_event(NetworkEvent::Disconnected).await;
        manager.handle_event(closed(11)).await;
        assert_eq!(manager.status().last_closed_ledger, Some(10));

        let missed = validated(&manager, settled_hash, 1, 11, "tesSUCCESS");
        transport.state.lock().history.push_back(HistoryPage {
            transactions: vec![missed.clone()],
            marker: Some(serde_json::json!({"ledger": 11, "seq": 0})),
        });
        transport.state.lock().history.push_back(HistoryPage::default());

        manager
            .handle_event(NetworkEvent::Connected {
                ledger_index: Some(13),
            })
            .await;

        let requests = transport.state.lock().history_requests.clone();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].forward);
        assert_eq!(requests[0].ledger_index_min, 10);
        assert_eq!(requests[0].limit, 20);
        assert!(requests[1].marker.is_some());

        assert_eq!(settled.outcome().await, Ok(missed));
        assert_eq!(transport.sequence_requests(), 2);
        // The open transaction went out again after replay.
        assert_eq!(transport.submitted().len(), 3);
        assert_eq!(manager.pending().get(open.id()).unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn replay_without_history_reads_newest_first() {
        let transport = MockTransport::with_sequence(1);
        let mut manager = manager(&transport);
        manager.handle_event(NetworkEvent::Disconnected).await;

        let make = |seq: u32, ledger: u32| ValidatedTransaction {
            hash: Hash256([seq as u8; 32]),
            account: manager.account(),
            sequence: seq,
            engine_result: "tesSUCCESS".into(),
            ledger_index: ledger,
            transaction_index: 0,
            validated: true,
            tx_json: serde_json::Value::Null,
        };
        transport.state.lock().history.push_back(HistoryPage {
            transactions: vec![make(3, 30), make(2, 20), make(1, 10)],
            marker: Some(serde_json::json!("more")),
        });
        manager
            .handle_event(NetworkEvent::Connected { ledger_index: None })
            .await;

        let requests = transport.state.lock().history_requests.clone();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].forward);
        assert_eq!(requests[0].ledger_index_min, -1);
        // Sorted by sequence, so none was dropped as stale.
        assert_eq!(manager.received.len(), 3);
    }

    // -----------------------------------------------------------------------
    // 9. Driver
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn spawned_manager_resolves_outcomes() {
        let transport = MockTransport::with_sequence(4);
        let handle = manager(&transport).spawn();

        handle.notify(closed(50)).unwrap();
        let tx = handle.submit(payment()).await.unwrap();
        let hash = tx.initial_hash().unwrap();
        let account = key().account_id();
        handle
            .notify(NetworkEvent::AccountTransaction(ValidatedTransaction {
                hash,
                account,
                sequence: 4,
                engine_result: "tesSUCCESS".into(),
                ledger_index: 52,
                transaction_index: 3,
                validated: true,
                tx_json: serde_json::Value::Null,
            }))
            .unwrap();

        let outcome = tx.outcome().await.unwrap();
        assert_eq!(outcome.sequence, 4);
        let status = handle.status().await.unwrap();
        assert_eq!(status.pending, 0);
        assert_eq!(status.next_sequence, Some(5));
    }

    #[tokio::test]
    async fn shutdown_fails_pending_transactions() {
        let transport = MockTransport::with_sequence(1);
        let handle = manager(&transport).spawn();
        let tx = handle.submit(payment()).await.unwrap();
        handle.shutdown();
        assert_eq!(tx.outcome().await, Err(LifecycleError::ManagerClosed));
        assert!(matches!(
            handle.submit(payment()).await,
            Err(LifecycleError::ManagerClosed)
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"max_fee": 5000, "load_policy": "median"}"#).unwrap();
        assert_eq!(config.max_fee, 5000);
        assert_eq!(config.load_policy, LoadPolicy::Median);
        assert_eq!(config.last_ledger_offset, 3);
        assert_eq!(config.busy_policy, BusyPolicy::WaitForLedger);
    }
}
