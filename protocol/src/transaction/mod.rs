//! # Transaction Module
//!
//! Everything between "here are the fields of a payment" and "it is in a
//! validated ledger": sequence numbers, fees, signing, submission,
//! resubmission across ledger closes, and reconciling what the network
//! reports back.
//!
//! ## Architecture
//!
//! ```text
//! types.rs     - engine result classes, submit responses, events, errors
//! fees.rs      - server load reports and fee selection
//! transport.rs - the network seam: the Transport trait and NetworkEvent
//! pending.rs   - bookkeeping for in-flight transactions
//! manager.rs   - the per-account lifecycle state machine and its driver
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Submit**: [`TransactionManager::submit`] fills in `Account`,
//!    `Sequence`, `Fee`, `LastLedgerSequence` and `SigningPubKey`, signs,
//!    and sends the blob.
//! 2. **Wait**: a `tes`/`tec` answer means the transaction is proposed.
//!    `ter`/`tef`/`tel` answers leave it pending; anything else fails it.
//! 3. **Resubmit**: on every ledger close, transactions that have waited
//!    long enough go out again in submission order.
//! 4. **Settle**: a validated transaction from the account stream with a
//!    matching hash ends it. So does passing `LastLedgerSequence`.
//!
//! The network itself stays behind [`Transport`]. Nothing here opens a
//! socket.

pub mod fees;
pub mod manager;
pub mod pending;
pub mod transport;
pub mod types;

pub use fees::{LoadPolicy, ServerLoad};
pub use manager::{
    sign_fields, BusyPolicy, ManagerConfig, ManagerHandle, ManagerStatus, TransactionHandle,
    TransactionManager,
};
pub use pending::{PendingId, PendingSet, PendingTransaction, ReceivedCache, Submission};
pub use transport::{HistoryPage, HistoryRequest, NetworkEvent, Transport, TransportError};
pub use types::{
    EngineClass, LifecycleError, Outcome, SubmitResponse, TransactionEvent, ValidatedTransaction,
};
