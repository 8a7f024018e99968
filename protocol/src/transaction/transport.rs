//! # Transport Boundary
//!
//! The lifecycle manager never opens a socket. It talks to the network
//! through a [`Transport`] (request/response calls) and consumes a stream
//! of [`NetworkEvent`]s (ledger closes, account transactions, connection
//! changes) that whoever owns the connection feeds into it.
//!
//! Keeping both behind this seam lets the manager run against a mock in
//! tests exactly as it runs against a live connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fees::ServerLoad;
use super::types::{SubmitResponse, ValidatedTransaction};
use crate::codec::AccountId;

/// Errors a transport can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server is shedding load. Never surfaced to submitters.
    #[error("server too busy")]
    TooBusy,

    /// The account has no root entry yet.
    #[error("account not found")]
    AccountNotFound,

    #[error("not connected")]
    Disconnected,

    #[error("remote error {code}: {message}")]
    Remote { code: String, message: String },
}

/// A request for one page of account history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub account: AccountId,
    /// Lowest ledger to include, `-1` for the oldest available.
    pub ledger_index_min: i64,
    /// Highest ledger to include, `-1` for the newest validated.
    pub ledger_index_max: i64,
    pub limit: u32,
    /// Oldest first when set, newest first otherwise.
    pub forward: bool,
    /// Resume token from the previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<serde_json::Value>,
}

/// One page of account history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub transactions: Vec<ValidatedTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<serde_json::Value>,
}

/// Request/response calls the manager makes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a signed transaction blob.
    async fn submit(&self, tx_blob: &[u8]) -> Result<SubmitResponse, TransportError>;

    /// The next sequence number the account will accept.
    async fn account_sequence(&self, account: &AccountId) -> Result<u32, TransportError>;

    /// One page of validated account history.
    async fn account_transactions(
        &self,
        request: &HistoryRequest,
    ) -> Result<HistoryPage, TransportError>;
}

/// Notifications the manager reacts to, in the order the connection
/// delivered them.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A ledger closed. `servers` carries fresh load reports when the
    /// close came with them.
    LedgerClosed {
        ledger_index: u32,
        servers: Vec<ServerLoad>,
    },
    /// Server load changed between ledger closes.
    LoadChanged(Vec<ServerLoad>),
    /// A transaction touching the account.
    AccountTransaction(ValidatedTransaction),
    /// Connection (re-)established. `ledger_index` is the server's latest
    /// closed ledger, when known.
    Connected { ledger_index: Option<u32> },
    Disconnected,
}
