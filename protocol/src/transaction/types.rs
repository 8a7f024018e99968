//! # Lifecycle Types
//!
//! The vocabulary shared by the transport, the pending set and the manager:
//! engine-result classes, validated transactions as the network reports
//! them, the events a submission emits, and the lifecycle error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{AccountId, CodecError, Hash256};
use crate::config::{TEJ_ATTEMPTS_EXCEEDED, TEJ_MAX_LEDGER, TES_SUCCESS};
use crate::crypto::DerivationError;

// ---------------------------------------------------------------------------
// Engine results
// ---------------------------------------------------------------------------

/// Class of a network engine result, taken from its three-letter prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineClass {
    /// `tes`: applied.
    Success,
    /// `tec`: claimed a fee without doing the work.
    Claimed,
    /// `ter`: retry later.
    Retry,
    /// `tef`: failed against the current ledger.
    Failed,
    /// `tel`: local to the server that answered.
    Local,
    /// `tem`: malformed.
    Malformed,
    /// Anything else, including the empty string.
    Unknown,
}

impl EngineClass {
    pub fn of(code: &str) -> Self {
        match code.get(..3) {
            Some("tes") => EngineClass::Success,
            Some("tec") => EngineClass::Claimed,
            Some("ter") => EngineClass::Retry,
            Some("tef") => EngineClass::Failed,
            Some("tel") => EngineClass::Local,
            Some("tem") => EngineClass::Malformed,
            _ => EngineClass::Unknown,
        }
    }

    /// `tes` and `tec` results are provisionally in a ledger.
    pub fn is_proposed(self) -> bool {
        matches!(self, EngineClass::Success | EngineClass::Claimed)
    }

    /// `ter`, `tef` and `tel` results wait for the next resubmission.
    pub fn is_tolerated(self) -> bool {
        matches!(
            self,
            EngineClass::Retry | EngineClass::Failed | EngineClass::Local
        )
    }
}

/// Results that continue a resubmission series as if it had succeeded:
/// the transaction (or one with its sequence) is already in.
pub fn continues_series(code: &str) -> bool {
    EngineClass::of(code).is_proposed() || code == "tefALREADY" || code == "tefPAST_SEQ"
}

// ---------------------------------------------------------------------------
// Network payloads
// ---------------------------------------------------------------------------

/// A server's answer to a submit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub engine_result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_result_message: Option<String>,
    /// Hash the server computed, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<Hash256>,
}

impl SubmitResponse {
    pub fn new(engine_result: impl Into<String>) -> Self {
        Self {
            engine_result: engine_result.into(),
            engine_result_message: None,
            tx_hash: None,
        }
    }

    pub fn class(&self) -> EngineClass {
        EngineClass::of(&self.engine_result)
    }
}

/// A transaction as seen on the account's transaction stream or in its
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedTransaction {
    pub hash: Hash256,
    pub account: AccountId,
    pub sequence: u32,
    pub engine_result: String,
    pub ledger_index: u32,
    /// Position within the ledger.
    #[serde(default)]
    pub transaction_index: u32,
    #[serde(default)]
    pub validated: bool,
    /// The transaction's JSON as the network rendered it.
    #[serde(default)]
    pub tx_json: serde_json::Value,
}

impl ValidatedTransaction {
    pub fn succeeded(&self) -> bool {
        self.engine_result == TES_SUCCESS
    }

    /// Ordering key for the stream: `(ledger_index, transaction_index)`.
    pub fn marker(&self) -> (u32, u32) {
        (self.ledger_index, self.transaction_index)
    }
}

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

/// Everything a pending transaction reports back to its submitter, in
/// order. Exactly one of `Success` or `Error` arrives, and it is last.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    /// A submit request was answered.
    Submitted(SubmitResponse),
    /// A later submit request was answered.
    Resubmitted(SubmitResponse),
    /// The answer was `tes`/`tec`; waiting for validation.
    Proposed(SubmitResponse),
    /// Fee changed with server load. The hash changes with it.
    FeeAdjusted { old: u64, new: u64 },
    Success(ValidatedTransaction),
    Error(LifecycleError),
}

impl TransactionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionEvent::Success(_) | TransactionEvent::Error(_))
    }
}

/// Terminal result of a submission.
pub type Outcome = Result<ValidatedTransaction, LifecycleError>;

/// Why a submission ended without success.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    /// The network rejected the transaction, at submission (`tem…`) or in
    /// a validated ledger (`tec…`).
    #[error("{code}: {message}")]
    Engine { code: String, message: String },

    #[error("LastLedgerSequence {last_ledger_sequence} exceeded at ledger {ledger_index}")]
    MaxLedgerExceeded {
        last_ledger_sequence: u32,
        ledger_index: u32,
    },

    #[error("gave up after {0} submission attempts")]
    AttemptsExceeded(u32),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Signing(#[from] DerivationError),

    #[error("transaction account {got} does not match manager account {expected}")]
    AccountMismatch { expected: AccountId, got: AccountId },

    #[error("could not load the account sequence")]
    SequenceUnavailable,

    #[error("transaction manager is no longer running")]
    ManagerClosed,
}

impl LifecycleError {
    /// Result code in the network's vocabulary, where one applies.
    pub fn code(&self) -> Option<&str> {
        match self {
            LifecycleError::Engine { code, .. } => Some(code),
            LifecycleError::MaxLedgerExceeded { .. } => Some(TEJ_MAX_LEDGER),
            LifecycleError::AttemptsExceeded(_) => Some(TEJ_ATTEMPTS_EXCEEDED),
            _ => None,
        }
    }

    pub(crate) fn from_response(response: &SubmitResponse) -> Self {
        LifecycleError::Engine {
            code: response.engine_result.clone(),
            message: response
                .engine_result_message
                .clone()
                .unwrap_or_else(|| "rejected by the network".into()),
        }
    }

    pub(crate) fn from_validated(tx: &ValidatedTransaction) -> Self {
        LifecycleError::Engine {
            code: tx.engine_result.clone(),
            message: "validated with a non-success result".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_prefix() {
        assert_eq!(EngineClass::of("tesSUCCESS"), EngineClass::Success);
        assert_eq!(EngineClass::of("tecUNFUNDED_PAYMENT"), EngineClass::Claimed);
        assert_eq!(EngineClass::of("terQUEUED"), EngineClass::Retry);
        assert_eq!(EngineClass::of("tefPAST_SEQ"), EngineClass::Failed);
        assert_eq!(EngineClass::of("telINSUF_FEE_P"), EngineClass::Local);
        assert_eq!(EngineClass::of("temBAD_AMOUNT"), EngineClass::Malformed);
        assert_eq!(EngineClass::of(""), EngineClass::Unknown);
        assert_eq!(EngineClass::of("tooBusy"), EngineClass::Unknown);
    }

    #[test]
    fn proposed_and_tolerated_are_disjoint() {
        for class in [
            EngineClass::Success,
            EngineClass::Claimed,
            EngineClass::Retry,
            EngineClass::Failed,
            EngineClass::Local,
            EngineClass::Malformed,
            EngineClass::Unknown,
        ] {
            assert!(!(class.is_proposed() && class.is_tolerated()));
        }
        assert!(!EngineClass::Malformed.is_tolerated());
    }

    #[test]
    fn series_continues_on_already_applied() {
        assert!(continues_series("tesSUCCESS"));
        assert!(continues_series("tecNO_DST"));
        assert!(continues_series("tefALREADY"));
        assert!(continues_series("tefPAST_SEQ"));
        assert!(!continues_series("tefMAX_LEDGER"));
        assert!(!continues_series("terPRE_SEQ"));
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            LifecycleError::AttemptsExceeded(11).code(),
            Some("tejAttemptsExceeded")
        );
        assert_eq!(
            LifecycleError::MaxLedgerExceeded {
                last_ledger_sequence: 5,
                ledger_index: 6
            }
            .code(),
            Some("tejMaxLedger")
        );
        assert_eq!(LifecycleError::ManagerClosed.code(), None);
    }

    #[test]
    fn validated_transaction_from_json() {
        let tx: ValidatedTransaction = serde_json::from_value(serde_json::json!({
            "hash": "AB".repeat(32),
            "account": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
            "sequence": 7,
            "engine_result": "tesSUCCESS",
            "ledger_index": 100,
            "validated": true
        }))
        .unwrap();
        assert!(tx.succeeded());
        assert_eq!(tx.marker(), (100, 0));
        assert_eq!(tx.tx_json, serde_json::Value::Null);
    }
}
