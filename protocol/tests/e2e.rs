//! End-to-end integration tests for the rivet protocol library.
//!
//! These tests run the whole client path: a secret becomes an account, a
//! JSON transaction becomes a field map, the manager sequences, signs and
//! submits it, and a scripted network validates (or ignores) what it
//! receives. They prove that derivation, the codec and the lifecycle
//! compose, using only the public API.
//!
//! Each test builds its own mock network. No shared state, no ordering
//! dependencies.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use rivet_protocol::codec::json::{from_json, to_json};
use rivet_protocol::codec::{deserialize, signing_hash, transaction_hash, Amount, Hash256, StObject};
use rivet_protocol::crypto::{verify, KeyPair, KeySelector, Seed};
use rivet_protocol::transaction::{
    sign_fields, HistoryPage, HistoryRequest, LifecycleError, ManagerConfig, NetworkEvent,
    SubmitResponse, TransactionEvent, TransactionManager, Transport, TransportError,
    ValidatedTransaction,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const DESTINATION: &str = "r4BUhp9EYYSpLYHiKLzgvU2cZWuM92AFzK";

/// A scripted network: records every blob and answers from a queue,
/// defaulting to `tesSUCCESS`.
#[derive(Default)]
struct MockNetwork {
    sequence: u32,
    responses: Mutex<VecDeque<&'static str>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    history: Mutex<VecDeque<HistoryPage>>,
}

impl MockNetwork {
    fn new(sequence: u32) -> Arc<Self> {
        Arc::new(Self {
            sequence,
            ..Self::default()
        })
    }

    fn script(&self, codes: &[&'static str]) {
        self.responses.lock().extend(codes.iter().copied());
    }

    fn submitted(&self) -> Vec<StObject> {
        self.submitted
            .lock()
            .iter()
            .map(|blob| deserialize(blob).expect("submitted blob decodes"))
            .collect()
    }

    /// What the network would report once `tx` lands in `ledger_index`.
    fn validate(&self, tx: &StObject, ledger_index: u32, result: &str) -> ValidatedTransaction {
        ValidatedTransaction {
            hash: transaction_hash(tx).expect("hashable"),
            account: tx.get_account("Account").expect("account set"),
            sequence: tx.get_u32("Sequence").expect("sequence set"),
            engine_result: result.into(),
            ledger_index,
            transaction_index: 0,
            validated: true,
            tx_json: to_json(tx),
        }
    }
}

#[async_trait]
impl Transport for MockNetwork {
    async fn submit(&self, tx_blob: &[u8]) -> Result<SubmitResponse, TransportError> {
        self.submitted.lock().push(tx_blob.to_vec());
        let code = self.responses.lock().pop_front().unwrap_or("tesSUCCESS");
        Ok(SubmitResponse::new(code))
    }

    async fn account_sequence(&self, _account: &rivet_protocol::AccountId) -> Result<u32, TransportError> {
        Ok(self.sequence)
    }

    async fn account_transactions(
        &self,
        _request: &HistoryRequest,
    ) -> Result<HistoryPage, TransportError> {
        Ok(self.history.lock().pop_front().unwrap_or_default())
    }
}

fn account_key() -> KeyPair {
    Seed::from_passphrase("masterpassphrase")
        .key()
        .expect("derivable")
}

fn payment(drops: i64) -> StObject {
    from_json(&json!({
        "TransactionType": "Payment",
        "Destination": DESTINATION,
        "Amount": drops.to_string(),
    }))
    .expect("valid payment json")
}

fn closed(ledger_index: u32) -> NetworkEvent {
    NetworkEvent::LedgerClosed {
        ledger_index,
        servers: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Derivation -> Signing -> Codec
// ---------------------------------------------------------------------------

#[test]
fn test_seed_to_signed_blob() {
    let seed = Seed::parse("snoPBrXtMeMyMHUVTgbuqAfg1SUTb").unwrap();
    let key = seed.get_key(&KeySelector::Account(0), 1).unwrap();
    assert_eq!(key.address(), "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");

    let mut tx = payment(25)
        .with("Account", key.account_id())
        .with("Sequence", 1u32)
        .with("Fee", Amount::Native(10));
    let (blob, id) = sign_fields(&key, &mut tx).unwrap();

    let decoded = deserialize(&blob).unwrap();
    assert_eq!(decoded, tx);
    assert_eq!(transaction_hash(&decoded).unwrap(), id);

    let digest = signing_hash(&decoded).unwrap();
    let signature = decoded.get_blob("TxnSignature").unwrap();
    assert!(verify(key.public_key(), &digest.0, signature));
    assert!(!verify(
        KeyPair::random().public_key(),
        &digest.0,
        signature
    ));
}

#[test]
fn test_address_search_finds_later_account() {
    let seed = Seed::from_passphrase("masterpassphrase");
    let third = seed.get_key(&KeySelector::Account(2), 1).unwrap();
    let selector = KeySelector::Address(third.account_id());

    assert!(seed.get_key(&selector, 2).is_err());
    assert_eq!(seed.get_key(&selector, 3).unwrap(), third);
}

// ---------------------------------------------------------------------------
// Full Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_validate_finalize() {
    let network = MockNetwork::new(5);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    manager.notify(closed(1000)).unwrap();
    let mut first = manager.submit(payment(1)).await.unwrap();
    let second = manager.submit(payment(2)).await.unwrap();

    let submitted = network.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].get_u32("Sequence"), Some(5));
    assert_eq!(submitted[1].get_u32("Sequence"), Some(6));
    assert_eq!(submitted[0].get_u32("LastLedgerSequence"), Some(1004));

    for (i, tx) in submitted.iter().enumerate() {
        let mut validated = network.validate(tx, 1002, "tesSUCCESS");
        validated.transaction_index = i as u32;
        manager
            .notify(NetworkEvent::AccountTransaction(validated))
            .unwrap();
    }

    assert_eq!(first.next_event().await, Some(TransactionEvent::Submitted(SubmitResponse::new("tesSUCCESS"))));
    assert!(matches!(first.next_event().await, Some(TransactionEvent::Proposed(_))));
    assert!(matches!(first.next_event().await, Some(TransactionEvent::Success(_))));
    assert_eq!(first.outcome().await.unwrap().sequence, 5);
    assert_eq!(second.outcome().await.unwrap().sequence, 6);

    let status = manager.status().await.unwrap();
    assert_eq!(status.pending, 0);
    assert_eq!(status.next_sequence, Some(7));
    manager.shutdown();
}

#[tokio::test]
async fn test_submission_before_first_ledger_is_held() {
    let network = MockNetwork::new(3);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    let handle = manager.submit(payment(1)).await.unwrap();
    assert_eq!(handle.initial_hash(), None);
    assert!(network.submitted().is_empty());

    manager.notify(closed(90_000_000)).unwrap();
    manager.status().await.unwrap();
    let tx = network.submitted().remove(0);
    assert_eq!(tx.get_u32("LastLedgerSequence"), Some(90_000_004));

    manager.notify(closed(90_000_001)).unwrap();
    manager
        .notify(NetworkEvent::AccountTransaction(network.validate(
            &tx,
            90_000_002,
            "tesSUCCESS",
        )))
        .unwrap();
    let validated = handle.outcome().await.unwrap();
    assert_eq!(validated.sequence, 3);
    assert_eq!(validated.hash, transaction_hash(&tx).unwrap());
}

#[tokio::test]
async fn test_unvalidated_transaction_expires() {
    let network = MockNetwork::new(1);
    network.script(&["terQUEUED"]);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    manager.notify(closed(10)).unwrap();
    let handle = manager.submit(payment(1)).await.unwrap();
    for ledger in 11..=15 {
        manager.notify(closed(ledger)).unwrap();
    }

    let err = handle.outcome().await.unwrap_err();
    assert_eq!(err.code(), Some("tejMaxLedger"));
    // One submission during 11, one resubmission after 13 closed.
    assert_eq!(network.submitted().len(), 2);
}

#[tokio::test]
async fn test_validated_failure_reaches_submitter() {
    let network = MockNetwork::new(1);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    manager.notify(closed(2)).unwrap();
    let handle = manager.submit(payment(1)).await.unwrap();
    let tx = network.submitted().remove(0);
    manager
        .notify(NetworkEvent::AccountTransaction(network.validate(
            &tx,
            3,
            "tecUNFUNDED_PAYMENT",
        )))
        .unwrap();

    assert_eq!(
        handle.outcome().await,
        Err(LifecycleError::Engine {
            code: "tecUNFUNDED_PAYMENT".into(),
            message: "validated with a non-success result".into(),
        })
    );
}

#[tokio::test]
async fn test_reconnect_recovers_missed_validation() {
    let network = MockNetwork::new(1);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    manager.notify(closed(20)).unwrap();
    let handle = manager.submit(payment(1)).await.unwrap();
    manager.notify(NetworkEvent::Disconnected).unwrap();

    let tx = network.submitted().remove(0);
    network.history.lock().push_back(HistoryPage {
        transactions: vec![network.validate(&tx, 21, "tesSUCCESS")],
        marker: None,
    });
    manager
        .notify(NetworkEvent::Connected {
            ledger_index: Some(22),
        })
        .unwrap();

    let validated = handle.outcome().await.unwrap();
    assert_eq!(validated.ledger_index, 21);
    assert_eq!(network.submitted().len(), 1);
}

#[tokio::test]
async fn test_caller_fields_are_respected() {
    let network = MockNetwork::new(1);
    let manager =
        TransactionManager::new(account_key(), Arc::clone(&network), ManagerConfig::default())
            .spawn();

    manager.notify(closed(100)).unwrap();
    let fields = payment(1)
        .with("Fee", Amount::Native(15))
        .with("Sequence", 77u32);
    let handle = manager.submit(fields).await.unwrap();

    let tx = network.submitted().remove(0);
    assert_eq!(tx.get_amount("Fee"), Some(&Amount::Native(15)));
    assert_eq!(tx.get_u32("Sequence"), Some(77));
    assert_eq!(handle.initial_hash(), Some(transaction_hash(&tx).unwrap()));
    assert_ne!(handle.initial_hash(), Some(Hash256::default()));
}
