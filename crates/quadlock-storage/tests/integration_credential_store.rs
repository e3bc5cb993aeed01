//! Integration tests for the JSON-file credential store
//!
//! These tests run against real files in a temporary directory and check
//! schema defaulting, persistence across reopen and concurrent mutation.
//!
//! Run with: cargo test --package quadlock-storage --test integration_credential_store

use quadlock_core::{CardUid, FingerprintSlot, Passcode};
use quadlock_storage::{CredentialStore, Credentials, JsonFileBackend, StorageError};
use rstest::rstest;
use std::sync::Arc;
use tokio::sync::Barrier;

fn uid(bytes: &[u8]) -> CardUid {
    CardUid::new(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_fresh_file_gets_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");

    let store = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();
    assert_eq!(store.snapshot().await, Credentials::default());

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["system_passcode"], "1234");
    assert_eq!(written["valid_card_uids"], serde_json::json!([[27, 147, 242, 60]]));
    assert_eq!(written["fingerprint_ids"], serde_json::json!([1, 2, 3]));
}

#[tokio::test]
async fn test_missing_keys_are_written_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");
    std::fs::write(&path, r#"{"system_passcode": "4321"}"#).unwrap();

    let store = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();
    assert!(store.passcode_matches("4321").await);

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["system_passcode"], "4321");
    assert!(written.get("valid_card_uids").is_some());
    assert!(written.get("fingerprint_ids").is_some());
}

#[tokio::test]
async fn test_duplicates_are_collapsed_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");
    std::fs::write(
        &path,
        r#"{"system_passcode": "1234", "valid_card_uids": [[1,2,3,4],[1,2,3,4]], "fingerprint_ids": [2,2,5]}"#,
    )
    .unwrap();

    let store = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["valid_card_uids"], serde_json::json!([[1, 2, 3, 4]]));
    assert_eq!(written["fingerprint_ids"], serde_json::json!([2, 5]));
    assert_eq!(
        serde_json::to_value(store.snapshot().await).unwrap(),
        written
    );
}

#[tokio::test]
async fn test_mutations_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");

    {
        let store = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();
        store.add_card(uid(&[0xde, 0xad, 0xbe, 0xef])).await.unwrap();
        store.remove_card(&uid(&[0x1b, 0x93, 0xf2, 0x3c])).await.unwrap();
        store.add_fingerprint(FingerprintSlot::new(9)).await.unwrap();
        store.set_passcode(Passcode::new("246810").unwrap()).await.unwrap();
    }

    let store = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();
    let credentials = store.snapshot().await;

    assert_eq!(credentials.valid_card_uids, vec![uid(&[0xde, 0xad, 0xbe, 0xef])]);
    assert!(credentials.has_fingerprint(FingerprintSlot::new(9)));
    assert!(store.passcode_matches("246810").await);
}

#[rstest]
#[case(r#"{"system_passcode": "12"}"#)]
#[case(r#"{"valid_card_uids": [[1, 2]]}"#)]
#[case(r#"[1, 2, 3]"#)]
#[tokio::test]
async fn test_invalid_document_is_reported(#[case] contents: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");
    std::fs::write(&path, contents).unwrap();

    let error = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap_err();
    assert!(matches!(error, StorageError::Corrupt(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
}

#[tokio::test]
async fn test_concurrent_adds_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admin_data.json");
    let store = Arc::new(CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap());

    const NUM_CONCURRENT_TASKS: u8 = 8;
    let barrier = Arc::new(Barrier::new(NUM_CONCURRENT_TASKS as usize));
    let mut handles = vec![];

    for i in 0..NUM_CONCURRENT_TASKS {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.add_card(uid(&[0x10, 0x20, 0x30, i])).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let reopened = CredentialStore::open(JsonFileBackend::new(&path)).await.unwrap();
    assert_eq!(
        reopened.snapshot().await.valid_card_uids.len(),
        1 + NUM_CONCURRENT_TASKS as usize
    );
}
