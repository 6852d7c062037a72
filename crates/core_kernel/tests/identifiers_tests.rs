//! Tests for strongly-typed identifiers

use core_kernel::{PatientAccountId, ReceivableId, ResourceId, LedgerEntryId};
use uuid::Uuid;

#[test]
fn test_new_generates_unique_ids() {
    assert_ne!(PatientAccountId::new(), PatientAccountId::new());
    assert_ne!(LedgerEntryId::new_v7(), LedgerEntryId::new_v7());
}

#[test]
fn test_prefixes() {
    assert_eq!(PatientAccountId::prefix(), "ACC");
    assert_eq!(ReceivableId::prefix(), "CPC");
    assert_eq!(ResourceId::prefix(), "RSC");
}

#[test]
fn test_v7_ids_are_time_ordered() {
    let first = LedgerEntryId::new_v7();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = LedgerEntryId::new_v7();
    assert!(first < second);
}

#[test]
fn test_json_serialization_is_transparent() {
    let uuid = Uuid::new_v4();
    let id = ResourceId::from_uuid(uuid);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", uuid));
}

#[test]
fn test_invalid_string_rejected() {
    assert!("ACC-not-a-uuid".parse::<PatientAccountId>().is_err());
}
