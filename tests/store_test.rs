//! 入庫ログストアの統合テスト

use part_intake::store::{IntakeRequest, RecordStore, SubmissionSink};
use part_intake_common::{EntryPatch, IntakeEntry};
use part_intake::error::IntakeError;
use tempfile::tempdir;

const LEGACY_LOG: &str = r#"[
  {"code":"ABC123","description":"Widget","mmpcPart":"No","quantity":"5","location":"A-01","encodedBy":"kim","reason":"","manual":false,"timestamp":"2025-11-02T08:15:00.000Z"},
  {"code":"SCR-5","description":"Screw","quantity":12,"location":"B-02","timestamp":"2025-11-03T09:00:00.000Z"}
]"#;

fn request(code: &str, quantity: &str) -> IntakeRequest {
    IntakeRequest {
        code: code.into(),
        description: format!("{} part", code),
        quantity: quantity.into(),
        location: "C-03".into(),
        submitted_by: Some("lee".into()),
        ..Default::default()
    }
}

#[test]
fn test_open_creates_empty_log() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(&dir.path().join("db")).unwrap();
    assert!(store.path().exists());
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_legacy_entries_get_persistent_ids() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    std::fs::write(store.path(), LEGACY_LOG).unwrap();

    let first = store.load().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].quantity, 5);
    assert_eq!(first[1].submitted_by, "UNKNOWN");
    assert_eq!(first[1].auxiliary_flag, "No");

    // 2回目の読み込みでも同じIDになる
    let second = store.load().unwrap();
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[1].id, second[1].id);
    assert!(std::fs::read_to_string(store.path()).unwrap().contains("\"id\""));
}

#[test]
fn test_submit_and_list_newest_first() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    std::fs::write(store.path(), LEGACY_LOG).unwrap();

    let receipt = store.submit(request("BRK-1001", "2").validate().unwrap()).unwrap();
    assert!(receipt.message.contains("BRK-1001"));

    let listed = store.list(None).unwrap();
    let codes: Vec<&str> = listed.iter().map(|e| e.code.as_str()).collect();
    assert_eq!(codes, vec!["BRK-1001", "SCR-5", "ABC123"]);
    assert_eq!(listed[0].id, receipt.id);

    assert_eq!(store.list(Some(1)).unwrap().len(), 1);
}

#[test]
fn test_update_keeps_identity() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let receipt = store.submit(request("ABC123", "1").validate().unwrap()).unwrap();
    let before = store.get(receipt.id).unwrap();

    let patch = EntryPatch {
        quantity: Some(9),
        location: Some("Z-99".into()),
        ..Default::default()
    };
    let updated = store.update(receipt.id, &patch).unwrap();

    assert_eq!(updated.id, before.id);
    assert_eq!(updated.timestamp, before.timestamp);
    assert_eq!(updated.code, "ABC123");
    assert_eq!(updated.quantity, 9);
    assert_eq!(updated.location, "Z-99");
    assert_eq!(store.get(receipt.id).unwrap(), updated);
}

#[test]
fn test_delete_by_id_not_position() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let a = store.submit(request("A-1", "1").validate().unwrap()).unwrap();
    let b = store.submit(request("B-2", "1").validate().unwrap()).unwrap();
    let c = store.submit(request("C-3", "1").validate().unwrap()).unwrap();

    let removed = store.delete(b.id).unwrap();
    assert_eq!(removed.code, "B-2");

    let remaining: Vec<IntakeEntry> = store.load().unwrap();
    let ids: Vec<_> = remaining.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a.id, c.id]);

    // 削除済みのIDは他の記録を指さない
    assert!(matches!(store.delete(b.id), Err(IntakeError::EntryNotFound(_))));
}

#[test]
fn test_resolve_id_prefix() {
    let dir = tempdir().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let receipt = store.submit(request("ABC123", "1").validate().unwrap()).unwrap();
    let full = receipt.id.to_string();

    assert_eq!(store.resolve_id(&full[..8]).unwrap(), receipt.id);
    assert_eq!(store.resolve_id(&full.to_uppercase()).unwrap(), receipt.id);
    assert!(matches!(store.resolve_id("  "), Err(IntakeError::Validation(_))));
}

#[test]
fn test_legacy_id_from_list_resolves_in_next_command() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("scans.json"), LEGACY_LOG).unwrap();

    // list と edit は別プロセスでストアを開き直す
    let shown = RecordStore::open(dir.path()).unwrap().list(None).unwrap();
    let prefix = shown[0].id.to_string()[..8].to_string();

    let store = RecordStore::open(dir.path()).unwrap();
    let id = store.resolve_id(&prefix).unwrap();
    assert_eq!(id, shown[0].id);
    assert_eq!(store.get(id).unwrap().code, "SCR-5");
}
