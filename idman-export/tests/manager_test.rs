use std::sync::Arc;

use idman_backup::collector::IdentityCollector;
use idman_backup::storage::StorageEngine;
use idman_export::convert::ExportFormat;
use idman_export::manager::{validate_backup_data, ExportImportManager};
use test_fixtures::{account, group, permission_set, user, MemoryDirectory, MemoryStorageBackend};

const INSTANCE: &str = "arn:aws:sso:us-east-1:123456789012:instance/ins-1";

async fn stored_backup() -> (Arc<StorageEngine>, String) {
    let directory = Arc::new(
        MemoryDirectory::new()
            .with_user(user("alice"))
            .with_group(group("devs", &["alice"]))
            .with_permission_set(permission_set("ReadOnlyAccess"))
            .with_account(account("123456789012", "Prod")),
    );
    let backup = IdentityCollector::new(directory, INSTANCE)
        .collect_all()
        .await
        .unwrap();
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    let backup_id = storage.store(backup).await.unwrap();
    (storage, backup_id)
}

#[tokio::test]
async fn export_then_import_mints_a_fresh_id() {
    let (storage, backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage.clone());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");

    manager
        .export_backup(&backup_id, ExportFormat::json(), &path)
        .await
        .unwrap();
    assert!(path.exists());

    let imported_id = manager
        .import_backup(&path, ExportFormat::json())
        .await
        .unwrap();
    assert_ne!(imported_id, backup_id);
    assert!(imported_id.starts_with("imported-"));

    let imported = storage.retrieve(&imported_id).await.unwrap().unwrap();
    assert_eq!(imported.users[0].user_name, "alice");
    assert!(imported.verify_integrity());
    // The original backup remains.
    assert!(storage.retrieve(&backup_id).await.unwrap().is_some());
}

#[tokio::test]
async fn compressed_exports_are_detected_on_import() {
    let (storage, backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage.clone());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.yaml");

    manager
        .export_backup(&backup_id, ExportFormat::yaml().with_compression(), &path)
        .await
        .unwrap();
    let raw = std::fs::read(&path).unwrap();
    assert!(idman_export::compress::is_compressed(&raw));

    // No compression hint needed on the way back in.
    let imported_id = manager
        .import_backup(&path, ExportFormat::yaml())
        .await
        .unwrap();
    assert!(storage.retrieve(&imported_id).await.unwrap().is_some());
}

#[tokio::test]
async fn csv_export_writes_one_file_per_table() {
    let (storage, backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage.clone());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("csv-export");

    manager
        .export_backup(&backup_id, ExportFormat::csv(), &path)
        .await
        .unwrap();
    for table in [
        "users.csv",
        "groups.csv",
        "permission_sets.csv",
        "assignments.csv",
        "metadata.csv",
    ] {
        assert!(path.join(table).exists(), "missing {table}");
    }

    let imported_id = manager
        .import_backup(&path, ExportFormat::csv())
        .await
        .unwrap();
    let imported = storage.retrieve(&imported_id).await.unwrap().unwrap();
    assert_eq!(imported.groups[0].display_name, "devs");
}

#[tokio::test]
async fn convert_format_re_exports_a_stored_backup() {
    let (storage, backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("converted.yaml");
    manager
        .convert_format(&backup_id, ExportFormat::yaml(), &path)
        .await
        .unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("alice"));
}

#[tokio::test]
async fn import_rejects_structurally_invalid_data() {
    let (storage, _backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");

    // A user without an id or name.
    std::fs::write(
        &path,
        serde_json::json!({
            "metadata": idman_core::models::BackupMetadata::new(INSTANCE, "123456789012", "us-east-1"),
            "users": [{"user_id": "", "user_name": ""}],
        })
        .to_string(),
    )
    .unwrap();

    let err = manager
        .import_backup(&path, ExportFormat::json())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VAL_INVALID");
    assert!(err.to_string().contains("missing required fields"));
}

#[tokio::test]
async fn validate_import_reports_without_storing() {
    let (storage, backup_id) = stored_backup().await;
    let manager = ExportImportManager::new(storage.clone());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    manager
        .export_backup(&backup_id, ExportFormat::json(), &path)
        .await
        .unwrap();

    let issues = manager
        .validate_import(&path, ExportFormat::json())
        .await
        .unwrap();
    assert!(issues.is_valid);

    std::fs::write(&path, "{not json").unwrap();
    let issues = manager
        .validate_import(&path, ExportFormat::json())
        .await
        .unwrap();
    assert!(!issues.is_valid);
}

#[tokio::test]
async fn exporting_unknown_backups_fails() {
    let storage = Arc::new(StorageEngine::new(Arc::new(MemoryStorageBackend::new())));
    let manager = ExportImportManager::new(storage);
    let dir = tempfile::tempdir().unwrap();
    let err = manager
        .export_backup(
            "backup-missing",
            ExportFormat::json(),
            &dir.path().join("x.json"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "STORE_NOT_FOUND");
}

#[test]
fn tampered_data_is_flagged_as_a_warning_not_an_error() {
    let mut backup = idman_core::models::BackupData::new(
        idman_core::models::BackupMetadata::new(INSTANCE, "123456789012", "us-east-1"),
    );
    backup.users.push(user("alice"));
    backup.seal();
    backup.users[0].email = Some("tampered@example.com".to_string());

    let issues = validate_backup_data(&backup);
    assert!(issues.is_valid);
    assert!(issues
        .warnings
        .iter()
        .any(|w| w.contains("integrity")));
}
