use std::path::Path;

use crate::dao::ConfigDao;
use crate::error::StorageError;
use crate::models::Config;
use crate::writer::Storage;

/// A previous release stored configuration as a loose JSON file next to
/// the binary. On first startup against a fresh database, pull that file
/// in once and rename it out of the way so it is never re-imported
/// (SPEC_FULL.md §4.3).
pub async fn import_if_present(storage: &Storage, legacy_path: impl AsRef<Path>) -> Result<bool, StorageError> {
    let legacy_path = legacy_path.as_ref();
    if !legacy_path.exists() {
        return Ok(false);
    }

    let raw = std::fs::read_to_string(legacy_path)
        .map_err(|e| StorageError::LegacyImport(format!("reading {}: {e}", legacy_path.display())))?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|e| StorageError::LegacyImport(format!("parsing {}: {e}", legacy_path.display())))?;

    ConfigDao::new(storage).save(config).await?;

    let backup_path = legacy_path.with_extension("json.imported");
    std::fs::rename(legacy_path, &backup_path)
        .map_err(|e| StorageError::LegacyImport(format!("renaming {}: {e}", legacy_path.display())))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn imports_legacy_config_and_renames_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_path = dir.path().join("flipper-config.json");
        std::fs::write(
            &legacy_path,
            r#"{"client_user_agent":"old-agent/0.1","rate_per_sec":10.0,"burst":20.0,"access_token":null,"refresh_token":null,"token_expires_at":null,"alert_cooldown_seconds":7200}"#,
        )
        .unwrap();

        let storage = Storage::open_in_memory().unwrap();
        let imported = import_if_present(&storage, &legacy_path).await.unwrap();
        assert!(imported);
        assert!(!legacy_path.exists());
        assert!(legacy_path.with_extension("json.imported").exists());

        let config = ConfigDao::new(&storage).load().await.unwrap();
        assert_eq!(config.client_user_agent, "old-agent/0.1");
        assert_eq!(config.alert_cooldown_seconds, 7200);
    }

    #[tokio::test]
    async fn returns_false_when_no_legacy_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_in_memory().unwrap();
        let imported = import_if_present(&storage, dir.path().join("missing.json")).await.unwrap();
        assert!(!imported);
    }
}
