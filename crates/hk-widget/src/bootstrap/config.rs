//! # Settings loading / 配置加载
//!
//! Resolves where the settings file lives, loads it for new cards and saves
//! host edits through the `UpdateSettings` use case. A missing file yields
//! defaults; a malformed one is an error carrying the path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hk_app::usecases::UpdateSettings;
use hk_core::ports::SettingsPort;
use hk_core::settings::model::Settings;
use hk_infra::settings::{default_settings_path, FileSettingsRepository};
use tracing::{info_span, Instrument};

/// Explicit path if given, otherwise the platform default.
pub fn resolve_settings_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_settings_path)
}

pub async fn load_settings(explicit: Option<PathBuf>) -> anyhow::Result<Settings> {
    let path = resolve_settings_path(explicit);
    let span = info_span!("bootstrap.load_settings", path = %path.display());

    async {
        let settings = FileSettingsRepository::new(path.clone())
            .load()
            .await
            .with_context(|| format!("Failed to load settings: {}", path.display()))?;
        tracing::info!(
            sync_timeout_secs = settings.connection.sync_timeout_secs,
            event_queue_capacity = settings.connection.event_queue_capacity,
            "widget settings loaded"
        );
        Ok(settings)
    }
    .instrument(span)
    .await
}

/// Validate and persist settings edited by the host.
///
/// Cards already on screen keep the values they were created with.
pub async fn save_settings(explicit: Option<PathBuf>, settings: Settings) -> anyhow::Result<()> {
    let path = resolve_settings_path(explicit);
    let repo = Arc::new(FileSettingsRepository::new(path.clone()));
    UpdateSettings::new(repo)
        .execute(settings)
        .await
        .with_context(|| format!("Failed to save settings: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn loads_connection_section() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            [connection]
            sync_timeout_secs = 15
            event_queue_capacity = 4
            "#,
        )
        .unwrap();

        let settings = load_settings(Some(file.path().to_path_buf())).await.unwrap();

        assert_eq!(settings.connection.sync_timeout_secs, 15);
        assert_eq!(settings.connection.event_queue_capacity, 4);
    }

    #[tokio::test]
    async fn malformed_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"connection = [").unwrap();

        let err = load_settings(Some(file.path().to_path_buf())).await.unwrap_err();

        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }

    #[tokio::test]
    async fn saved_settings_are_loaded_by_the_next_card() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heka").join("settings.toml");
        let mut settings = Settings::default();
        settings.connection.sync_timeout_secs = 45;

        save_settings(Some(path.clone()), settings).await.unwrap();

        let loaded = load_settings(Some(path)).await.unwrap();
        assert_eq!(loaded.connection.sync_timeout_secs, 45);
    }

    #[tokio::test]
    async fn invalid_edit_is_rejected_and_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.connection.event_queue_capacity = 0;

        let err = save_settings(Some(path.clone()), settings).await.unwrap_err();

        assert!(format!("{err:#}").contains("event_queue_capacity"));
        assert!(!path.exists());
    }

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/tmp/heka/custom.toml");
        assert_eq!(resolve_settings_path(Some(path.clone())), path);
    }
}
