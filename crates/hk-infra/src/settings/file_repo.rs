use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use hk_core::{
    ports::SettingsPort,
    settings::model::{Settings, CURRENT_SCHEMA_VERSION},
};
use tokio::fs;

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// `<config dir>/heka/settings.toml`, or a relative `settings.toml` when the
/// platform has no config directory.
pub fn default_settings_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("heka").join(SETTINGS_FILE_NAME),
        None => PathBuf::from(SETTINGS_FILE_NAME),
    }
}

/// Settings stored as a TOML document.
pub struct FileSettingsRepository {
    path: PathBuf,
}

impl FileSettingsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create settings dir failed: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn atomic_write(&self, content: &str) -> Result<()> {
        self.ensure_parent_dir().await?;

        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("write temp settings failed: {}", tmp_path.display()))?;

        fs::rename(&tmp_path, &self.path).await.with_context(|| {
            format!(
                "rename temp settings to target failed: {} -> {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

#[async_trait]
impl SettingsPort for FileSettingsRepository {
    /// Missing file yields `Settings::default()`. Documents from an older
    /// schema are upgraded in place.
    async fn load(&self) -> Result<Settings> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "settings file missing, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read settings failed: {}", self.path.display()))
            }
        };

        let mut settings: Settings = toml::from_str(&content)
            .with_context(|| format!("parse settings failed: {}", self.path.display()))?;

        if settings.schema_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "settings schema {} at {} is newer than supported {}",
                settings.schema_version,
                self.path.display(),
                CURRENT_SCHEMA_VERSION
            );
        }
        if settings.schema_version < CURRENT_SCHEMA_VERSION {
            tracing::info!(
                from = settings.schema_version,
                to = CURRENT_SCHEMA_VERSION,
                "upgrading settings schema"
            );
            settings.schema_version = CURRENT_SCHEMA_VERSION;
            self.save(&settings).await?;
        }

        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let content = toml::to_string_pretty(settings).context("serialize settings failed")?;

        self.atomic_write(&content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let repo = FileSettingsRepository::new(dir.path().join("absent.toml"));

        let settings = repo.load().await.unwrap();

        assert_eq!(settings, Settings::default());
        assert!(!repo.path().exists(), "load must not create the file");
    }

    #[tokio::test]
    async fn save_creates_parent_dirs_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let repo = FileSettingsRepository::new(dir.path().join("nested").join("settings.toml"));

        let mut settings = Settings::default();
        settings.connection.sync_timeout_secs = 45;
        settings.connection.refresh_retry.max_attempts = 1;
        repo.save(&settings).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, settings);

        let raw = std::fs::read_to_string(repo.path()).unwrap();
        assert!(raw.contains("[connection.refresh_retry]"), "{raw}");
        assert!(!dir.path().join("nested").join("settings.toml.tmp").exists());
    }

    #[tokio::test]
    async fn parse_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[connection\nsync_timeout_secs = ").unwrap();
        let repo = FileSettingsRepository::new(&path);

        let err = repo.load().await.unwrap_err();

        assert!(format!("{err:#}").contains(&path.display().to_string()));
    }

    #[tokio::test]
    async fn older_schema_is_upgraded_and_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "schema_version = 0\n\n[connection]\nsync_timeout_secs = 10\n")
            .unwrap();
        let repo = FileSettingsRepository::new(&path);

        let settings = repo.load().await.unwrap();

        assert_eq!(settings.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(settings.connection.sync_timeout_secs, 10);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(&format!("schema_version = {CURRENT_SCHEMA_VERSION}")));
    }

    #[tokio::test]
    async fn newer_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "schema_version = 99\n").unwrap();

        assert!(FileSettingsRepository::new(&path).load().await.is_err());
    }

    #[test]
    fn default_path_ends_with_settings_file() {
        assert!(default_settings_path().ends_with(SETTINGS_FILE_NAME));
    }
}
