//! Use case for updating widget settings
//! 更新组件设置的用例

use std::sync::Arc;

use anyhow::Result;
use hk_core::ports::SettingsPort;
use hk_core::settings::model::{ConnectionSettings, Settings, CURRENT_SCHEMA_VERSION};
use tracing::{info, info_span, Instrument};

/// Use case for updating widget settings.
///
/// ## Behavior / 行为
/// - Loads current settings for comparison
/// - Validates schema version and connection values
/// - Logs changed fields with old/new values
/// - Persists settings through the settings port
///
/// Controllers read settings only at spawn time; changes apply to widgets
/// created afterwards.
pub struct UpdateSettings {
    settings: Arc<dyn SettingsPort>,
}

impl UpdateSettings {
    pub fn new(settings: Arc<dyn SettingsPort>) -> Self {
        Self { settings }
    }

    pub async fn execute(&self, settings: Settings) -> Result<()> {
        let span = info_span!("usecase.update_settings.execute");

        async {
            if settings.schema_version != CURRENT_SCHEMA_VERSION {
                return Err(anyhow::anyhow!(
                    "Invalid schema version: expected {}, got {}",
                    CURRENT_SCHEMA_VERSION,
                    settings.schema_version
                ));
            }
            validate_connection(&settings.connection)?;

            let old_settings = self.settings.load().await?;
            let changes = diff_connection(&old_settings.connection, &settings.connection);
            if changes.is_empty() {
                info!("Updating settings (no changes detected)");
            } else {
                info!(changed_fields = %changes.join(", "), "Updating settings");
            }

            self.settings.save(&settings).await?;

            info!("Settings updated successfully");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

fn validate_connection(connection: &ConnectionSettings) -> Result<()> {
    if connection.sync_timeout_secs == 0 {
        anyhow::bail!("connection.sync_timeout_secs must be at least 1");
    }
    if connection.event_queue_capacity == 0 {
        anyhow::bail!("connection.event_queue_capacity must be at least 1");
    }
    let retry = &connection.refresh_retry;
    if retry.max_delay_ms < retry.initial_delay_ms {
        anyhow::bail!(
            "connection.refresh_retry.max_delay_ms ({}) is below initial_delay_ms ({})",
            retry.max_delay_ms,
            retry.initial_delay_ms
        );
    }
    Ok(())
}

fn diff_connection(old: &ConnectionSettings, new: &ConnectionSettings) -> Vec<String> {
    let mut changes = Vec::new();
    track(&mut changes, "sync_timeout_secs", &old.sync_timeout_secs, &new.sync_timeout_secs);
    track(
        &mut changes,
        "event_queue_capacity",
        &old.event_queue_capacity,
        &new.event_queue_capacity,
    );
    let (old_retry, new_retry) = (&old.refresh_retry, &new.refresh_retry);
    track(
        &mut changes,
        "refresh_retry.max_attempts",
        &old_retry.max_attempts,
        &new_retry.max_attempts,
    );
    track(
        &mut changes,
        "refresh_retry.initial_delay_ms",
        &old_retry.initial_delay_ms,
        &new_retry.initial_delay_ms,
    );
    track(
        &mut changes,
        "refresh_retry.max_delay_ms",
        &old_retry.max_delay_ms,
        &new_retry.max_delay_ms,
    );
    changes
}

fn track<T: PartialEq + std::fmt::Debug>(changes: &mut Vec<String>, field: &str, old: &T, new: &T) {
    if old != new {
        changes.push(format!("connection.{field}: {old:?} -> {new:?}"));
    }
}
