use async_trait::async_trait;

use crate::settings::model::Settings;

#[async_trait]
pub trait SettingsPort: Send + Sync {
    async fn load(&self) -> anyhow::Result<Settings>;
    async fn save(&self, settings: &Settings) -> anyhow::Result<()>;
}

#[cfg(test)]
mockall::mock! {
    pub SettingsStore {}

    #[async_trait]
    impl SettingsPort for SettingsStore {
        async fn load(&self) -> anyhow::Result<Settings>;
        async fn save(&self, settings: &Settings) -> anyhow::Result<()>;
    }
}
