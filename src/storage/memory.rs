use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SettingsStore;
use crate::error::AppResult;
use crate::settings::PortalSettings;

/// In-process settings store used when no `DATABASE_URL` is configured.
///
/// Not durable across restarts — development fallback only, never the
/// production path.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: RwLock<Option<PortalSettings>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn put(&self, settings: &PortalSettings) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        *guard = Some(settings.clone());
        Ok(())
    }

    async fn get(&self) -> AppResult<Option<PortalSettings>> {
        Ok(self.inner.read().await.clone())
    }
}
