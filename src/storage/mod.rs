mod memory;
mod sqlite;

pub use memory::MemorySettingsStore;
pub use sqlite::SqliteSettingsStore;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::settings::PortalSettings;

/// Persistence contract for the single portal settings record.
///
/// `put` replaces the whole record; a concurrent reader observes either the
/// old or the new value, never a torn one. There are no transactional
/// guarantees beyond that — last write wins.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn put(&self, settings: &PortalSettings) -> AppResult<()>;

    /// Returns the current record, or `None` if the application has never
    /// been installed.
    async fn get(&self) -> AppResult<Option<PortalSettings>>;
}
