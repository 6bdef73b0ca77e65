pub mod health;
pub mod install;
pub mod placement;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{routing::get, Form, Router};

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health_check))
        .route("/install", get(install::install).post(install::install))
        .route(
            "/placement",
            get(placement::placement).post(placement::placement),
        )
        .with_state(state)
}

/// Bitrix24 sends parameters in the form body or the query string, and under
/// lower- or upper-case names depending on the flow. Merge both sources (the
/// body wins) into one map.
pub(crate) fn merge_params(
    query: HashMap<String, String>,
    form: Option<Form<HashMap<String, String>>>,
) -> HashMap<String, String> {
    let mut params = query;
    if let Some(Form(body)) = form {
        params.extend(body);
    }
    params
}

/// Look a parameter up under any of its accepted spellings.
pub(crate) fn param(params: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| params.get(*name))
        .filter(|value| !value.is_empty())
        .cloned()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::services::bitrix::BitrixService;
    use crate::storage::{MemorySettingsStore, SettingsStore};
    use crate::AppState;

    /// App state wired to a mock OAuth endpoint and an empty in-memory store.
    pub(crate) fn state(
        oauth_url: &str,
        client_id: Option<&str>,
    ) -> (Arc<AppState>, Arc<dyn SettingsStore>) {
        let mut config = Config::default();
        config.bitrix.oauth_url = oauth_url.to_string();
        config.bitrix.client_id = Some(client_id.unwrap_or("app.test").to_string());
        config.bitrix.client_secret = Some("secret".to_string());

        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::default());
        let bitrix = BitrixService::new(&config, store.clone()).unwrap();
        (
            Arc::new(AppState {
                store: store.clone(),
                bitrix,
            }),
            store,
        )
    }
}
