use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::settings::{PortalSettings, LOCAL_APP_PREFIX};
use crate::storage::SettingsStore;

/// Bitrix24 REST methods are addressed as `{endpoint}{method}.json`.
const REST_ENDPOINT_SUFFIX: &str = ".json";
/// Form parameter carrying the access token or session id.
const AUTH_PARAM: &str = "auth";
/// Provider error code signalling an expired access token.
const EXPIRED_TOKEN_CODE: &str = "expired_token";

const INSTALL_SCOPE: &str = "crm,user,placement";

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    /// Bitrix24 may or may not rotate the refresh token.
    pub refresh_token: Option<String>,
}

/// Parameters accepted by the install flow, in either spelling Bitrix24 uses.
#[derive(Debug, Default)]
pub struct InstallRequest {
    pub code: Option<String>,
    pub domain: Option<String>,
    pub member_id: Option<String>,
}

/// Wrapper around the Bitrix24 REST and OAuth APIs.
///
/// Owns the outbound HTTP client (with an explicit request timeout) and the
/// injected settings store. All methods are sequential within one request's
/// handling; the only internal retry is the single refresh-and-retry cycle in
/// [`BitrixService::call`].
#[derive(Clone)]
pub struct BitrixService {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    oauth_url: String,
    store: Arc<dyn SettingsStore>,
}

impl BitrixService {
    pub fn new(config: &Config, store: Arc<dyn SettingsStore>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.bitrix.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            client_id: config.bitrix.client_id.clone(),
            client_secret: config.bitrix.client_secret.clone(),
            oauth_url: config.bitrix.oauth_url.clone(),
            store,
        })
    }

    /// Whether the deployment is registered as a Bitrix24 local application.
    pub fn is_local_app(&self) -> bool {
        self.client_id
            .as_deref()
            .is_some_and(|id| id.starts_with(LOCAL_APP_PREFIX))
    }

    /// Call a Bitrix24 REST method and return the parsed response body.
    ///
    /// `is_auth_call` routes the request to the OAuth endpoint without loading
    /// settings (no installation exists yet during the code exchange).
    /// `override_domain` takes precedence over the stored endpoint when
    /// supplied.
    ///
    /// The caller's params are never mutated; the auth parameter is resolved
    /// into a copy. A caller-supplied `auth` wins, webhook-mode records send
    /// none, and otherwise the stored access token is injected. On an
    /// `expired_token` response the token is refreshed and the request retried
    /// exactly once; a second expiry is fatal and surfaces as a provider
    /// error.
    pub async fn call(
        &self,
        method: &str,
        params: &HashMap<String, String>,
        is_auth_call: bool,
        override_domain: Option<&str>,
    ) -> AppResult<serde_json::Value> {
        if is_auth_call {
            let data = self.post_form(&self.oauth_url, params).await?;
            return into_result(data);
        }

        let settings = self.store.get().await?.ok_or(AppError::NotInstalled)?;

        let endpoint = match override_domain {
            Some(domain) => PortalSettings::rest_endpoint_for(domain),
            None => settings.rest_endpoint().ok_or(AppError::NotInstalled)?,
        };
        let url = format!("{}{}{}", endpoint, method, REST_ENDPOINT_SUFFIX);

        let mut form = params.clone();
        if !form.contains_key(AUTH_PARAM) && !settings.is_preauthorized() {
            match settings.access_token.clone() {
                Some(token) => {
                    form.insert(AUTH_PARAM.to_string(), token);
                }
                // Local apps receive a session id per request instead
                None if settings.is_local_app => {}
                None => return Err(AppError::MissingToken),
            }
        }

        tracing::debug!("Calling Bitrix24 method {} at {}", method, endpoint);
        let data = self.post_form(&url, &form).await?;

        if let Some((code, _)) = provider_error(&data) {
            if code == EXPIRED_TOKEN_CODE {
                tracing::info!("Access token expired; refreshing and retrying once");
                let refreshed = self.refresh_tokens(&settings).await?;
                if let Some(token) = refreshed.access_token {
                    form.insert(AUTH_PARAM.to_string(), token);
                }
                // No second refresh: an expiry on the retry propagates as a
                // provider error like any other failure.
                let retry = self.post_form(&url, &form).await?;
                return into_result(retry);
            }
        }

        into_result(data)
    }

    /// Exchange the refresh token for a new access token and persist the
    /// updated record before returning it.
    pub async fn refresh_tokens(&self, current: &PortalSettings) -> AppResult<PortalSettings> {
        let (client_id, client_secret) = self.resolve_credentials(current)?;
        let refresh_token = current.refresh_token.clone().ok_or(AppError::MissingToken)?;

        let form = HashMap::from([
            ("client_id".to_string(), client_id),
            ("client_secret".to_string(), client_secret),
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token),
        ]);

        let data = self.post_form(&self.oauth_url, &form).await?;
        if let Some((code, description)) = provider_error(&data) {
            let message = if description.is_empty() { code } else { description };
            return Err(AppError::Refresh(message));
        }

        let token: TokenResponse = serde_json::from_value(data)
            .map_err(|e| AppError::Transport(format!("malformed token response: {}", e)))?;

        let updated =
            current.with_refreshed_tokens(token.access_token, token.expires_in, token.refresh_token);
        self.store.put(&updated).await?;

        tracing::info!("Refreshed Bitrix24 access token");
        Ok(updated)
    }

    /// Complete an installation and persist the settings record.
    ///
    /// Local applications are trusted directly: no `code` is required and no
    /// network call is made. Everything else goes through the
    /// authorization-code exchange.
    pub async fn install(&self, request: InstallRequest) -> AppResult<PortalSettings> {
        let domain = request
            .domain
            .ok_or_else(|| AppError::BadRequest("missing installation parameter: domain".to_string()))?;

        if self.is_local_app() && request.code.is_none() {
            let settings = PortalSettings {
                domain: Some(domain.clone()),
                member_id: request.member_id,
                client_endpoint: Some(PortalSettings::rest_endpoint_for(&domain)),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
                is_local_app: true,
                ..Default::default()
            };
            self.store.put(&settings).await?;
            tracing::info!("Local app installation stored for {}", domain);
            return Ok(settings);
        }

        let code = request
            .code
            .ok_or_else(|| AppError::BadRequest("missing installation parameter: code".to_string()))?;
        let (client_id, client_secret) = self.resolve_credentials(&PortalSettings::default())?;

        let auth_params = HashMap::from([
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("client_id".to_string(), client_id.clone()),
            ("client_secret".to_string(), client_secret.clone()),
            ("code".to_string(), code),
            ("scope".to_string(), INSTALL_SCOPE.to_string()),
        ]);

        let data = self.call("", &auth_params, true, None).await?;
        let token: TokenResponse = serde_json::from_value(data)
            .map_err(|e| AppError::Transport(format!("malformed token response: {}", e)))?;

        let settings = PortalSettings {
            domain: Some(domain.clone()),
            member_id: request.member_id,
            client_endpoint: Some(PortalSettings::rest_endpoint_for(&domain)),
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token,
            expires_in: Some(token.expires_in),
            client_id: Some(client_id),
            client_secret: Some(client_secret),
            ..Default::default()
        };
        self.store.put(&settings).await?;

        tracing::info!("Installation completed for {}", domain);
        Ok(settings)
    }

    /// Credentials come from deployment configuration, with the settings
    /// record as a local-development fallback.
    fn resolve_credentials(&self, settings: &PortalSettings) -> AppResult<(String, String)> {
        let client_id = self.client_id.clone().or_else(|| settings.client_id.clone());
        let client_secret = self
            .client_secret
            .clone()
            .or_else(|| settings.client_secret.clone());

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AppError::Config(
                "client credentials not found in environment or settings".to_string(),
            )),
        }
    }

    async fn post_form(
        &self,
        url: &str,
        form: &HashMap<String, String>,
    ) -> AppResult<serde_json::Value> {
        let response = self.client.post(url).form(form).send().await?;
        let data = response.json::<serde_json::Value>().await?;
        Ok(data)
    }
}

fn provider_error(data: &serde_json::Value) -> Option<(String, String)> {
    let code = data.get("error")?.as_str()?.to_string();
    let description = data
        .get("error_description")
        .and_then(|d| d.as_str())
        .unwrap_or_default()
        .to_string();
    Some((code, description))
}

fn into_result(data: serde_json::Value) -> AppResult<serde_json::Value> {
    if let Some((code, description)) = provider_error(&data) {
        return Err(AppError::Provider { code, description });
    }
    Ok(data)
}
