use serde::{Deserialize, Serialize};

/// Fixed key the settings record is stored under. One portal per deployment.
pub const SETTINGS_KEY: &str = "bitrix24_app_settings";

/// Bitrix24 marks locally registered applications with this client id prefix.
pub const LOCAL_APP_PREFIX: &str = "local.";

/// Installation state for one Bitrix24 portal: tokens, domain and credentials.
///
/// There is at most one record per deployment; writes replace the whole record
/// (last write wins, no versioning).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Provider-reported token lifetime in seconds. Bookkeeping only; expiry
    /// is detected through the `expired_token` error code, not a clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Base URL for REST calls. Derived from `domain` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// The endpoint URL itself embeds authorization; no `auth` param is sent.
    #[serde(default)]
    pub is_web_hook: bool,
    /// A per-request session id substitutes for an access token.
    #[serde(default)]
    pub is_local_app: bool,

    /// Opaque installation identifier supplied by Bitrix24. Stored as-is,
    /// never used for auth decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
}

impl PortalSettings {
    /// Standard REST base URL for a portal domain.
    pub fn rest_endpoint_for(domain: &str) -> String {
        format!("https://{}/rest/", domain)
    }

    /// Whether the record is complete enough to make authenticated calls.
    pub fn is_installed(&self) -> bool {
        if self.is_preauthorized() {
            return true;
        }
        if self.is_local_app {
            return self.domain.is_some();
        }
        self.domain.is_some() && self.access_token.is_some() && self.refresh_token.is_some()
    }

    /// Webhook-mode records carry a pre-authorized endpoint.
    pub fn is_preauthorized(&self) -> bool {
        self.is_web_hook && self.client_endpoint.is_some()
    }

    pub fn rest_endpoint(&self) -> Option<String> {
        self.client_endpoint
            .clone()
            .or_else(|| self.domain.as_deref().map(Self::rest_endpoint_for))
    }

    /// Returns a copy of the record with refreshed token material. Bitrix24
    /// does not guarantee refresh-token rotation, so a missing replacement
    /// keeps the current one.
    pub fn with_refreshed_tokens(
        &self,
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
    ) -> Self {
        let mut next = self.clone();
        next.access_token = Some(access_token);
        next.expires_in = Some(expires_in);
        if let Some(refresh_token) = refresh_token {
            next.refresh_token = Some(refresh_token);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_settings() -> PortalSettings {
        PortalSettings {
            domain: Some("foo.example".to_string()),
            access_token: Some("T1".to_string()),
            refresh_token: Some("R1".to_string()),
            expires_in: Some(3600),
            ..Default::default()
        }
    }

    #[test]
    fn rest_endpoint_derived_from_domain() {
        let settings = oauth_settings();
        assert_eq!(
            settings.rest_endpoint().as_deref(),
            Some("https://foo.example/rest/")
        );
    }

    #[test]
    fn explicit_client_endpoint_wins() {
        let mut settings = oauth_settings();
        settings.client_endpoint = Some("https://other.example/rest/".to_string());
        assert_eq!(
            settings.rest_endpoint().as_deref(),
            Some("https://other.example/rest/")
        );
    }

    #[test]
    fn empty_record_is_not_installed() {
        assert!(!PortalSettings::default().is_installed());
    }

    #[test]
    fn oauth_record_requires_both_tokens() {
        let mut settings = oauth_settings();
        assert!(settings.is_installed());

        settings.refresh_token = None;
        assert!(!settings.is_installed());
    }

    #[test]
    fn local_app_needs_no_tokens() {
        let settings = PortalSettings {
            domain: Some("bar.example".to_string()),
            is_local_app: true,
            ..Default::default()
        };
        assert!(settings.is_installed());
    }

    #[test]
    fn webhook_record_requires_endpoint() {
        let mut settings = PortalSettings {
            is_web_hook: true,
            ..Default::default()
        };
        assert!(!settings.is_installed());

        settings.client_endpoint = Some("https://foo.example/rest/1/abc/".to_string());
        assert!(settings.is_installed());
    }

    #[test]
    fn refresh_keeps_old_refresh_token_when_absent() {
        let settings = oauth_settings();
        let refreshed = settings.with_refreshed_tokens("T2".to_string(), 3600, None);

        assert_eq!(refreshed.access_token.as_deref(), Some("T2"));
        assert_eq!(refreshed.refresh_token.as_deref(), Some("R1"));
        // Everything else is carried over untouched
        assert_eq!(refreshed.domain, settings.domain);
    }

    #[test]
    fn refresh_rotates_refresh_token_when_present() {
        let settings = oauth_settings();
        let refreshed =
            settings.with_refreshed_tokens("T2".to_string(), 7200, Some("R2".to_string()));

        assert_eq!(refreshed.refresh_token.as_deref(), Some("R2"));
        assert_eq!(refreshed.expires_in, Some(7200));
    }
}
