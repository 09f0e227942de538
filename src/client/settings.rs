use async_trait::async_trait;
use reqwest::header;
use thiserror::Error;

use crate::models::{SettingsResponse, SystemSettings};

/// Path of the settings read endpoint, relative to the API base URL.
pub const SETTINGS_PATH: &str = "/api/v1/admin/system-settings";

/// SettingsError
///
/// Why a settings fetch failed. The guard never surfaces these to the user.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// For sources that can answer without any settings at all.
    #[error("settings unavailable")]
    Unsuccessful,
}

/// SettingsSource
///
/// Where a mounted guard reads the global settings from. `credential` is the locally
/// stored token, attached so that the read is access-controlled like any other call.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch(&self, credential: Option<&str>) -> Result<SystemSettings, SettingsError>;
}

/// HttpSettingsClient
///
/// `SettingsSource` over HTTP. Keeps a cookie store so a session cookie set by the API
/// travels alongside the bearer header.
#[derive(Clone)]
pub struct HttpSettingsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSettingsClient {
    /// new
    ///
    /// `base_url` is the API origin, e.g. `http://localhost:3001`.
    pub fn new(base_url: &str) -> Result<Self, SettingsError> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SETTINGS_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SettingsSource for HttpSettingsClient {
    async fn fetch(&self, credential: Option<&str>) -> Result<SystemSettings, SettingsError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = credential {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await?
            .error_for_status()?
            .json::<SettingsResponse>()
            .await?;

        // The flag is honored even when the envelope reports failure; a missing
        // `settings` object reads as the defaults (no maintenance).
        if !response.success {
            tracing::debug!(
                maintenance_mode = response.settings.maintenance_mode,
                "settings endpoint reported failure"
            );
        }
        Ok(response.settings)
    }
}
