//! Reachability check against the remote authority.

use std::time::Duration;

use tracing::debug;

use super::client::build_http_client;
use crate::Result;

/// Issues `HEAD /` to tell whether the remote authority is answering.
pub struct ConnectivityProber {
    http: reqwest::Client,
    base_url: String,
}

impl ConnectivityProber {
    /// Build a prober for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// True only when the server answers with a 2xx status.
    pub async fn probe(&self) -> bool {
        match self.http.head(format!("{}/", self.base_url)).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "probe got non-success status");
                false
            }
            Err(err) => {
                debug!(%err, "probe request failed");
                false
            }
        }
    }
}
