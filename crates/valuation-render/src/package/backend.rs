use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::model::{FullPackage, PackagePatch};
use crate::config::BackendConfig;

/// Header carrying the service credential on every backend call.
pub const API_KEY_HEADER: &str = "PDF_APP_API_KEY";

/// Backend data API operations the renderer depends on.
#[async_trait]
pub trait PackageBackend: Send + Sync {
    async fn full_package(&self, package_id: &str) -> Result<FullPackage, BackendError>;
    async fn update_package(
        &self,
        package_id: &str,
        patch: &PackagePatch,
    ) -> Result<(), BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unable to build backend client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("backend base url '{0}' cannot carry path segments")]
    BaseUrl(String),
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BackendError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// `reqwest` implementation of [`PackageBackend`].
#[derive(Clone)]
pub struct HttpPackageBackend {
    client: Client,
    base: Url,
    api_key: String,
}

impl HttpPackageBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            client,
            base: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Appends percent-encoded segments to the configured base.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::BaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for HttpPackageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPackageBackend")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PackageBackend for HttpPackageBackend {
    async fn full_package(&self, package_id: &str) -> Result<FullPackage, BackendError> {
        let url = self.endpoint(&["packages", package_id, "full_package"])?;
        debug!(%url, "fetching full package");

        let response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(&url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| BackendError::from_reqwest(&url, err))?;

        serde_json::from_slice(&body).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn update_package(
        &self,
        package_id: &str,
        patch: &PackagePatch,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["packages", package_id])?;
        debug!(%url, "updating package");

        let response = self
            .client
            .put(url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(patch)
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(&url, err))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
