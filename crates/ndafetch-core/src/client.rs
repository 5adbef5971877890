//! Package API client
//!
//! Thin wrapper over the three package endpoints. Every request carries the
//! session headers; status and body checks happen here so callers only see
//! decoded values or a typed error.

use crate::error::FetchError;
use crate::session::Session;
use ndafetch_types::{FileId, ObjectReference};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Longest slice of an error body echoed into diagnostics
const ERROR_BODY_PREVIEW: usize = 200;

/// A file entry returned by `POST /package/{id}/files`
#[derive(Debug, Clone, Deserialize)]
pub struct PackageFile {
    pub package_file_id: FileId,
    pub download_alias: String,
}

/// A signed URL returned by the batch presign endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUrl {
    pub package_file_id: FileId,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
struct PresignResponse {
    #[serde(rename = "presignedUrls")]
    presigned_urls: Vec<PresignedUrl>,
}

/// Client for one package on the package API
#[derive(Debug, Clone)]
pub struct PackageClient {
    client: Client,
    session: Session,
    base_url: Url,
    package_id: String,
}

impl PackageClient {
    pub fn new(session: Session, base_url: Url, package_id: String) -> Result<Self, FetchError> {
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Config(format!(
                "API base URL '{}' cannot hold a path",
                base_url
            )));
        }

        let client = Client::builder()
            .default_headers(session.headers().clone())
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            session,
            base_url,
            package_id,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Probe `GET /package/auth`; any non-success status is an auth failure
    pub async fn authenticate(&self) -> Result<(), FetchError> {
        let url = self.endpoint(&["package", "auth"]);
        debug!("Authenticating {} against {}", self.session.username(), url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Authentication failed with status {}", status);
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }

        info!("Authenticated as {}", self.session.username());
        Ok(())
    }

    /// Map object references to the package files that hold them
    pub async fn list_files(
        &self,
        references: &[ObjectReference],
    ) -> Result<Vec<PackageFile>, FetchError> {
        let url = self.endpoint(&["package", &self.package_id, "files"]);
        let response = self.client.post(url).json(references).send().await?;
        decode(response, FetchError::Resolution).await
    }

    /// Request signed download URLs for the given files in one call
    pub async fn presign(&self, ids: &[FileId]) -> Result<Vec<PresignedUrl>, FetchError> {
        let url = self.endpoint(&[
            "package",
            &self.package_id,
            "files",
            "batchGeneratePresignedUrls",
        ]);
        let response = self.client.post(url).json(ids).send().await?;
        let body: PresignResponse = decode(response, FetchError::Presign).await?;
        Ok(body.presigned_urls)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Check the status and decode a JSON body, wrapping failures with `wrap`
async fn decode<T: DeserializeOwned>(
    response: Response,
    wrap: fn(String) -> FetchError,
) -> Result<T, FetchError> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await?;

    if !status.is_success() {
        let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
        return Err(wrap(format!("{} returned {}: {}", url.path(), status, preview)));
    }

    serde_json::from_str(&body)
        .map_err(|e| wrap(format!("malformed response from {}: {}", url.path(), e)))
}
