//! Package resolution - references to files, files to signed URLs

use crate::client::PackageClient;
use crate::error::FetchError;
use ndafetch_types::{Batch, FileId, FileRecord, ObjectReference};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Resolves manifest references into a fresh batch of downloadable files
#[derive(Debug, Clone)]
pub struct PackageResolver {
    client: PackageClient,
}

impl PackageResolver {
    pub fn new(client: PackageClient) -> Self {
        Self { client }
    }

    /// Map references to package-file ids and their display names.
    ///
    /// The package may hold only some of the references; the rest are
    /// simply absent from the result.
    pub async fn resolve_identifiers(
        &self,
        references: &[ObjectReference],
    ) -> Result<BTreeMap<FileId, String>, FetchError> {
        let files = self.client.list_files(references).await?;

        if files.len() < references.len() {
            info!(
                "Package {} holds {} of {} requested object(s)",
                self.client.package_id(),
                files.len(),
                references.len()
            );
        }

        Ok(files
            .into_iter()
            .map(|f| (f.package_file_id, f.download_alias))
            .collect())
    }

    /// Fetch signed URLs for every id in one request
    pub async fn resolve_presigned_urls(
        &self,
        ids: &[FileId],
    ) -> Result<BTreeMap<FileId, String>, FetchError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let urls = self.client.presign(ids).await?;
        Ok(urls
            .into_iter()
            .map(|u| (u.package_file_id, u.download_url))
            .collect())
    }

    /// Run both resolution stages and build the batch for this iteration.
    ///
    /// Files the presign call leaves out stay `Pending` with no URL.
    pub async fn resolve_batch(&self, references: &[ObjectReference]) -> Result<Batch, FetchError> {
        let names = self.resolve_identifiers(references).await?;

        let mut batch = Batch::new();
        for (id, name) in names {
            batch.insert(FileRecord::new(id, name));
        }

        let urls = self.resolve_presigned_urls(&batch.ids()).await?;
        for (id, url) in urls {
            match batch.get_mut(&id) {
                Some(record) => record.attach_url(url),
                None => warn!("Presign response names unknown file {}", id),
            }
        }

        let unsigned = batch.iter().filter(|r| r.url().is_none()).count();
        if unsigned > 0 {
            warn!("{} file(s) came back without a download URL", unsigned);
        }

        Ok(batch)
    }
}
