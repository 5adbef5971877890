//! Manifest reading
//!
//! A package manifest is a tab-separated export in which any field may hold
//! an `s3://` locator. The first two locators in the file describe the
//! manifest itself and are never downloaded.

use crate::error::FetchError;
use ndafetch_types::{ObjectReference, REMOTE_SCHEME_PREFIX};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of leading references that belong to the manifest header
pub const MANIFEST_HEADER_REFERENCES: usize = 2;

/// Extracts object references from a tab-delimited manifest
#[derive(Debug, Clone)]
pub struct ManifestReader {
    path: PathBuf,
}

impl ManifestReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the manifest from disk.
    ///
    /// The file is re-read on every call so each iteration sees what is on
    /// disk rather than a cached copy.
    pub async fn read(&self) -> Result<Vec<ObjectReference>, FetchError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::manifest(&self.path, e.to_string()))?;

        let references = parse_references(&content);
        debug!(
            "Manifest {} lists {} object reference(s)",
            self.path.display(),
            references.len()
        );

        if references.is_empty() {
            return Err(FetchError::manifest(
                &self.path,
                "no object references after the header rows",
            ));
        }

        Ok(references)
    }
}

/// Collect every scheme-prefixed field in row-then-field order, minus the header matches
pub fn parse_references(content: &str) -> Vec<ObjectReference> {
    content
        .lines()
        .flat_map(|line| line.split('\t'))
        .map(clean_field)
        .filter(|field| field.starts_with(REMOTE_SCHEME_PREFIX))
        .skip(MANIFEST_HEADER_REFERENCES)
        .map(ObjectReference::new)
        .collect()
}

fn clean_field(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}
