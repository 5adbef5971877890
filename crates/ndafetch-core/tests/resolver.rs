//! Integration tests for package resolution

mod common;

use common::*;
use httpmock::prelude::*;
use ndafetch_core::{FetchError, PackageResolver};
use ndafetch_types::{FileId, FileStatus, ObjectReference};
use serde_json::json;

fn references() -> Vec<ObjectReference> {
    REFERENCES.iter().map(|r| ObjectReference::new(*r)).collect()
}

#[tokio::test]
async fn test_resolution_is_stable() {
    let server = MockServer::start_async().await;
    mock_package(&server).await;
    let resolver = PackageResolver::new(client(&server));

    let first = resolver.resolve_identifiers(&references()).await.unwrap();
    let second = resolver.resolve_identifiers(&references()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.get(&FileId::Number(102)).map(String::as_str), Some("sub-01/dwi.nii.gz"));
}

#[tokio::test]
async fn test_resolve_batch_attaches_urls() {
    let server = MockServer::start_async().await;
    mock_package(&server).await;
    let resolver = PackageResolver::new(client(&server));

    let batch = resolver.resolve_batch(&references()).await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.count(FileStatus::Resolved), 3);
    assert_eq!(
        batch.get(&FileId::Number(103)).and_then(|r| r.url()),
        Some("https://signed.example/103")
    );
}

#[tokio::test]
async fn test_subset_and_string_ids() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/package/{}/files", PACKAGE_ID));
            then.status(200).json_body(json!([
                {"package_file_id": "f-1", "download_alias": "a.nii"},
            ]));
        })
        .await;
    let presign = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!(
                    "/package/{}/files/batchGeneratePresignedUrls",
                    PACKAGE_ID
                ))
                .json_body(json!(["f-1"]));
            then.status(200).json_body(json!({"presignedUrls": []}));
        })
        .await;
    let resolver = PackageResolver::new(client(&server));

    let batch = resolver.resolve_batch(&references()).await.unwrap();

    assert_eq!(presign.hits_async().await, 1);
    assert_eq!(batch.len(), 1);
    // No URL came back, so the record never left Pending and cannot be
    // downloaded this iteration
    let record = batch.get(&FileId::from("f-1")).unwrap();
    assert_eq!(record.status, FileStatus::Pending);
    assert!(record.url().is_none());
}

#[tokio::test]
async fn test_presign_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/package/{}/files", PACKAGE_ID));
            then.status(200).json_body(json!([
                {"package_file_id": 1, "download_alias": "a.nii"},
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!(
                "/package/{}/files/batchGeneratePresignedUrls",
                PACKAGE_ID
            ));
            then.status(500).body("internal error");
        })
        .await;
    let resolver = PackageResolver::new(client(&server));

    let err = resolver.resolve_batch(&references()).await.unwrap_err();
    assert!(matches!(err, FetchError::Presign(msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_files_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/package/{}/files", PACKAGE_ID));
            then.status(403);
        })
        .await;
    let resolver = PackageResolver::new(client(&server));

    let err = resolver.resolve_identifiers(&references()).await.unwrap_err();
    assert!(matches!(err, FetchError::Resolution(_)));
}
