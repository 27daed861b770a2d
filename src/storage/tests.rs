use std::sync::Arc;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tempfile::tempdir;

use super::attachment::storage_file_name;
use super::content::{ContentAddressedStore, ContentDigest, Namespace, StorageKey};
use super::local::{AccessError, LocalFileStorage, Operation};
use super::memory::MemoryStore;
use super::{ObjectStore, ACCESS_WINDOW};
use crate::error::PipelineError;
use crate::ews::extract::RawAttachment;

fn ns(raw: &str) -> Namespace {
    Namespace::parse(raw).unwrap()
}

fn attachment(name: &str, content: &[u8]) -> RawAttachment {
    RawAttachment {
        display_name: name.to_string(),
        content_type: None,
        content: content.to_vec(),
    }
}

#[test]
fn test_digest_matches_sha256() {
    let digest = ContentDigest::of(b"report body");
    let expected = Sha256::digest(b"report body");
    assert_eq!(digest.as_bytes().as_slice(), expected.as_slice());
    assert_eq!(digest.to_base64(), BASE64_STANDARD.encode(expected));
    assert!(!digest.to_url_safe().contains(['+', '/', '=']));
}

#[test]
fn test_key_layout() {
    let digest = ContentDigest::of(b"B");
    let key = StorageKey::new(&ns("u1"), &digest, "report.pdf");
    assert_eq!(
        key.as_str(),
        format!("u1/{}/report.pdf", digest.to_url_safe())
    );
}

#[test]
fn test_storage_file_name() {
    assert_eq!(storage_file_name("report.pdf"), "report.pdf");
    assert_eq!(storage_file_name("scan"), "scan");
    assert!(!storage_file_name("../../etc/passwd").contains('/'));
    assert!(!storage_file_name("a/b\\c.txt").contains(['/', '\\']));
    assert_eq!(storage_file_name(""), "attachment");
    assert_eq!(storage_file_name(".."), "attachment");
}

#[test]
fn test_namespace_is_one_relative_segment() {
    assert_eq!(ns("u1").as_str(), "u1");
    for bad in ["", ".", "..", "../x", "/u1", "u1/", "a/b", "a\\b"] {
        assert!(
            matches!(Namespace::parse(bad), Err(PipelineError::InvalidRequest(_))),
            "accepted {:?}",
            bad
        );
    }
}

#[tokio::test]
async fn test_key_ignores_declared_content_type() {
    let store = ContentAddressedStore::new(Arc::new(MemoryStore::default()));
    let declared = |content_type: &str| RawAttachment {
        display_name: "scan".to_string(),
        content_type: Some(content_type.to_string()),
        content: b"same bytes".to_vec(),
    };

    let png = store.persist(&ns("u1"), declared("image/png"), false).await.unwrap();
    let jpeg = store.persist(&ns("u1"), declared("image/jpeg"), false).await.unwrap();

    assert_eq!(png.storage_key, jpeg.storage_key);
    assert!(png.storage_key.ends_with("/scan"));
}

#[tokio::test]
async fn test_persist_is_idempotent() {
    let backend = Arc::new(MemoryStore::default());
    let store = ContentAddressedStore::new(backend.clone());

    let first = store
        .persist(&ns("u1"), attachment("report.pdf", b"B"), true)
        .await
        .unwrap();
    let second = store
        .persist(&ns("u1"), attachment("report.pdf", b"B"), true)
        .await
        .unwrap();

    assert_eq!(first.storage_key, second.storage_key);
    assert_eq!(first.location_uri, second.location_uri);
    assert_eq!(*backend.writes.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_one_bit_difference_changes_key() {
    let store = ContentAddressedStore::new(Arc::new(MemoryStore::default()));

    let a = store
        .persist(&ns("u1"), attachment("data.bin", &[0b0000_0000]), false)
        .await
        .unwrap();
    let b = store
        .persist(&ns("u1"), attachment("data.bin", &[0b0000_0001]), false)
        .await
        .unwrap();

    assert_ne!(a.content_hash, b.content_hash);
    assert_ne!(a.storage_key, b.storage_key);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let backend = Arc::new(MemoryStore::default());
    let store = ContentAddressedStore::new(backend.clone());

    let result = store
        .persist(&ns("u1"), attachment("report.pdf", b"B"), false)
        .await
        .unwrap();

    assert_eq!(result.content_hash, BASE64_STANDARD.encode(Sha256::digest(b"B")));
    assert!(result.location_uri.is_empty());
    assert!(result.access_descriptor.is_empty());
    assert_eq!(*backend.writes.lock().unwrap(), 0);
    assert!(backend.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_persist_requests_seven_day_grant() {
    let store = ContentAddressedStore::new(Arc::new(MemoryStore::default()));
    let result = store
        .persist(&ns("u1"), attachment("report.pdf", b"B"), true)
        .await
        .unwrap();
    assert!(result
        .access_descriptor
        .ends_with(&format!("?ttl={}", 7 * 24 * 60 * 60)));
}

#[tokio::test]
async fn test_local_upload_if_absent() {
    let dir = tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path().to_path_buf(), b"secret").unwrap();
    let key = StorageKey::new(&ns("u1"), &ContentDigest::of(b"B"), "report.pdf");

    storage.ensure_container(&ns("u1")).await.unwrap();
    storage.ensure_container(&ns("u1")).await.unwrap();
    assert!(dir.path().join("u1").is_dir());

    let first = storage.upload_if_absent(&key, b"B").await.unwrap();
    let second = storage.upload_if_absent(&key, b"B").await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.location, second.location);
    assert_eq!(std::fs::read(storage.path_for(&key).unwrap()).unwrap(), b"B");

    // No staging files left behind.
    let siblings = std::fs::read_dir(storage.path_for(&key).unwrap().parent().unwrap())
        .unwrap()
        .count();
    assert_eq!(siblings, 1);
}

#[tokio::test]
async fn test_local_store_stays_under_base_path() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base");
    let storage = LocalFileStorage::new(base.clone(), b"secret").unwrap();

    let key = StorageKey::new(&ns("u1"), &ContentDigest::of(b"B"), "..");
    assert!(matches!(storage.path_for(&key), Err(PipelineError::Storage { .. })));
    assert!(storage.upload_if_absent(&key, b"B").await.is_err());

    storage.ensure_container(&ns("u1")).await.unwrap();
    assert!(base.join("u1").is_dir());
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_local_location_is_percent_encoded() {
    let dir = tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path().to_path_buf(), b"secret").unwrap();
    let key = StorageKey::new(&ns("u1"), &ContentDigest::of(b"B"), "q1 report #2.pdf");

    let upload = storage.upload_if_absent(&key, b"B").await.unwrap();
    assert!(upload.location.ends_with("/q1%20report%20%232.pdf"));
    assert!(!upload.location.contains(' '));

    let grant = storage.issue_read_url(&key, ACCESS_WINDOW).await.unwrap();
    assert!(grant.starts_with(&format!("{}?", upload.location)));
    let path = storage.authorize(&grant, Operation::Read, Utc::now()).unwrap();
    assert!(path.ends_with("q1 report #2.pdf"));
    assert_eq!(std::fs::read(path).unwrap(), b"B");
}

#[tokio::test]
async fn test_local_grant_is_read_only_for_the_window() {
    let dir = tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path().to_path_buf(), b"secret").unwrap();
    let key = StorageKey::new(&ns("u1"), &ContentDigest::of(b"B"), "report.pdf");
    storage.upload_if_absent(&key, b"B").await.unwrap();

    let before = Utc::now();
    let grant = storage.issue_read_url(&key, ACCESS_WINDOW).await.unwrap();
    let after = Utc::now();
    let window = chrono::Duration::from_std(ACCESS_WINDOW).unwrap();

    let path = storage.authorize(&grant, Operation::Read, after).unwrap();
    assert_eq!(path, storage.path_for(&key).unwrap());
    assert!(storage
        .authorize(&grant, Operation::Read, before + window - chrono::Duration::seconds(1))
        .is_ok());
    assert_eq!(
        storage.authorize(&grant, Operation::Read, after + window + chrono::Duration::seconds(1)),
        Err(AccessError::Expired)
    );

    assert_eq!(
        storage.authorize(&grant, Operation::Write, after),
        Err(AccessError::NotPermitted(Operation::Write))
    );
    assert_eq!(
        storage.authorize(&grant, Operation::Delete, after),
        Err(AccessError::NotPermitted(Operation::Delete))
    );
}

#[tokio::test]
async fn test_local_grant_rejects_tampering() {
    let dir = tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path().to_path_buf(), b"secret").unwrap();
    let key = StorageKey::new(&ns("u1"), &ContentDigest::of(b"B"), "report.pdf");
    let grant = storage.issue_read_url(&key, ACCESS_WINDOW).await.unwrap();

    let widened = grant.replace("sp=r", "sp=rwd");
    assert_eq!(
        storage.authorize(&widened, Operation::Write, Utc::now()),
        Err(AccessError::BadSignature)
    );

    let other = LocalFileStorage::new(dir.path().to_path_buf(), b"other secret").unwrap();
    assert_eq!(
        other.authorize(&grant, Operation::Read, Utc::now()),
        Err(AccessError::BadSignature)
    );

    assert_eq!(
        storage.authorize("https://example.com/x", Operation::Read, Utc::now()),
        Err(AccessError::Unrecognized)
    );
}
