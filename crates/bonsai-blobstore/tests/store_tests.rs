//! End-to-end tests for the changeset store

use std::sync::Arc;

use bonsai_blobstore::{
    Blake3Engine, Blobstore, ChangesetStore, HashingEngine, MemBlobstore, StoreConfig, StoreError,
};
use bonsai_test_utils::{changeset_id, sample_changeset};
use bonsai_types::{BonsaiChangesetMut, DecodeConfig, DecodeError};
use pretty_assertions::assert_eq;

fn store_with(config: StoreConfig) -> (Arc<MemBlobstore>, ChangesetStore) {
    let blobs = Arc::new(MemBlobstore::new());
    let store = ChangesetStore::new(blobs.clone(), config);
    (blobs, store)
}

#[tokio::test]
async fn changeset_roundtrip() {
    let (blobs, store) = store_with(StoreConfig::default());
    let cs = sample_changeset();

    let id = store.put_changeset(&cs).await.unwrap();
    assert_eq!(id, Blake3Engine::new().changeset_id(&cs));
    assert_eq!(store.get_changeset(&id).await.unwrap(), Some(cs));
    assert!(blobs.is_present(&id.blobstore_key("bonsai")).await.unwrap());
}

#[tokio::test]
async fn missing_changeset_is_none() {
    let (_, store) = store_with(StoreConfig::default());
    assert_eq!(store.get_changeset(&changeset_id(7)).await.unwrap(), None);
}

#[tokio::test]
async fn keys_use_configured_prefix() {
    let (blobs, store) = store_with(StoreConfig::new().with_key_prefix("repo0042"));
    let id = store.put_changeset(&sample_changeset()).await.unwrap();
    let key = format!("repo0042.changeset.blake3.{id}");
    assert!(blobs.is_present(&key).await.unwrap());
    assert!(!blobs.is_present(&id.blobstore_key("bonsai")).await.unwrap());
}

#[tokio::test]
async fn swapped_bytes_fail_verification() {
    let (blobs, store) = store_with(StoreConfig::default());
    let id = store.put_changeset(&sample_changeset()).await.unwrap();
    let other = BonsaiChangesetMut::new().with_message("other").freeze().unwrap();
    blobs
        .put(id.blobstore_key("bonsai"), other.to_canonical_bytes())
        .await
        .unwrap();

    let err = store.get_changeset(&id).await.unwrap_err();
    match err {
        StoreError::IntegrityMismatch { expected, actual, .. } => {
            assert_eq!(expected, *id.hash());
            assert_eq!(actual, *Blake3Engine::new().changeset_id(&other).hash());
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[tokio::test]
async fn unverified_reads_still_decode() {
    let (blobs, store) = store_with(StoreConfig::new().with_verify_on_read(false));
    let id = changeset_id(1);
    let other = BonsaiChangesetMut::new().with_message("other").freeze().unwrap();
    blobs
        .put(id.blobstore_key("bonsai"), other.to_canonical_bytes())
        .await
        .unwrap();
    assert_eq!(store.get_changeset(&id).await.unwrap(), Some(other));

    blobs.put(id.blobstore_key("bonsai"), vec![1, 0xff]).await.unwrap();
    assert!(matches!(
        store.get_changeset(&id).await,
        Err(StoreError::Decode { .. })
    ));
}

#[tokio::test]
async fn decode_limits_apply_on_read() {
    let config = StoreConfig::new().with_decode(DecodeConfig::new().with_max_entries(1));
    let (_, store) = store_with(config);
    let id = store.put_changeset(&sample_changeset()).await.unwrap();
    assert!(matches!(
        store.get_changeset(&id).await,
        Err(StoreError::Decode {
            source: DecodeError::LimitExceeded { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn content_roundtrip_and_verification() {
    let (blobs, store) = store_with(StoreConfig::default());
    let id = store.put_content(b"fn main() {}\n".to_vec()).await.unwrap();
    assert_eq!(
        store.get_content(&id).await.unwrap(),
        Some(b"fn main() {}\n".to_vec())
    );

    blobs
        .put(id.blobstore_key("bonsai"), b"tampered".to_vec())
        .await
        .unwrap();
    assert!(matches!(
        store.get_content(&id).await,
        Err(StoreError::IntegrityMismatch { .. })
    ));
}

#[tokio::test]
async fn content_and_changeset_keys_never_collide() {
    let (blobs, store) = store_with(StoreConfig::default());
    let cs = sample_changeset();
    store.put_changeset(&cs).await.unwrap();
    store.put_content(cs.to_canonical_bytes()).await.unwrap();
    assert_eq!(blobs.len(), 2);
}

#[tokio::test]
async fn concurrent_puts_agree_on_id() {
    let (blobs, store) = store_with(StoreConfig::default());
    let cs = sample_changeset();
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            let cs = cs.clone();
            tokio::spawn(async move { store.put_changeset(&cs).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(blobs.len(), 1);
}
