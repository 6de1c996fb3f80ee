//! Fencing tokens, lock extension and holder checks

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use quorlock_core::{FencedResource, FencingMode, LockError, LockOptions, LockStore};

#[tokio::test]
async fn test_local_fencing_tokens_increase() {
    let stores = memory_stores(3);
    let manager = manager(
        as_dyn(&stores),
        fast_config(3, 10).with_fencing(FencingMode::Local),
    );

    let first = manager.lock("orders", LockOptions::new()).await.unwrap();
    assert_eq!(first.fence_token(), Some(1));
    manager.unlock(&first).await.unwrap();

    let second = manager.lock("orders", LockOptions::new()).await.unwrap();
    assert_eq!(second.fence_token(), Some(2));

    // Sequences are per name
    let other = manager.lock("invoices", LockOptions::new()).await.unwrap();
    assert_eq!(other.fence_token(), Some(1));
}

#[tokio::test]
async fn test_store_fencing_shared_across_managers() {
    let stores = memory_stores(3);
    let config = fast_config(3, 10).with_fencing(FencingMode::Store(0));
    let a = manager(as_dyn(&stores), config.clone());
    let b = manager(as_dyn(&stores), config);

    let resource = FencedResource::new(Vec::<String>::new());

    let lock_a = a
        .lock("orders", LockOptions::new().with_validity(Duration::from_millis(40)))
        .await
        .unwrap();
    let fence_a = lock_a.fence_token().unwrap();

    // Holder A stalls past its lease; B takes over and writes
    tokio::time::sleep(Duration::from_millis(60)).await;
    let lock_b = b.lock("orders", LockOptions::new()).await.unwrap();
    let fence_b = lock_b.fence_token().unwrap();
    assert!(fence_b > fence_a);

    resource
        .write(fence_b, |log| log.push("b".to_string()))
        .unwrap();

    // A wakes up and tries to write with its old token
    let err = resource
        .write(fence_a, |log| log.push("a".to_string()))
        .unwrap_err();
    assert!(matches!(err, LockError::StaleFencingToken { .. }));
    resource.read(|log| assert_eq!(log, &vec!["b".to_string()]));
}

#[tokio::test]
async fn test_unavailable_fencing_store_fails_acquisition() {
    let healthy = memory_stores(2);
    let mut stores = failing_stores(1);
    stores.extend(as_dyn(&healthy));
    let manager = manager(stores, fast_config(2, 5).with_fencing(FencingMode::Store(0)));

    let result = manager.lock("orders", LockOptions::new()).await;

    assert!(matches!(result, Err(LockError::AcquireFailed { attempts: 2, .. })));
    // Quorum was reached on every attempt but each grant was rolled back
    assert_eq!(holders(&healthy, "orders"), 0);
}

#[tokio::test]
async fn test_extend_keeps_lock_alive() {
    let stores = memory_stores(3);
    let owner = manager(as_dyn(&stores), fast_config(1, 10));
    let contender = manager(as_dyn(&stores), fast_config(1, 10));

    let lock = owner
        .lock("orders", LockOptions::new().with_validity(Duration::from_millis(100)))
        .await
        .unwrap();
    let extended = owner.extend(&lock, Duration::from_secs(5)).await.unwrap();

    assert_eq!(extended.token(), lock.token());
    assert!(extended.validity() > Duration::from_millis(4900));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(lock.is_expired());
    assert!(owner.is_held(&extended).await.unwrap());

    let result = contender.lock("orders", LockOptions::new()).await;
    assert!(matches!(result, Err(LockError::AcquireFailed { .. })));
    assert_eq!(owner.stats().extensions, 1);
}

#[tokio::test]
async fn test_extend_expired_lock_rejected() {
    let stores = memory_stores(3);
    let manager = manager(as_dyn(&stores), fast_config(1, 10));

    let lock = manager
        .lock("orders", LockOptions::new().with_validity(Duration::from_millis(20)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let result = manager.extend(&lock, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(LockError::LockExpired { .. })));
}

#[tokio::test]
async fn test_extend_released_lock_fails() {
    let stores = memory_stores(3);
    let manager = manager(as_dyn(&stores), fast_config(1, 10));

    let lock = manager.lock("orders", LockOptions::new()).await.unwrap();
    manager.unlock(&lock).await.unwrap();

    let result = manager.extend(&lock, Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(LockError::ExtendFailed {
            extended: 0,
            quorum: 2,
            ..
        })
    ));
}

#[tokio::test]
async fn test_is_held_tracks_store_state() {
    let healthy = memory_stores(2);
    let mut stores = as_dyn(&healthy);
    stores.extend(failing_stores(1));
    let manager = manager(stores, fast_config(1, 10));

    let lock = manager.lock("orders", LockOptions::new()).await.unwrap();
    assert!(manager.is_held(&lock).await.unwrap());

    // Losing one healthy store's entry drops below quorum
    healthy[0]
        .release_if_matches("orders", lock.token())
        .await
        .unwrap();
    assert!(!manager.is_held(&lock).await.unwrap());
}

#[tokio::test]
async fn test_fenced_resource_shared_between_tasks() {
    let resource = Arc::new(FencedResource::new(0u64));

    let mut handles = Vec::new();
    for fence in 1..=50u64 {
        let resource = resource.clone();
        handles.push(tokio::spawn(async move {
            resource.write(fence, |value| *value = fence).is_ok()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Whatever the interleaving, the highest token always wins last
    assert_eq!(resource.last_accepted(), 50);
    assert_eq!(resource.read(|value| *value), 50);
}
