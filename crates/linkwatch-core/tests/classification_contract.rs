//! Contract: IP-to-service classification and allow-list registration
//!
//! Constraints verified:
//! - Priority order is fixed and deterministic (fibre > cable > cellular)
//! - An IP matching no allow-list classifies as unknown
//! - Concurrent registrations for different services lose neither fragment
//! - The document survives restarts and is never left corrupt

use linkwatch_core::classify::{AllowListStore, ServiceKind};
use tempfile::tempdir;

#[tokio::test]
async fn higher_priority_service_wins_regardless_of_lower_lists() {
    let dir = tempdir().unwrap();
    let store = AllowListStore::new(dir.path().join("ips.json"));

    store.register_ip(ServiceKind::Fibre, "1.2.3.").await.unwrap();
    store.register_ip(ServiceKind::Cable, "5.6.7.").await.unwrap();
    // cable list also matching the fibre IP must not matter
    store.register_ip(ServiceKind::Cable, "1.2.3.").await.unwrap();

    let classification = store.classify("1.2.3.4").await.unwrap();
    assert_eq!(classification.service, Some(ServiceKind::Fibre));

    let classification = store.classify("5.6.7.8").await.unwrap();
    assert_eq!(classification.service, Some(ServiceKind::Cable));
}

#[tokio::test]
async fn unmatched_ip_is_unknown() {
    let dir = tempdir().unwrap();
    let store = AllowListStore::new(dir.path().join("ips.json"));

    store.register_ip(ServiceKind::Fibre, "1.2.3.").await.unwrap();
    store.register_ip(ServiceKind::Cable, "5.6.7.").await.unwrap();

    let classification = store.classify("9.9.9.9").await.unwrap();
    assert_eq!(classification.service, None);
}

#[tokio::test]
async fn concurrent_registrations_for_different_services_keep_both() {
    let dir = tempdir().unwrap();
    let store = AllowListStore::new(dir.path().join("ips.json"));

    let a = store.clone();
    let b = store.clone();
    let (ra, rb) = tokio::join!(
        a.register_ip(ServiceKind::Fibre, "81.223."),
        b.register_ip(ServiceKind::Cellular, "10.20."),
    );
    ra.unwrap();
    rb.unwrap();

    let doc = store.load().await.unwrap();
    assert_eq!(doc.fragments(ServiceKind::Fibre), ["81.223.".to_string()]);
    assert_eq!(doc.fragments(ServiceKind::Cellular), ["10.20.".to_string()]);
}

#[tokio::test]
async fn many_interleaved_registrations_drop_nothing() {
    let dir = tempdir().unwrap();
    let store = AllowListStore::new(dir.path().join("ips.json"));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let kind = ServiceKind::PRIORITY[i % 3];
            store.register_ip(kind, &format!("77.{}.", i)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let doc = store.load().await.unwrap();
    let total: usize = ServiceKind::PRIORITY
        .iter()
        .map(|k| doc.fragments(*k).len())
        .sum();
    assert_eq!(total, 8);
}

#[tokio::test]
async fn registrations_survive_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ips.json");

    {
        let store = AllowListStore::new(&path);
        store.register_ip(ServiceKind::Fibre, "81.223.").await.unwrap();
    }

    // fresh instance, same document
    let store = AllowListStore::new(&path);
    let classification = store.classify("81.223.4.5").await.unwrap();
    assert_eq!(classification.service, Some(ServiceKind::Fibre));

    // and the raw document parses as the documented shape
    let raw = store.raw_json().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["fibreIpAddresses"][0], "81.223.");
}
