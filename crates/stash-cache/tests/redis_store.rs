//! Integration tests against a real Redis instance.
//!
//! These use testcontainers to spin up Redis, so they are ignored by
//! default; run them with `cargo test -- --ignored` where a container
//! runtime is available.

use std::sync::Arc;
use std::time::Duration;

use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

use stash_cache::{
    CacheLayer, CacheSettings, Customer, CustomerCache, RedisConfig, RedisStoreClient, StoreClient,
    StoreOp,
};

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn settings_for(url: String) -> CacheSettings {
    CacheSettings {
        redis: RedisConfig {
            url,
            pool_size: 5,
            timeout_ms: 5000,
        },
        ..CacheSettings::default()
    }
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_store_client_round_trip() {
    let url = get_redis_url().await;
    let client = RedisStoreClient::connect(&RedisConfig {
        url,
        pool_size: 5,
        timeout_ms: 5000,
    })
    .await
    .expect("connect");

    client
        .set_with_expiry("it:round_trip", b"value", Duration::from_secs(60))
        .await
        .expect("set");
    assert_eq!(
        client.get("it:round_trip").await.expect("get"),
        Some(b"value".to_vec())
    );

    client.delete("it:round_trip").await.expect("delete");
    assert_eq!(client.get("it:round_trip").await.expect("get"), None);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_pipeline_applies_all_ops() {
    let url = get_redis_url().await;
    let client = RedisStoreClient::connect(&RedisConfig {
        url,
        pool_size: 5,
        timeout_ms: 5000,
    })
    .await
    .expect("connect");

    client
        .pipeline(&[
            StoreOp::Set {
                key: "it:pipe_a".to_string(),
                value: b"a".to_vec(),
                ttl: Duration::from_secs(60),
            },
            StoreOp::Set {
                key: "it:pipe_b".to_string(),
                value: b"b".to_vec(),
                ttl: Duration::from_secs(60),
            },
            StoreOp::Delete {
                key: "it:pipe_a".to_string(),
            },
        ])
        .await
        .expect("pipeline");

    assert_eq!(client.get("it:pipe_a").await.expect("get"), None);
    assert_eq!(
        client.get("it:pipe_b").await.expect("get"),
        Some(b"b".to_vec())
    );
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_ttl_expires_entries() {
    let url = get_redis_url().await;
    let client = RedisStoreClient::connect(&RedisConfig {
        url,
        pool_size: 5,
        timeout_ms: 5000,
    })
    .await
    .expect("connect");

    client
        .set_with_expiry("it:expiring", b"soon", Duration::from_secs(1))
        .await
        .expect("set");
    assert!(client.get("it:expiring").await.expect("get").is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(client.get("it:expiring").await.expect("get"), None);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_layer_end_to_end() {
    let url = get_redis_url().await;
    let store = RedisStoreClient::connect(&RedisConfig {
        url: url.clone(),
        pool_size: 5,
        timeout_ms: 5000,
    })
    .await
    .expect("connect");

    let mut settings = settings_for(url);
    settings.queue.flush_interval_ms = 50;
    let layer = CacheLayer::with_store(Arc::new(store) as _, settings);
    let customers = CustomerCache::new(&layer);

    let alice = Customer {
        id: "cust_e2e".to_string(),
        email: "a@b.com".to_string(),
        display_name: Some("Alice".to_string()),
    };
    customers.set(&alice);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(customers.get("cust_e2e").await, Some(alice));

    layer.shutdown().await;
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_connect_failure_is_a_connectivity_error() {
    let err = RedisStoreClient::connect(&RedisConfig {
        url: "redis://127.0.0.1:1".to_string(),
        pool_size: 2,
        timeout_ms: 500,
    })
    .await
    .expect_err("nothing listens on port 1");
    assert!(err.is_connectivity());
}
