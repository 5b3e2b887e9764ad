//! Exercises spec.md §8's pool fairness invariant and §4.F's selection
//! algorithm: never open a new connection while one under
//! `new_connection_threshold` still exists, and do open one once every
//! existing connection is at or over threshold and the pool has room.

mod common;

use common::MockTransporterFactory;
use gremlin_client::{ConnectionConfig, Pool, PoolConfig, Request};

fn pool_config(threshold: usize, max: usize, initial: usize) -> PoolConfig {
    PoolConfig {
        new_connection_threshold: threshold,
        maximum_concurrent_connections: max,
        initial_concurrent_connections: initial,
    }
}

#[tokio::test]
async fn does_not_open_new_connection_while_one_is_under_threshold() {
    let factory = MockTransporterFactory::new();
    let pool = Pool::with_factory(
        "ws://localhost:8182/gremlin",
        pool_config(/* threshold */ 2, /* max */ 3, /* initial */ 1),
        ConnectionConfig::default(),
        false,
        factory.clone(),
    )
    .await
    .expect("pool opens its initial connection");

    assert_eq!(pool.connection_count().await, 1);

    // One in-flight request: still under threshold (2), so the next submit
    // must reuse the same connection rather than opening a second one.
    let _rs1 = pool
        .submit(Request::eval(gremlin_client::Uuid::new_v4(), "g.V()", None))
        .await
        .unwrap();
    assert_eq!(pool.connection_count().await, 1);

    let _rs2 = pool
        .submit(Request::eval(gremlin_client::Uuid::new_v4(), "g.V()", None))
        .await
        .unwrap();
    // Now the sole connection carries 2 in-flight requests, at threshold.
    assert_eq!(pool.connection_count().await, 1);

    // The selection scan observes a connection at (not under) threshold
    // with room under the cap, so this submit opens a second connection
    // rather than piling a third request onto the first.
    let _rs3 = pool
        .submit(Request::eval(gremlin_client::Uuid::new_v4(), "g.V()", None))
        .await
        .unwrap();
    assert_eq!(pool.connection_count().await, 2);
}

#[tokio::test]
async fn session_mode_caps_pool_at_one_connection() {
    let factory = MockTransporterFactory::new();
    let pool = Pool::with_factory(
        "ws://localhost:8182/gremlin",
        pool_config(1, 8, 1),
        ConnectionConfig::default(),
        true,
        factory.clone(),
    )
    .await
    .expect("session pool opens its single connection");

    assert_eq!(pool.connection_count().await, 1);

    for _ in 0..5 {
        pool.submit(Request::eval(gremlin_client::Uuid::new_v4(), "g.V()", None))
            .await
            .unwrap();
    }

    // Session mode forces the cap to 1 regardless of `maximum_concurrent_connections`.
    assert_eq!(pool.connection_count().await, 1);
}

#[tokio::test]
async fn close_is_idempotent_and_drains_connections() {
    let factory = MockTransporterFactory::new();
    let pool = Pool::with_factory(
        "ws://localhost:8182/gremlin",
        pool_config(4, 4, 2),
        ConnectionConfig::default(),
        false,
        factory.clone(),
    )
    .await
    .unwrap();

    assert_eq!(pool.connection_count().await, 2);

    pool.close().await.unwrap();
    assert!(pool.is_closed());
    // Idempotent: a second close must not error or panic.
    pool.close().await.unwrap();

    let err = pool
        .submit(Request::eval(gremlin_client::Uuid::new_v4(), "g.V()", None))
        .await
        .unwrap_err();
    assert!(matches!(err, gremlin_client::Error::Usage(_)));
}
