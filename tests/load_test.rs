//! Concurrent traffic while the backend is being replaced.

use std::time::{Duration, Instant};
use axum::http::StatusCode;

mod common;
use common::{client, fast_config, MockBackend, TestProxy};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_during_backend_switch() {
    let a = MockBackend::fixed("a").await;
    let b = MockBackend::fixed("b").await;
    let proxy = TestProxy::start(fast_config()).await;
    proxy.register.set(&a.url()).unwrap();

    let concurrency = 10;
    let requests_per_task = 20;
    let client = client();
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/load");
        handles.push(tokio::spawn(async move {
            let mut bodies = Vec::new();
            for _ in 0..requests_per_task {
                let res = client.get(&url).send().await.unwrap();
                assert_eq!(res.status(), StatusCode::OK);
                bodies.push(res.text().await.unwrap());
            }
            bodies
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    proxy.register.set(&b.url()).unwrap();

    let mut total = 0;
    for handle in handles {
        for body in handle.await.unwrap() {
            assert!(body == "a" || body == "b", "unexpected body {body:?}");
            total += 1;
        }
    }
    assert_eq!(total, concurrency * requests_per_task);
    assert_eq!(a.calls() + b.calls(), total);

    // Once the update has returned, nothing reaches the old backend.
    let before = a.calls();
    for _ in 0..10 {
        assert_eq!(client.get(proxy.url("/after")).send().await.unwrap().text().await.unwrap(), "b");
    }
    assert_eq!(a.calls(), before);

    println!("{} requests in {:?}", total, start.elapsed());
}
