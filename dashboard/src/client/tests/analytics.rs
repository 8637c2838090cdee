//! Analytics snapshot retrieval

use gate::Role;
use serde_json::json;
use warp::Filter;

use super::{backend, client, logged_in};
use crate::client::ErrorKind;
use crate::model::AnalyticsSnapshot;
use crate::model::analytics::tests::snapshot_json;

#[tokio::test]
async fn snapshot_with_bearer_token() {
    let routes = warp::get()
        .and(warp::path!("api" / "auth" / "analytics"))
        .and(warp::header::<String>("authorization"))
        .map(|authorization: String| {
            assert_eq!(authorization, "Bearer t1");
            warp::reply::json(&snapshot_json())
        });

    let client = logged_in(&backend(routes), Role::Admin).await;
    let snapshot = client.analytics().await.unwrap();

    let expected: AnalyticsSnapshot = serde_json::from_value(snapshot_json()).unwrap();
    assert_eq!(snapshot, expected);
    assert_eq!(snapshot.total_attempts, 10);
    assert_eq!(snapshot.recent_attempts.len(), 2);
}

#[tokio::test]
async fn missing_lists_are_empty() {
    let routes = warp::path!("api" / "auth" / "analytics").map(|| {
        warp::reply::json(&json!({
            "total_attempts": 0,
            "successful_attempts": 0,
            "failed_attempts": 0
        }))
    });

    let client = logged_in(&backend(routes), Role::Admin).await;
    let snapshot = client.analytics().await.unwrap();

    assert!(snapshot.recent_attempts.is_empty());
    assert!(snapshot.hourly_attempts.is_empty());
}

#[tokio::test]
async fn malformed_payload() {
    let routes = warp::path!("api" / "auth" / "analytics")
        .map(|| warp::reply::json(&json!({ "total_attempts": "many" })));

    let client = logged_in(&backend(routes), Role::Admin).await;
    let err = client.analytics().await.unwrap_err();

    assert!(matches!(err, ErrorKind::MalformedResponse(_)), "{err:?}");
    assert!(client.store().current().is_some());
}

#[tokio::test]
async fn unreachable_backend() {
    // Port freed right away, nothing listens there anymore
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = logged_in(&format!("http://{addr}"), Role::Admin).await;
    let err = client.analytics().await.unwrap_err();

    assert!(matches!(err, ErrorKind::NetworkFailure(_)), "{err:?}");
    assert!(client.store().current().is_some());
}

#[tokio::test]
async fn anonymous_client_has_no_analytics() {
    let client = client("http://127.0.0.1:1").await;
    assert_eq!(client.analytics().await.unwrap_err(), ErrorKind::Unauthenticated);
}
