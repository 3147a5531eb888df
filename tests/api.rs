//! ECP endpoint integration tests

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use fakeroku::store::{StateId, StateStore, StateValue};
use tower::ServiceExt;

mod common;
use common::{memory_dispatcher, test_device, test_router};

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_device_descriptor() {
    let (_, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Living Room", 9093), dispatcher);

    let response = app.oneshot(request("GET", "/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml; charset=utf-8"
    );
    assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "close");

    let body = body_text(response).await;
    assert!(body.contains("<friendlyName>Living Room</friendlyName>"));
    assert!(body.contains("<UDN>uuid:roku:ecp:uuid-living-room</UDN>"));
    assert!(body.contains("<serialNumber>uuid-living-room</serialNumber>"));
}

#[tokio::test]
async fn test_apps_query() {
    let (_, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);

    let response = app.oneshot(request("GET", "/query/apps")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("<app id=\"12\">Netflix</app>"));
    assert!(body.contains("<app id=\"837\">YouTube</app>"));
    assert_eq!(body.matches("<app ").count(), 11);
}

#[tokio::test]
async fn test_unknown_query_is_empty() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);

    let response = app
        .oneshot(request("GET", "/query/device-info"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml; charset=utf-8"
    );
    assert!(body_text(response).await.is_empty());
    assert!(store.history().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_keypress_pulses_key_state() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);
    let id = StateId::new("Den", "keys", "Home");

    let response = app
        .oneshot(request("POST", "/keypress/Home"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.history_for(&id).await, [StateValue::acked(true)]);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        store.history_for(&id).await,
        [StateValue::acked(true), StateValue::acked(false)]
    );

    let object = store.get_object(&id).await.unwrap().unwrap();
    assert_eq!(object.native.url, "keys/Home");
    assert_eq!(object.common.role, "indicator.state");
}

#[tokio::test(start_paused = true)]
async fn test_keydown_keyup_latch() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);
    let id = StateId::new("Den", "keys", "Fwd");

    app.clone()
        .oneshot(request("POST", "/keydown/Fwd"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.get_state(&id).await.unwrap().unwrap().val);

    app.oneshot(request("POST", "/keyup/Fwd")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        store.history_for(&id).await,
        [StateValue::acked(true), StateValue::acked(false)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_launch_normalizes_app_id() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);

    let response = app
        .oneshot(request("POST", "/launch/12.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let id = StateId::new("Den", "apps", "12_5");
    assert_eq!(
        store.history_for(&id).await,
        [StateValue::acked(true), StateValue::acked(false)]
    );
    assert_eq!(store.get_object(&id).await.unwrap().unwrap().native.url, "apps/12_5");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_changes_nothing() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);

    for uri in ["/search/browse", "/keypress", "/", "/query/apps"] {
        let response = app.clone().oneshot(request("POST", uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(store.history().await.is_empty());
    assert_eq!(store.creations().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_devices_are_isolated() {
    let (store, dispatcher) = memory_dispatcher();
    let den = test_router(test_device("Den", 9093), dispatcher.clone());
    let hall = test_router(test_device("Hall", 9094), dispatcher);

    den.oneshot(request("POST", "/keydown/Up")).await.unwrap();
    hall.oneshot(request("POST", "/keyup/Up")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let den_state = store.get_state(&StateId::new("Den", "keys", "Up")).await.unwrap();
    let hall_state = store.get_state(&StateId::new("Hall", "keys", "Up")).await.unwrap();
    assert!(den_state.unwrap().val);
    assert!(!hall_state.unwrap().val);
}

#[tokio::test(start_paused = true)]
async fn test_large_command_body_is_accepted() {
    let (store, dispatcher) = memory_dispatcher();
    let app = test_router(test_device("Den", 9093), dispatcher);

    let request = Request::builder()
        .method("POST")
        .uri("/keydown/Select")
        .body(Body::from(vec![b'x'; 3 * 1024 * 1024]))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let id = StateId::new("Den", "keys", "Select");
    assert_eq!(store.history_for(&id).await, [StateValue::acked(true)]);
}
