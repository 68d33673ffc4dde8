mod support;

use std::sync::Arc;

use smsdesk::api::{Credentials, PriceQuery, SmsApiClient};
use smsdesk::session::{Session, SessionEvent, SignOutReason};
use smsdesk::ApiError;
use support::TestBackend;

const PAGE: &str = r#"{"prices":[{"service":"tg","country":"73","priceBrl":4.5,"priceUsd":0.9}],"total":1}"#;

fn client(backend: &TestBackend, session: Arc<Session>) -> SmsApiClient {
    SmsApiClient::new(&backend.settings(), session).unwrap()
}

#[tokio::test]
async fn test_login_stores_token_and_sends_bearer() {
    let backend = TestBackend::start(|req| match req.path.as_str() {
        "/auth/login" => (200, r#"{"accessToken":"jwt-123"}"#.into()),
        "/credits/balance" => (200, r#"{"balance":42.5}"#.into()),
        _ => (404, "{}".into()),
    })
    .await;
    let session = Arc::new(Session::new());
    let api = client(&backend, Arc::clone(&session));

    api.login(&Credentials {
        email: "user@example.com".into(),
        password: "hunter2".into(),
    })
    .await
    .unwrap();
    assert_eq!(session.token().as_deref(), Some("jwt-123"));

    let balance = api.balance().await.unwrap();
    assert_eq!(balance, 42.5);

    let requests = backend.requests();
    assert_eq!(requests[0].authorization, None);
    assert_eq!(requests[0].json()["email"], "user@example.com");
    assert_eq!(requests[1].authorization.as_deref(), Some("Bearer jwt-123"));
}

#[tokio::test]
async fn test_unauthorized_clears_session() {
    let backend =
        TestBackend::start(|_| (401, r#"{"message":"Unauthorized"}"#.into())).await;
    let session = Arc::new(Session::with_token("stale"));
    let mut events = session.subscribe();
    let api = client(&backend, Arc::clone(&session));

    let err = api.balance().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(err.is_auth());
    assert!(!session.is_authenticated());
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            reason: SignOutReason::Unauthorized
        }
    );
}

#[tokio::test]
async fn test_backend_message_reaches_the_user() {
    let backend =
        TestBackend::start(|_| (400, r#"{"message":"Insufficient balance"}"#.into()))
            .await;
    let api = client(&backend, Arc::new(Session::with_token("jwt")));

    let err = api.buy_number("tg", "73").await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Backend {
            status: 400,
            message: "Insufficient balance".into()
        }
    );
    assert_eq!(err.user_message(), "Insufficient balance");
}

#[tokio::test]
async fn test_server_error_without_message_is_generic() {
    let backend = TestBackend::start(|_| (500, String::new())).await;
    let api = client(&backend, Arc::new(Session::new()));

    let err = api.balance().await.unwrap_err();

    assert!(matches!(err, ApiError::Backend { status: 500, .. }));
    assert_eq!(err.user_message(), "Something went wrong, please try again.");
}

#[tokio::test]
async fn test_invalid_purchase_is_not_sent() {
    let backend = TestBackend::start(|_| (200, "{}".into())).await;
    let api = client(&backend, Arc::new(Session::new()));

    let err = api.buy_number("  ", "73").await.unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_listing_endpoint_follows_filters() {
    let backend = TestBackend::start(|_| (200, PAGE.into())).await;
    let api = client(&backend, Arc::new(Session::new()));

    api.list_prices(&PriceQuery::new(0, 50)).await.unwrap();
    api.list_prices(&PriceQuery::new(50, 50).service("telegram"))
        .await
        .unwrap();
    api.list_prices(&PriceQuery::new(0, 50).country("brazil"))
        .await
        .unwrap();
    api.list_prices(&PriceQuery::new(0, 50).service("telegram").country("brazil"))
        .await
        .unwrap();

    let requests = backend.requests();
    assert_eq!(requests[0].path, "/credits/prices");
    assert_eq!(requests[0].param("includeTotal").as_deref(), Some("true"));
    assert_eq!(requests[0].param("limit").as_deref(), Some("50"));

    assert_eq!(requests[1].path, "/credits/prices/filter-by-name");
    assert_eq!(requests[1].param("serviceName").as_deref(), Some("telegram"));
    assert_eq!(requests[1].param("offset").as_deref(), Some("50"));

    assert_eq!(requests[2].path, "/credits/prices/filter-by-country-name");
    assert_eq!(requests[2].param("countryName").as_deref(), Some("brazil"));

    assert_eq!(requests[3].path, "/credits/prices/filter-by-name");
    assert_eq!(requests[3].param("serviceName").as_deref(), Some("telegram"));
    assert_eq!(requests[3].param("countryName").as_deref(), Some("brazil"));
}

#[tokio::test]
async fn test_legacy_array_listing_is_a_decode_error() {
    let backend = TestBackend::start(|_| {
        (
            200,
            r#"[{"service":"tg","country":"73","priceBrl":4.5,"priceUsd":0.9}]"#.into(),
        )
    })
    .await;
    let api = client(&backend, Arc::new(Session::new()));

    let err = api.list_prices(&PriceQuery::new(0, 50)).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_activation_status_takes_first_entry() {
    let backend = TestBackend::start(|req| match req.path.as_str() {
        "/sms/status/A1" => (200, r#"{"array":[{"status":"0","code":"831920"}]}"#.into()),
        "/sms/status/A2" => (200, r#"{"array":[]}"#.into()),
        _ => (404, "{}".into()),
    })
    .await;
    let api = client(&backend, Arc::new(Session::with_token("jwt")));

    let status = api.activation_status("A1").await.unwrap();
    assert_eq!(status.received_code(), Some("831920"));

    let empty = api.activation_status("A2").await.unwrap();
    assert_eq!(empty.status, None);
    assert_eq!(empty.received_code(), None);
}

#[tokio::test]
async fn test_refund_posts_activation_and_credits() {
    let backend = TestBackend::start(|_| (200, r#"{"balance":100}"#.into())).await;
    let api = client(&backend, Arc::new(Session::with_token("jwt")));

    let receipt = api.refund("A1", 5.0).await.unwrap();

    assert_eq!(receipt.balance, 100.0);
    let requests = backend.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/credits/refunded");
    let body = requests[0].json();
    assert_eq!(body["activationId"], "A1");
    assert_eq!(body["creditsSpent"], 5.0);
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() {
    let mut settings = smsdesk::config::ApiSettings::new("http://127.0.0.1:9");
    settings.retry_max_elapsed = 0;
    let api = SmsApiClient::new(&settings, Arc::new(Session::new())).unwrap();

    let err = api.balance().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_) | ApiError::Timeout));
}

#[tokio::test]
async fn test_opaque_activation_ids_reach_the_backend() {
    let backend = TestBackend::start(|req| match req.path.as_str() {
        "/sms/status/7f3a.91" => (200, r#"{"array":[{"status":"6"}]}"#.into()),
        "/sms/status/a%2Fb" => (200, r#"{"array":[{"status":"0"}]}"#.into()),
        "/credits/refunded" => (200, r#"{"balance":100}"#.into()),
        _ => (404, "{}".into()),
    })
    .await;
    let api = client(&backend, Arc::new(Session::with_token("jwt")));

    let status = api.activation_status("7f3a.91").await.unwrap();
    assert_eq!(status.status.as_deref(), Some("6"));
    let status = api.activation_status("a/b").await.unwrap();
    assert_eq!(status.status.as_deref(), Some("0"));
    api.refund("7f3a.91", 5.0).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests[2].json()["activationId"], "7f3a.91");
}
