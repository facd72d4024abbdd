use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zavod_miner::game::{ApiError, GameApi, INIT_DATA_HEADER, LevelPrice};
use zavod_miner::telegram::InitData;

fn session() -> InitData {
    InitData::new("query_id=9&auth_date=2&hash=ff")
}

#[tokio::test]
async fn profile_sends_init_data_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header(INIT_DATA_HEADER, "query_id=9&auth_date=2&hash=ff"))
        .and(header("origin", "https://zavod.mdaowallet.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"tokens": 3.25, "id": 77})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let profile = api.profile(&session()).await.unwrap();

    assert!((profile.tokens - 3.25).abs() < f64::EPSILON);
    assert_eq!(profile.extra.get("id"), Some(&json!(77)));
}

#[tokio::test]
async fn settings_tables_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/farm/workbenchSettings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"level": 1, "price": 100, "speed": 1.5},
            {"level": 2, "price": 300, "speed": 2.0}
        ])))
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let table = api.workbench_settings(&session()).await.unwrap();

    assert_eq!(
        table,
        vec![
            LevelPrice { level: 1, price: 100.0 },
            LevelPrice { level: 2, price: 300.0 },
        ]
    );
}

#[tokio::test]
async fn claim_posts_empty_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/claim"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tokens": 12.0})))
        .expect(1)
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let claim = api.claim(&session()).await.unwrap();

    assert!((claim.tokens - 12.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn upgrade_toolkit_returns_farm_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/upgradeToolkit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lastClaim": "2024-05-01T10:00:00Z",
            "claimInterval": 7_200_000,
            "workbenchLevel": 1,
            "toolkitLevel": 4
        })))
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let farm = api.upgrade_toolkit(&session()).await.unwrap();

    assert_eq!(farm.toolkit_level, Some(4));
    assert_eq!(farm.claim_interval, Some(7_200_000));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/farm"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let err = api.farm(&session()).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { .. }));
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None).unwrap();
    let err = api.profile(&session()).await.unwrap_err();

    assert!(matches!(err, ApiError::Decode { endpoint: "/user/profile", .. }));
    assert!(!err.is_unauthorized());
}

#[tokio::test]
async fn proxy_check_reports_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"origin": "203.0.113.7"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None)
        .unwrap()
        .with_proxy_check_url(format!("{}/ip", server.uri()));

    assert_eq!(api.check_proxy().await.unwrap(), "203.0.113.7");
}

#[tokio::test]
async fn proxy_check_fails_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = GameApi::new(&server.uri(), None)
        .unwrap()
        .with_proxy_check_url(format!("{}/ip", server.uri()));

    assert!(matches!(api.check_proxy().await, Err(ApiError::Request(_))));
}
