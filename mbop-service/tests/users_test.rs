//! User-directory integration tests across backends.

mod common;

use common::{message, test_config, TestApp};
use mbop_service::config::KeycloakConfig;
use serde_json::json;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn usernames(response: reqwest::Response) -> Vec<String> {
    let users: Vec<serde_json::Value> = response.json().await.unwrap();
    users
        .iter()
        .map(|u| u["username"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn v1_users_fabricates_requested_names() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .json(&json!({"users": ["jdoe", "asmith"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let users: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "jdoe");
    assert_eq!(users[0]["email"], "jdoe@example.com");
    assert_eq!(users[0]["type"], "User");
    assert_eq!(users[0]["is_org_admin"], true);
}

#[tokio::test]
async fn v1_users_upstream_failure_is_bad_gateway() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .json(&json!({"users": ["errorTest"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert!(message(response).await.starts_with("Cant Retrieve Users"));
}

#[tokio::test]
async fn v1_users_rejects_bad_query() {
    let app = TestApp::spawn().await;

    for query in ["sortOrder=sideways", "queryBy=email"] {
        let response = app
            .client()
            .post(app.url(&format!("/v1/users?{}", query)))
            .json(&json!({"users": ["jdoe"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "query {}", query);
    }

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn v3_users_sorts_and_pages() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(app.url("/v3/accounts/42/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(usernames(response).await, ["alice", "bob", "carol"]);

    let response = app
        .client()
        .get(app.url("/v3/accounts/42/users?sortOrder=des&limit=2&offset=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(usernames(response).await, ["carol", "bob"]);

    let response = app
        .client()
        .get(app.url("/v3/accounts/42/users?limit=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(usernames(response).await.is_empty());
}

#[tokio::test]
async fn v3_users_omit_type_field() {
    let app = TestApp::spawn().await;

    let users: Vec<serde_json::Value> = app
        .client()
        .get(app.url("/v3/accounts/42/users?admin_only=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.get("type").is_none()));
    assert!(users.iter().all(|u| u["is_org_admin"] == true));
}

#[tokio::test]
async fn v3_users_rejects_bad_pagination() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .get(app.url("/v3/accounts/42/users?offset=abc"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn v3_users_by_filters() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(app.url("/v3/accounts/42/usersBy"))
        .json(&json!({"emailStartsWith": "CAR"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(usernames(response).await, ["carol"]);

    let response = app
        .client()
        .post(app.url("/v3/accounts/42/usersBy"))
        .json(&json!({"primaryEmail": "bob@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(usernames(response).await, ["bob"]);
}

#[tokio::test]
async fn v3_users_by_requires_a_filter() {
    let app = TestApp::spawn().await;

    let response = app
        .client()
        .post(app.url("/v3/accounts/42/usersBy"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(
        message(response).await,
        "request must include 'primaryEmail', 'emailStartsWith', or 'principalStartsWith'"
    );
}

#[tokio::test]
async fn unsupported_module_without_upstream_is_not_found() {
    let mut config = test_config();
    config.users_module = "".to_string();
    let app = TestApp::spawn_with(config).await;

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .json(&json!({"users": ["jdoe"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(message(response).await, "not found");
}

#[tokio::test]
async fn unsupported_module_forwards_to_legacy_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users"))
        .and(query_param("sortOrder", "asc"))
        .and(body_string(r#"{"users":["jdoe"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"username": "legacy"}])))
        .expect(1)
        .mount(&upstream)
        .await;

    let mut config = test_config();
    config.users_module = "legacy".to_string();
    config.catchall.disabled = false;
    config.catchall.upstream_url = Some(upstream.uri());
    let app = TestApp::spawn_with(config).await;

    let response = app
        .client()
        .post(app.url("/v1/users?sortOrder=asc"))
        .header("content-type", "application/json")
        .body(r#"{"users":["jdoe"]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(usernames(response).await, ["legacy"]);
}

#[tokio::test]
async fn unknown_route_forwards_to_legacy_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jwt"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .mount(&upstream)
        .await;

    let mut config = test_config();
    config.catchall.disabled = false;
    config.catchall.upstream_url = Some(upstream.uri());
    let app = TestApp::spawn_with(config).await;

    let response = app.client().get(app.url("/v1/jwt")).send().await.unwrap();

    assert_eq!(response.status(), 418);
    assert_eq!(response.text().await.unwrap(), "teapot");
}

#[tokio::test]
async fn keycloak_module_queries_user_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/realms/master/protocol/openid-connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "kc"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("usernames", "dana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{
                "id": "7",
                "user_id": "uid-7",
                "username": "dana",
                "email": "dana@example.com",
                "org_admin": true,
                "org_id": "42",
                "type": "User"
            }]
        })))
        .mount(&server)
        .await;

    let address = server.address();
    let mut config = test_config();
    config.users_module = "keycloak".to_string();
    config.directory.keycloak = KeycloakConfig {
        token_url: server.uri(),
        user_service_host: address.ip().to_string(),
        user_service_port: format!(":{}", address.port()),
        ..Default::default()
    };
    let app = TestApp::spawn_with(config).await;

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .json(&json!({"users": ["dana"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let users: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["display_name"], "uid-7");
    assert_eq!(users[0]["is_org_admin"], true);
}

#[tokio::test]
async fn keycloak_token_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.users_module = "keycloak".to_string();
    config.directory.keycloak = KeycloakConfig {
        token_url: server.uri(),
        ..Default::default()
    };
    let app = TestApp::spawn_with(config).await;

    let response = app
        .client()
        .post(app.url("/v1/users"))
        .json(&json!({"users": ["dana"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert!(message(response).await.starts_with("Can't build connection"));
}

#[tokio::test]
async fn ams_module_without_urls_is_rejected() {
    let mut config = test_config();
    config.users_module = "ams".to_string();
    let app = TestApp::spawn_with(config).await;

    let response = app
        .client()
        .get(app.url("/v3/accounts/42/users"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(
        message(response).await,
        "ams module requires AMS_URL and OAUTH_TOKEN_URL"
    );
}
