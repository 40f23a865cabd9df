//! Integration tests for registration, login, and token-protected endpoints.

use std::net::SocketAddr;

use serde_json::json;
use tokio::net::TcpListener;

const ADMIN_PASSWORD: &str = "admin-pw";

/// Start the server on a random port and return (base_url, addr).
async fn start_test_server() -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = michat_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = michat_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    michat_server::identity::store::seed_admin(&db, "admin", ADMIN_PASSWORD, "#ff0000")
        .await
        .expect("Failed to seed admin");

    let state = michat_server::state::AppState {
        db,
        jwt_secret,
        registry: michat_server::ws::SessionRegistry::new(),
        admin_username: "admin".to_string(),
    };

    let app = michat_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

/// Register a user and return their id.
async fn register_user(base_url: &str, username: &str, password: &str) -> i64 {
    let resp = reqwest::Client::new()
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Registration failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

/// Log in and return the access token.
async fn login(base_url: &str, username: &str, password: &str) -> String {
    let resp = reqwest::Client::new()
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Login failed for {}", username);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_login_me_round_trip() {
    let (base_url, _) = start_test_server().await;

    let user_id = register_user(&base_url, "alice", "wonderland").await;
    assert!(user_id > 0);

    let token = login(&base_url, "alice", "wonderland").await;

    let resp = reqwest::Client::new()
        .get(format!("{}/me", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"].as_i64().unwrap(), user_id);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["is_admin"], false);
    // Moderation flags are not part of the public view
    assert!(body.get("is_banned").is_none());
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let (base_url, _) = start_test_server().await;
    register_user(&base_url, "alice", "pw1").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": "alice", "password": "pw2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_admin_username_is_reserved() {
    let (base_url, _) = start_test_server().await;

    let resp = reqwest::Client::new()
        .post(format!("{}/register", base_url))
        .json(&json!({ "username": "Admin", "password": "sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (base_url, _) = start_test_server().await;
    register_user(&base_url, "alice", "right").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Unknown user looks identical to wrong password
    let resp = reqwest::Client::new()
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": "nobody", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_banned_user_cannot_login() {
    let (base_url, _) = start_test_server().await;
    let alice_id = register_user(&base_url, "alice", "pw").await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/admin/users/{}/ban", base_url, alice_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = reqwest::Client::new()
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": "alice", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_protected_endpoints_require_token() {
    let (base_url, _) = start_test_server().await;

    let resp = reqwest::Client::new()
        .get(format!("{}/me", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = reqwest::Client::new()
        .get(format!("{}/users", base_url))
        .bearer_auth("garbage-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_user_listing_is_sorted_by_username() {
    let (base_url, _) = start_test_server().await;
    register_user(&base_url, "zoe", "pw").await;
    register_user(&base_url, "bob", "pw").await;
    let token = login(&base_url, "bob", "pw").await;

    let resp = reqwest::Client::new()
        .get(format!("{}/users", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Vec<serde_json::Value> = resp.json().await.unwrap();
    let names: Vec<&str> = body.iter().map(|u| u["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["admin", "bob", "zoe"]);
}
