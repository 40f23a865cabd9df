//! Integration tests for admin moderation actions: mute, unmute, ban,
//! unban, delete.

use std::net::SocketAddr;

use serde_json::json;
use tokio::net::TcpListener;

const ADMIN_PASSWORD: &str = "admin-pw";

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

/// Fetch a user's row from the admin listing.
async fn admin_view(base_url: &str, admin_token: &str, user_id: i64) -> serde_json::Value {
    let resp = reqwest::Client::new()
        .get(format!("{}/admin/users", base_url))
        .bearer_auth(admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let users: Vec<serde_json::Value> = resp.json().await.unwrap();
    users
        .into_iter()
        .find(|u| u["id"].as_i64() == Some(user_id))
        .expect("user not in admin listing")
}

#[tokio::test]
async fn test_non_admin_cannot_moderate() {
    let (base_url, _) = start_test_server().await;
    let bob_id = register_user(&base_url, "bob", "pw").await;
    register_user(&base_url, "alice", "pw").await;
    let alice_token = login(&base_url, "alice", "pw").await;

    let client = reqwest::Client::new();
    for path in [
        format!("/admin/users/{}/ban", bob_id),
        format!("/admin/users/{}/mute", bob_id),
    ] {
        let req = client.post(format!("{}{}", base_url, path)).bearer_auth(&alice_token);
        let req = if path.ends_with("/mute") {
            req.json(&json!({ "minutes": 5 }))
        } else {
            req
        };
        assert_eq!(req.send().await.unwrap().status(), 403, "{} should be admin-only", path);
    }

    let resp = client
        .get(format!("{}/admin/users", base_url))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_mute_validates_minutes_and_target() {
    let (base_url, _) = start_test_server().await;
    let bob_id = register_user(&base_url, "bob", "pw").await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/admin/users/{}/mute", base_url, bob_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "minutes": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/admin/users/999999/mute", base_url))
        .bearer_auth(&admin_token)
        .json(&json!({ "minutes": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_mute_then_unmute_updates_listing() {
    let (base_url, _) = start_test_server().await;
    let bob_id = register_user(&base_url, "bob", "pw").await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/admin/users/{}/mute", base_url, bob_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "minutes": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert!(admin_view(&base_url, &admin_token, bob_id).await["muted_until"].is_string());

    let resp = client
        .post(format!("{}/admin/users/{}/unmute", base_url, bob_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert!(admin_view(&base_url, &admin_token, bob_id).await["muted_until"].is_null());
}

#[tokio::test]
async fn test_admin_cannot_ban_or_delete_self() {
    let (base_url, _) = start_test_server().await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/me", base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let admin_id = resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/admin/users/{}/ban", base_url, admin_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .delete(format!("{}/admin/users/{}", base_url, admin_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_ban_then_unban_restores_login() {
    let (base_url, _) = start_test_server().await;
    let bob_id = register_user(&base_url, "bob", "pw").await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/admin/users/{}/ban", base_url, bob_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(
        admin_view(&base_url, &admin_token, bob_id).await["is_banned"],
        true
    );

    let resp = client
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": "bob", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!("{}/admin/users/{}/unban", base_url, bob_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .post(format!("{}/login", base_url))
        .json(&json!({ "username": "bob", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_delete_user_removes_account() {
    let (base_url, _) = start_test_server().await;
    let bob_id = register_user(&base_url, "bob", "pw").await;
    let bob_token = login(&base_url, "bob", "pw").await;
    let admin_token = login(&base_url, "admin", ADMIN_PASSWORD).await;

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!("{}/admin/users/{}", base_url, bob_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // Token is still cryptographically valid but the identity is gone
    let resp = client
        .get(format!("{}/me", base_url))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Deleting again is a 404
    let resp = client
        .delete(format!("{}/admin/users/{}", base_url, bob_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
