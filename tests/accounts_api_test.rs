// ============================================================================
// Account endpoint tests: registration, login, profile. These need a real
// Postgres; each test creates its own throwaway database and skips when
// neither TEST_DATABASE_URL nor DATABASE_URL is set.
// ============================================================================

mod test_utils;

use serde_json::{Value, json};
use test_utils::*;

// The account routes never talk to the registry.
const NO_REGISTRY: &str = "http://127.0.0.1:9";

async fn register(
    client: &reqwest::Client,
    address: &str,
    name: &str,
    email: &str,
    password: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/users/register", address))
        .json(&json!({"name": name, "email": email, "password": password}))
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn register_issues_a_working_token() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = register(&client, &app.address, "Alice", "alice@example.com", "senha-segura-123").await;
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let response = client
        .get(format!("{}/api/users/profile", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], "alice@example.com");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = register(&client, &app.address, "Alice", "alice@example.com", "senha-segura-123").await;
    assert_eq!(response.status().as_u16(), 201);

    let response = register(&client, &app.address, "Impostor", "alice@example.com", "outra-senha-456").await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Email is already in use");
}

#[tokio::test]
async fn register_validates_payload() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = register(&client, &app.address, "Bob", "not-an-email", "senha-segura-123").await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let response = register(&client, &app.address, "Bob", "bob@example.com", "curta").await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_does_not_reveal_which_credential_failed() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    register(&client, &app.address, "Alice", "alice@example.com", "senha-segura-123").await;

    let response = client
        .post(format!("{}/api/users/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "senha-segura-123"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["token"].as_str().unwrap().len() > 0);

    let response = client
        .post(format!("{}/api/users/login", app.address))
        .json(&json!({"email": "alice@example.com", "password": "senha-errada-999"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
    let wrong_password: Value = response.json().await.unwrap();

    let response = client
        .post(format!("{}/api/users/login", app.address))
        .json(&json!({"email": "nobody@example.com", "password": "senha-segura-123"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
    let unknown_email: Value = response.json().await.unwrap();

    // Same message either way.
    assert_eq!(wrong_password["message"], "Invalid email or password");
    assert_eq!(unknown_email["message"], wrong_password["message"]);
}

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/users/profile", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "No token provided");
    assert_eq!(body["code"], "AUTH_ERROR");

    let response = client
        .get(format!("{}/api/users/profile", app.address))
        .bearer_auth("garbage.token.here")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn profile_returns_and_updates_the_account() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = register(&client, &app.address, "Alice", "alice@example.com", "senha-segura-123").await;
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let response = client
        .get(format!("{}/api/users/profile", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["savedContracts"].as_array().unwrap().len(), 0);
    assert!(body["user"]["createdAt"].is_string());

    let response = client
        .put(format!("{}/api/users/profile", app.address))
        .bearer_auth(&token)
        .json(&json!({"name": "Alice Silva"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Alice Silva");
    // Untouched fields survive a partial update.
    assert_eq!(body["user"]["email"], "alice@example.com");

    let response = client
        .put(format!("{}/api/users/profile", app.address))
        .bearer_auth(&token)
        .json(&json!({"email": "not-an-email"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn profile_update_rejects_taken_email() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    register(&client, &app.address, "Alice", "alice@example.com", "senha-segura-123").await;
    let response = register(&client, &app.address, "Bob", "bob@example.com", "senha-segura-123").await;
    let body: Value = response.json().await.unwrap();
    let bob_token = body["token"].as_str().unwrap().to_string();

    let response = client
        .put(format!("{}/api/users/profile", app.address))
        .bearer_auth(&bob_token)
        .json(&json!({"email": "alice@example.com"}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email is already in use");
}

#[tokio::test]
async fn health_reports_ok_with_a_database() {
    let app = match spawn_app_with_db(NO_REGISTRY).await {
        Some(app) => app,
        None => {
            eprintln!("Skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            return;
        }
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
