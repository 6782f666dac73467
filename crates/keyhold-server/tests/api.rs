//! Router-level tests for the Keyhold HTTP API.
//!
//! Requests go through the full middleware stack with `oneshot`, backed by
//! the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use keyhold_core::crypto::Argon2Hasher;
use keyhold_core::memory::MemoryStore;
use keyhold_core::token::JwtTokens;
use keyhold_server::routes::build_router;
use keyhold_server::state::AppState;

const PASSWORD: &str = "correct horse battery";

const BRIDGE_SECRET: &str = "bridge-test-secret";

fn app() -> Router {
    app_with_bridge(None)
}

fn app_with_bridge(secret: Option<&str>) -> Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(Argon2Hasher::new(64, 1, 1).unwrap()),
        Arc::new(JwtTokens::new(b"api-test-secret", chrono::Duration::hours(1))),
    )
    .with_oauth_bridge_secret(secret.map(str::to_owned));
    build_router(Arc::new(state), Duration::from_secs(10))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("response")
}

async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Register a tenant and return `(token, user_id, tenant_id)`.
async fn register(app: &Router, slug: &str, email: &str) -> (String, String, String) {
    let response = send(
        app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "tenant_name": slug,
                "tenant_slug": slug,
                "email": email,
                "name": "Admin",
                "password": PASSWORD,
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    (
        body["token"].as_str().unwrap().to_owned(),
        body["user"]["id"].as_str().unwrap().to_owned(),
        body["user"]["tenant_id"].as_str().unwrap().to_owned(),
    )
}

/// Admin creates an active user; returns `(token, user_id)`.
async fn add_user(app: &Router, admin_token: &str, tenant_id: &str, email: &str) -> (String, String) {
    let response = send(
        app,
        request(
            "POST",
            "/api/admin/users",
            Some(admin_token),
            Some(json!({
                "email": email,
                "name": "Member",
                "password": PASSWORD,
                "tenant_id": tenant_id,
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user_id = read_json(response).await["id"].as_str().unwrap().to_owned();

    let response = send(
        app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = read_json(response).await["token"].as_str().unwrap().to_owned();
    (token, user_id)
}

async fn create_vault(app: &Router, token: &str, name: &str, personal: bool) -> String {
    let response = send(
        app,
        request(
            "POST",
            "/api/vaults",
            Some(token),
            Some(json!({ "name": name, "is_personal": personal })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await["id"].as_str().unwrap().to_owned()
}

// ── Health & hardening ───────────────────────────────────────────────

#[tokio::test]
async fn health_is_public_and_hardened() {
    let app = app();
    let response = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(read_json(response).await["status"], "ok");
}

// ── Authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app();

    let response = send(&app, request("GET", "/api/vaults", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"], "unauthorized");

    let basic = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, basic).await.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, request("GET", "/api/auth/me", Some("garbage"), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_me() {
    let app = app();
    let (token, user_id, _) = register(&app, "acme", "admin@acme.test").await;

    let response = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = read_json(response).await;
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());
    assert!(me.get("master_key_salt").is_none());

    let response = send(&app, request("GET", "/api/auth/salt", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!read_json(response).await["salt"].as_str().unwrap().is_empty());

    let wrong = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@acme.test", "password": "not the password" })),
        ),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    register(&app, "acme", "admin@acme.test").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "tenant_name": "Other",
                "tenant_slug": "other",
                "email": "ADMIN@acme.test",
                "name": "Admin",
                "password": PASSWORD,
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["error"], "conflict");
}

fn oauth_request(secret: Option<&str>, external_id: &str, email: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/auth/oauth")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-keyhold-bridge-secret", secret);
    }
    let body = json!({
        "provider": "github",
        "external_id": external_id,
        "email": email,
        "name": "Dana",
    });
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn oauth_sign_in_issues_a_usable_token() {
    let app = app_with_bridge(Some(BRIDGE_SECRET));

    let response = send(&app, oauth_request(Some(BRIDGE_SECRET), "gh-42424242", "dana@example.test")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = read_json(response).await;
    assert_eq!(session["user"]["status"], "active");
    assert_eq!(session["user"]["oauth_provider"], "github");
    let token = session["token"].as_str().unwrap().to_owned();

    let response = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["email"], "dana@example.test");

    // Same provider identity lands on the same account.
    let again = read_json(
        send(&app, oauth_request(Some(BRIDGE_SECRET), "gh-42424242", "dana@example.test")).await,
    )
    .await;
    assert_eq!(again["user"]["id"], session["user"]["id"]);
}

#[tokio::test]
async fn oauth_sign_in_requires_the_bridge_secret() {
    let app = app_with_bridge(Some(BRIDGE_SECRET));
    let missing = send(&app, oauth_request(None, "gh-1", "eve@example.test")).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let wrong = send(&app, oauth_request(Some("guess"), "gh-1", "eve@example.test")).await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let disabled = self::app();
    let response = send(&disabled, oauth_request(Some(BRIDGE_SECRET), "gh-1", "eve@example.test")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ── Vaults & members ─────────────────────────────────────────────────

#[tokio::test]
async fn personal_vault_members_are_unprocessable() {
    let app = app();
    let (token, _, tenant_id) = register(&app, "acme", "admin@acme.test").await;
    let (_, bob_id) = add_user(&app, &token, &tenant_id, "bob@acme.test").await;
    let vault_id = create_vault(&app, &token, "Mine", true).await;

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/vaults/{vault_id}/members"),
            Some(&token),
            Some(json!({ "user_id": bob_id, "role": "viewer" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(response).await["error"], "personal_vault_no_members");
}

#[tokio::test]
async fn member_roles_gate_credential_operations() {
    let app = app();
    let (owner, _, tenant_id) = register(&app, "acme", "admin@acme.test").await;
    let (editor, editor_id) = add_user(&app, &owner, &tenant_id, "ed@acme.test").await;
    let (outsider, _) = add_user(&app, &owner, &tenant_id, "eve@acme.test").await;
    let vault_id = create_vault(&app, &owner, "Shared", false).await;

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/vaults/{vault_id}/members"),
            Some(&owner),
            Some(json!({ "user_id": editor_id, "role": "editor" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["role"], "editor");

    let response = send(
        &app,
        request(
            "POST",
            &format!("/api/vaults/{vault_id}/credentials"),
            Some(&editor),
            Some(json!({ "title": "enc:t", "password": "enc:p", "category": "email" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cred_id = read_json(response).await["id"].as_str().unwrap().to_owned();
    let cred_uri = format!("/api/vaults/{vault_id}/credentials/{cred_id}");

    let response = send(
        &app,
        request("PUT", &cred_uri, Some(&editor), Some(json!({ "notes": "enc:n", "title": "" }))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json(response).await;
    assert_eq!(updated["title"], "enc:t");
    assert_eq!(updated["notes"], "enc:n");

    let response = send(&app, request("DELETE", &cred_uri, Some(&editor), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"], "access_denied");

    let response = send(&app, request("GET", &cred_uri, Some(&outsider), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request("GET", "/api/credentials/search?q=EMAIL", Some(&outsider), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["credentials"].as_array().unwrap().len(), 0);

    let response = send(
        &app,
        request("GET", "/api/credentials/search?q=EMAIL", Some(&editor), None),
    )
    .await;
    assert_eq!(read_json(response).await["credentials"].as_array().unwrap().len(), 1);

    let response = send(&app, request("DELETE", &cred_uri, Some(&owner), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_vault_is_not_found() {
    let app = app();
    let (token, _, _) = register(&app, "acme", "admin@acme.test").await;
    let uri = format!("/api/vaults/{}", uuid::Uuid::new_v4());
    let response = send(&app, request("GET", &uri, Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── User administration ──────────────────────────────────────────────

#[tokio::test]
async fn self_disable_is_forbidden() {
    let app = app();
    let (token, user_id, _) = register(&app, "acme", "admin@acme.test").await;
    let response = send(
        &app,
        request("POST", &format!("/api/admin/users/{user_id}/disable"), Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"], "self_modification_denied");
}

#[tokio::test]
async fn disabled_user_token_stops_working() {
    let app = app();
    let (admin, _, tenant_id) = register(&app, "acme", "admin@acme.test").await;
    let (bob, bob_id) = add_user(&app, &admin, &tenant_id, "bob@acme.test").await;

    let response = send(
        &app,
        request("POST", &format!("/api/admin/users/{bob_id}/disable"), Some(&admin), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "inactive");

    let response = send(&app, request("GET", "/api/vaults", Some(&bob), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cannot_reach_other_tenants() {
    let app = app();
    let (acme, _, _) = register(&app, "acme", "admin@acme.test").await;
    let (globex, _, globex_tenant) = register(&app, "globex", "admin@globex.test").await;
    let (_, hank_id) = add_user(&app, &globex, &globex_tenant, "hank@globex.test").await;

    let response = send(
        &app,
        request("POST", &format!("/api/admin/users/{hank_id}/disable"), Some(&acme), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request(
            "GET",
            &format!("/api/admin/users?tenant_id={globex_tenant}"),
            Some(&acme),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_role_is_bad_request() {
    let app = app();
    let (token, _, tenant_id) = register(&app, "acme", "admin@acme.test").await;
    let response = send(
        &app,
        request(
            "POST",
            "/api/admin/users",
            Some(&token),
            Some(json!({
                "email": "x@acme.test",
                "name": "X",
                "role": "overlord",
                "tenant_id": tenant_id,
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "invalid_role");
}

// ── Tenants ──────────────────────────────────────────────────────────

#[tokio::test]
async fn tenant_create_returns_fresh_token() {
    let app = app();
    let (token, _, old_tenant) = register(&app, "acme", "admin@acme.test").await;

    let response = send(
        &app,
        request(
            "POST",
            "/api/tenants",
            Some(&token),
            Some(json!({ "name": "Side", "slug": "Side-Project" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["tenant"]["slug"], "side-project");
    let new_token = body["token"].as_str().unwrap().to_owned();

    let response = send(&app, request("GET", "/api/auth/me", Some(&new_token), None)).await;
    let me = read_json(response).await;
    assert_eq!(me["tenant_id"], body["tenant"]["id"]);
    assert_ne!(me["tenant_id"], old_tenant.as_str());

    let response = send(
        &app,
        request("DELETE", &format!("/api/tenants/{old_tenant}"), Some(&new_token), None),
    )
    .await;
    // The old tenant is now outside the caller's scope.
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
