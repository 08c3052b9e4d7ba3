mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn register_creates_account() -> Result<()> {
    let t = common::test_app()?;

    let (status, body) = common::register(&t.app, "chef@example.com", "Chef", "password123").await;

    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "chef@example.com");
    assert_eq!(body["data"]["name"], "Chef");
    // Credential material never leaves the store
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email() -> Result<()> {
    let t = common::test_app()?;

    common::register(&t.app, "chef@example.com", "Chef", "password123").await;
    let (status, body) = common::register(&t.app, "chef@example.com", "Other", "password456").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn register_rejects_short_password() -> Result<()> {
    let t = common::test_app()?;

    let (status, body) = common::register(&t.app, "chef@example.com", "Chef", "pw").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["field_errors"]["password"],
        "Ensure this field has at least 5 characters."
    );
    Ok(())
}

#[tokio::test]
async fn register_rejects_invalid_email_and_blank_name() -> Result<()> {
    let t = common::test_app()?;

    let (status, body) = common::register(&t.app, "not-an-email", "Chef", "password123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["email"], "Enter a valid email address.");

    let (status, body) = common::register(&t.app, "chef@example.com", "   ", "password123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["name"], "This field may not be blank.");
    Ok(())
}

#[tokio::test]
async fn token_issues_jwt_for_valid_credentials() -> Result<()> {
    let t = common::test_app()?;
    common::register(&t.app, "chef@example.com", "Chef", "password123").await;

    let (status, body) = common::send(
        &t.app,
        common::json(
            "POST",
            "/auth/token",
            None,
            &json!({ "email": "chef@example.com", "password": "password123" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let token = body["data"]["token"].as_str().expect("token");
    assert_eq!(token.split('.').count(), 3);
    assert_eq!(body["data"]["user"]["email"], "chef@example.com");
    Ok(())
}

#[tokio::test]
async fn token_rejects_bad_credentials() -> Result<()> {
    let t = common::test_app()?;
    common::register(&t.app, "chef@example.com", "Chef", "password123").await;

    // Wrong password
    let (status, body) = common::send(
        &t.app,
        common::json(
            "POST",
            "/auth/token",
            None,
            &json!({ "email": "chef@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "Unable to authenticate with provided credentials"
    );

    // Unknown account gets the same answer
    let (status, body) = common::send(
        &t.app,
        common::json(
            "POST",
            "/auth/token",
            None,
            &json!({ "email": "nobody@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "Unable to authenticate with provided credentials"
    );
    Ok(())
}

#[tokio::test]
async fn email_domain_is_normalized_on_register() -> Result<()> {
    let t = common::test_app()?;
    common::register(&t.app, "Chef@EXAMPLE.com", "Chef", "password123").await;

    let (status, body) = common::send(
        &t.app,
        common::json(
            "POST",
            "/auth/token",
            None,
            &json!({ "email": "Chef@example.com", "password": "password123" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["data"]["user"]["email"], "Chef@example.com");
    Ok(())
}

#[tokio::test]
async fn whoami_returns_token_identity() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;

    let (status, body) = common::send(&t.app, common::get("/auth/whoami", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "chef@example.com");
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_missing_or_garbage_tokens() -> Result<()> {
    let t = common::test_app()?;

    for uri in ["/auth/whoami", "/tags", "/ingredients", "/recipes"] {
        let (status, body) = common::send(&t.app, common::get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "no token on {}", uri);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    let (status, _) = common::send(&t.app, common::get("/tags", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
