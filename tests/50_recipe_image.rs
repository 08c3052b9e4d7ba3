mod common;

use anyhow::Result;
use axum::http::StatusCode;
use axum::Router;
use serde_json::{json, Value};

async fn create_recipe(app: &Router, token: &str) -> i64 {
    let (status, body) = common::send(
        app,
        common::json(
            "POST",
            "/recipes",
            Some(token),
            &json!({ "title": "Shakshuka", "time_minutes": 25, "price": "6.00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["data"]["id"].as_i64().expect("id")
}

fn stored_files(media_root: &std::path::Path) -> Vec<String> {
    let dir = media_root.join("recipes");
    let mut files: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[tokio::test]
async fn upload_attaches_image_and_stores_file() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;

    let (status, body) = common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &token,
            "image",
            "dish.png",
            "image/png",
            &common::png_bytes(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let data = body["data"].as_object().expect("object");
    // Upload answers only the id and the public image URL
    assert_eq!(data.len(), 2);
    assert_eq!(data["id"], json!(id));
    let url = data["image"].as_str().expect("image url");
    assert!(url.starts_with("/media/recipes/"), "url: {}", url);
    assert!(url.ends_with(".png"), "url: {}", url);

    let files = stored_files(t.media_dir.path());
    assert_eq!(files.len(), 1);

    // The stored file is served back under /media
    let (status, served) = common::send_bytes(&t.app, common::get(url, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, common::png_bytes());

    // Detail representation now carries the URL
    let (_, body) = common::send(&t.app, common::get(&format!("/recipes/{}", id), Some(&token))).await;
    assert_eq!(body["data"]["image"], json!(url));
    Ok(())
}

#[tokio::test]
async fn reupload_replaces_the_previous_file() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;
    let uri = format!("/recipes/{}/upload-image", id);

    let (_, first) = common::send(
        &t.app,
        common::multipart(&uri, &token, "image", "a.png", "image/png", &common::png_bytes()),
    )
    .await;
    let first_url = first["data"]["image"].as_str().expect("url").to_string();

    let (status, second) = common::send(
        &t.app,
        common::multipart(&uri, &token, "image", "b.jpg", "image/jpeg", &common::jpeg_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second_url = second["data"]["image"].as_str().expect("url");
    assert_ne!(first_url, second_url);
    assert!(second_url.ends_with(".jpg"));

    // Only the replacement remains on disk
    let files = stored_files(t.media_dir.path());
    assert_eq!(files.len(), 1, "files: {:?}", files);
    assert!(second_url.ends_with(&files[0]));
    Ok(())
}

#[tokio::test]
async fn upload_rejects_non_image_content() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;

    let (status, body) = common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &token,
            "image",
            "notes.txt",
            "text/plain",
            b"just some text",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["field_errors"]["image"],
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
    );

    // Nothing persisted: no file on disk, recipe unchanged
    assert!(stored_files(t.media_dir.path()).is_empty());
    let (_, body) = common::send(&t.app, common::get(&format!("/recipes/{}", id), Some(&token))).await;
    assert_eq!(body["data"]["image"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn upload_rejects_empty_file() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;

    let (status, body) = common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &token,
            "image",
            "empty.png",
            "image/png",
            b"",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["image"], "The submitted file is empty.");
    Ok(())
}

#[tokio::test]
async fn upload_requires_an_image_part() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;

    // Wrong part name
    let (status, body) = common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &token,
            "file",
            "dish.png",
            "image/png",
            &common::png_bytes(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["field_errors"]["image"], "No file was submitted.");
    Ok(())
}

#[tokio::test]
async fn upload_to_foreign_recipe_is_not_found() -> Result<()> {
    let t = common::test_app()?;
    let alice = common::register_and_token(&t.app, "alice@example.com").await;
    let bob = common::register_and_token(&t.app, "bob@example.com").await;
    let id = create_recipe(&t.app, &alice).await;

    let (status, _) = common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &bob,
            "image",
            "dish.png",
            "image/png",
            &common::png_bytes(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(stored_files(t.media_dir.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_recipe_removes_its_image_file() -> Result<()> {
    let t = common::test_app()?;
    let token = common::register_and_token(&t.app, "chef@example.com").await;
    let id = create_recipe(&t.app, &token).await;

    common::send(
        &t.app,
        common::multipart(
            &format!("/recipes/{}/upload-image", id),
            &token,
            "image",
            "dish.png",
            "image/png",
            &common::png_bytes(),
        ),
    )
    .await;
    assert_eq!(stored_files(t.media_dir.path()).len(), 1);

    let (status, _) = common::send(&t.app, common::delete(&format!("/recipes/{}", id), Some(&token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(stored_files(t.media_dir.path()).is_empty());
    Ok(())
}
