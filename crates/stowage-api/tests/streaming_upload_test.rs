//! Single-shot streaming upload integration tests.
//!
//! Run with: `cargo test -p stowage-api --test streaming_upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::auth::{bearer, editor_token, token, viewer_token};
use helpers::{setup_test_app, setup_test_app_with};
use serde_json::Value;
use stowage_core::models::Role;
use uuid::Uuid;

fn file_form(file_name: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(data).file_name(file_name.to_string()))
}

#[tokio::test]
async fn test_upload_stores_file_and_catalog_item() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(file_form("report.pdf", data.clone()))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["size"], data.len() as u64);
    assert_eq!(body["fileName"], "report.pdf");
    let item_id: Uuid = body["itemId"].as_str().unwrap().parse().unwrap();

    let item = app.state.catalog.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.group_id, group_id);
    assert_eq!(item.size, data.len() as i64);
    assert_eq!(tokio::fs::read(&item.physical_path).await.unwrap(), data);
}

#[tokio::test]
async fn test_file_name_field_overrides_part_name() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let form = MultipartForm::new()
        .add_text("fileName", "Holiday Photo.txt")
        .add_part("file", Part::bytes(b"hello".to_vec()).file_name("upload.bin"));
    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["fileName"], "Holiday Photo.txt");
}

#[tokio::test]
async fn test_viewer_cannot_upload() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(viewer_token()))
        .multipart(file_form("a.txt", b"abc".to_vec()))
        .await;

    assert_eq!(response.status_code(), 403);
    assert!(app
        .state
        .catalog
        .list_group_items(group_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_scoped_token_cannot_upload_to_other_group() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let other = app.create_group().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", other))
        .add_header("Authorization", bearer(token(Role::Editor, Some(group_id))))
        .multipart(file_form("a.txt", b"abc".to_vec()))
        .await;

    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_upload_without_file_part_is_bad_request() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(MultipartForm::new().add_text("fileName", "a.txt"))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(file_form("empty.txt", Vec::new()))
        .await;

    assert_eq!(response.status_code(), 400);
    assert!(app
        .state
        .catalog
        .list_group_items(group_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_upload_to_unknown_group_returns_404() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", Uuid::new_v4()))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(file_form("a.txt", b"abc".to_vec()))
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = setup_test_app_with(|config| config.max_upload_size_bytes = 1024).await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post(&format!("/group/{}/upload", group_id))
        .add_header("Authorization", bearer(editor_token()))
        .multipart(file_form("big.bin", vec![7u8; 4096]))
        .await;

    assert_eq!(response.status_code(), 413);
    assert!(app
        .state
        .catalog
        .list_group_items(group_id)
        .await
        .unwrap()
        .is_empty());
}
