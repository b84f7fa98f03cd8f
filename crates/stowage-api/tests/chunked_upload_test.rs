//! Chunked upload integration tests.
//!
//! Run with: `cargo test -p stowage-api --test chunked_upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::auth::{bearer, editor_token, token, viewer_token};
use helpers::{setup_test_app, TestApp};
use serde_json::{json, Value};
use stowage_core::models::Role;
use uuid::Uuid;

async fn start_session(app: &TestApp, group_id: Uuid, file_name: &str, chunks: u32, size: u64) -> Uuid {
    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(editor_token()))
        .json(&json!({
            "fileName": file_name,
            "totalChunks": chunks,
            "totalFileSize": size,
            "groupId": group_id,
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    body["itemId"].as_str().unwrap().parse().unwrap()
}

fn chunk_form(item_id: Uuid, group_id: Uuid, file_name: &str, number: u32, total: u32, data: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text("itemId", item_id.to_string())
        .add_text("groupId", group_id.to_string())
        .add_text("fileName", file_name.to_string())
        .add_text("chunkNumber", number.to_string())
        .add_text("totalChunks", total.to_string())
        .add_part("chunk", Part::bytes(data.to_vec()).file_name("blob"))
}

#[tokio::test]
async fn test_out_of_order_chunks_assemble_in_index_order() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let item_id = start_session(&app, group_id, "notes.txt", 3, 9).await;

    let payloads: [&[u8]; 3] = [b"aaa", b"bbb", b"ccc"];
    let mut last = Value::Null;
    for (i, number) in [2u32, 0, 1].into_iter().enumerate() {
        let response = app
            .client()
            .post("/upload-chunk")
            .add_header("Authorization", bearer(editor_token()))
            .multipart(chunk_form(item_id, group_id, "notes.txt", number, 3, payloads[number as usize]))
            .await;
        assert_eq!(response.status_code(), 200);
        last = response.json();
        assert_eq!(last["chunkReceived"], i as u64 + 1);
        assert_eq!(last["isComplete"], i == 2);
    }
    assert_eq!(last["itemId"], item_id.to_string());

    let path = app.state.ingest.layout().item_path(group_id, item_id, "notes.txt");
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"aaabbbccc");
    assert!(!app.state.ingest.layout().session_dir(item_id).exists());
    assert_eq!(app.state.sessions.session_count().await, 0);

    let items: Value = app
        .client()
        .get(&format!("/group/{}/items", group_id))
        .add_header("Authorization", bearer(viewer_token()))
        .await
        .json();
    assert_eq!(items["items"][0]["id"], item_id.to_string());
    assert_eq!(items["items"][0]["size"], 9);
}

#[tokio::test]
async fn test_scoped_token_uses_its_group() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let scoped = token(Role::Editor, Some(group_id));

    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(scoped.clone()))
        .json(&json!({ "fileName": "one.bin", "totalChunks": 1, "totalFileSize": 4 }))
        .await;
    assert_eq!(response.status_code(), 200);
    let item_id: Uuid = response.json::<Value>()["itemId"].as_str().unwrap().parse().unwrap();

    let form = MultipartForm::new()
        .add_text("itemId", item_id.to_string())
        .add_text("fileName", "one.bin")
        .add_text("chunkNumber", "0")
        .add_text("totalChunks", "1")
        .add_part("chunk", Part::bytes(b"data".to_vec()));
    let response = app
        .client()
        .post("/upload-chunk")
        .add_header("Authorization", bearer(scoped))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["isComplete"], true);
}

#[tokio::test]
async fn test_unscoped_editor_may_omit_group_on_chunks() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let item_id = start_session(&app, group_id, "two.bin", 2, 4).await;

    let mut last = Value::Null;
    for (number, data) in [(0u32, b"ab"), (1, b"cd")] {
        let form = MultipartForm::new()
            .add_text("itemId", item_id.to_string())
            .add_text("fileName", "two.bin")
            .add_text("chunkNumber", number.to_string())
            .add_text("totalChunks", "2")
            .add_part("chunk", Part::bytes(data.to_vec()));
        let response = app
            .client()
            .post("/upload-chunk")
            .add_header("Authorization", bearer(editor_token()))
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), 200);
        last = response.json();
    }

    assert_eq!(last["isComplete"], true);
    let path = app.state.ingest.layout().item_path(group_id, item_id, "two.bin");
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abcd");
}

#[tokio::test]
async fn test_chunk_mismatch_is_rejected() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let item_id = start_session(&app, group_id, "video.mp4", 2, 10).await;

    let response = app
        .client()
        .post("/upload-chunk")
        .add_header("Authorization", bearer(editor_token()))
        .multipart(chunk_form(item_id, group_id, "video.mp4", 0, 5, b"12345"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "CHUNK_SESSION_MISMATCH");

    let path = app.state.ingest.layout().item_path(group_id, item_id, "video.mp4");
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post("/upload-chunk")
        .add_header("Authorization", bearer(editor_token()))
        .multipart(chunk_form(Uuid::new_v4(), group_id, "a.txt", 0, 1, b"x"))
        .await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "UPLOAD_SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_missing_chunk_field_is_bad_request() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;
    let item_id = start_session(&app, group_id, "a.txt", 1, 1).await;

    let form = MultipartForm::new()
        .add_text("itemId", item_id.to_string())
        .add_text("groupId", group_id.to_string())
        .add_text("fileName", "a.txt")
        .add_text("chunkNumber", "0")
        .add_text("totalChunks", "1");
    let response = app
        .client()
        .post("/upload-chunk")
        .add_header("Authorization", bearer(editor_token()))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(app.state.sessions.session_count().await, 1);
}

#[tokio::test]
async fn test_start_rejects_unknown_group_and_bad_counts() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(editor_token()))
        .json(&json!({
            "fileName": "a.txt",
            "totalChunks": 1,
            "totalFileSize": 1,
            "groupId": Uuid::new_v4(),
        }))
        .await;
    assert_eq!(response.status_code(), 404);

    let group_id = app.create_group().await;
    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(editor_token()))
        .json(&json!({
            "fileName": "a.txt",
            "totalChunks": 0,
            "totalFileSize": 1,
            "groupId": group_id,
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(editor_token()))
        .json(&json!({ "fileName": "a.txt", "totalChunks": 1, "totalFileSize": 1 }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_viewer_cannot_upload_chunks() {
    let app = setup_test_app().await;
    let group_id = app.create_group().await;

    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(viewer_token()))
        .json(&json!({
            "fileName": "a.txt",
            "totalChunks": 1,
            "totalFileSize": 1,
            "groupId": group_id,
        }))
        .await;

    assert_eq!(response.status_code(), 403);
    assert_eq!(app.state.sessions.session_count().await, 0);
}

#[tokio::test]
async fn test_malformed_start_body_is_invalid_input() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload-chunk/start")
        .add_header("Authorization", bearer(editor_token()))
        .json(&json!({ "fileName": "a.txt" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}
