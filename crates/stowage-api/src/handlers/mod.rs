pub mod chunked_upload;
pub mod health;
pub mod streaming_upload;
pub mod upload_group;
