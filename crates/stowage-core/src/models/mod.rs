//! Domain models

pub mod group;
pub mod item;
pub mod role;

pub use group::{
    CreateShareLinkRequest, ShareLink, ShareLinkResponse, UploadGroup, UploadGroupInfo,
    UploadGroupResponse,
};
pub use item::{file_extension, UploadItem, UploadItemResponse};
pub use role::Role;
