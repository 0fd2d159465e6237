use crate::error::AppResult;
use actix_web::web;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory under the media root that holds post images.
pub const POST_IMAGE_DIR: &str = "posts";

/// An image file received with a post form, held in memory until the form validates.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    /// Bytes received, including any that were dropped past the size limit.
    pub size: u64,
}

/// Maps an accepted image MIME type to the extension it is stored under.
/// Not configurable, so uploads can never land with an executable extension.
pub fn image_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
    ].iter().cloned().collect();

    map.get(mime_type).cloned()
}

/// Checks the leading bytes against the signature of the declared type.
pub fn matches_image_signature(mime_type: &str, data: &[u8]) -> bool {
    match mime_type {
        "image/png" => data.starts_with(b"\x89PNG\r\n\x1a\n"),
        "image/jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/gif" => data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a"),
        "image/webp" => data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
        _ => false,
    }
}

/// Writes a validated image below `media_root` and returns its path relative
/// to the media root (`posts/<uuid>.<ext>`).
pub async fn save_post_image(media_root: &Path, image: UploadedImage) -> AppResult<String> {
    let extension = image_extension(&image.content_type).unwrap_or("bin");
    let file_name = format!("{}.{}", Uuid::new_v4(), extension);
    let dir = PathBuf::from(media_root).join(POST_IMAGE_DIR);
    let final_path = dir.join(&file_name);

    web::block(move || {
        fs::create_dir_all(&dir)?;
        fs::write(&final_path, &image.data)
    })
    .await??;

    Ok(format!("{}/{}", POST_IMAGE_DIR, file_name))
}
