//! Stored image files
//!
//! Uploads live under the media directory of the root folder. Paths stored
//! in the database are relative to it and always produced here:
//! - `sheep_images/{tag}_{uuidhex}.{ext}`
//! - `lambing_images/{tag}_{YYYYMMDD}_{uuidhex}.{ext}`

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const SHEEP_IMAGE_DIR: &str = "sheep_images";
pub const LAMBING_IMAGE_DIR: &str = "lambing_images";

/// Media directory on disk
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a stored relative path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write an upload, creating its directory when needed
    pub async fn save(&self, relative: &str, bytes: &[u8]) -> ApiResult<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Remove a stored file; failures are logged and otherwise ignored
    pub async fn remove(&self, relative: &str) {
        let path = self.absolute(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

/// Relative path for a new sheep image
pub fn sheep_image_path(tag_number: &str, ext: &str) -> String {
    format!(
        "{}/{}_{}.{}",
        SHEEP_IMAGE_DIR,
        file_tag(tag_number),
        Uuid::new_v4().simple(),
        ext
    )
}

/// Relative path for a new lambing image, dated by the lambing
pub fn lambing_image_path(tag_number: &str, date: NaiveDate, ext: &str) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        LAMBING_IMAGE_DIR,
        file_tag(tag_number),
        date.format("%Y%m%d"),
        Uuid::new_v4().simple(),
        ext
    )
}

/// Tag number made safe for a file name; empty becomes `unknown`
fn file_tag(tag_number: &str) -> String {
    let cleaned: String = tag_number
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Sniff the upload's content and return the file extension for its format
///
/// The client-supplied file name is never trusted; a `.png` name on JPEG
/// bytes is stored as `.jpg`.
pub fn image_extension(bytes: &[u8]) -> ApiResult<&'static str> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            debug!("Upload detected as {}", kind.mime_type());
            Ok(kind.extension())
        }
        _ => Err(ApiError::BadRequest(
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        )),
    }
}
