//! Image upload and deletion
//!
//! Uploads are multipart forms with an `image` file part and an optional
//! `caption` text part. The file is written first; if the database write
//! then fails the file is removed again.

use axum::extract::{rejection::PathRejection, Multipart, Path, State};
use flock_common::db::images::{self, ImageOwner, NewImage};
use flock_common::db::models::StoredImage;
use flock_common::db::{lambing, sheep};
use flock_common::time::today;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::response::{created, done, Mutation};
use crate::error::{ApiError, ApiResult};
use crate::forms::validate_caption;
use crate::media::{image_extension, lambing_image_path, sheep_image_path, MediaStore};
use crate::AppState;

/// Parsed multipart upload
#[derive(Debug)]
struct Upload {
    /// Extension for the sniffed image format
    ext: &'static str,
    bytes: Vec<u8>,
    caption: String,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut file: Option<Vec<u8>> = None;
    let mut caption = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field.bytes().await?;
                file = Some(bytes.to_vec());
            }
            "caption" => {
                caption = field.text().await?;
            }
            _ => {}
        }
    }

    let Some(bytes) = file else {
        return Err(ApiError::BadRequest("No image file was submitted.".to_string()));
    };
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("The submitted file is empty.".to_string()));
    }
    let ext = image_extension(&bytes)?;

    Ok(Upload {
        ext,
        bytes,
        caption: validate_caption(caption)?,
    })
}

/// Write the file, run `record`, and undo the write if `record` fails
async fn store_then<T, F>(media: &MediaStore, relative: &str, bytes: &[u8], record: F) -> ApiResult<T>
where
    F: std::future::Future<Output = flock_common::Result<T>>,
{
    media.save(relative, bytes).await?;
    match record.await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Discarding {} after failed database write: {}", relative, e);
            media.remove(relative).await;
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PrimaryImage {
    pub image: String,
}

/// POST /sheep/:id/images
pub async fn upload_sheep_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Multipart,
) -> ApiResult<Mutation<StoredImage>> {
    let Path(id) = path?;
    let owner = sheep::get(&state.db, id).await?;
    let upload = read_upload(multipart).await?;

    let relative = sheep_image_path(&owner.tag_number, upload.ext);
    let new = NewImage {
        image: relative.clone(),
        caption: upload.caption,
        date_added: today(),
        tag_number: String::new(),
    };
    let image = store_then(
        &state.media,
        &relative,
        &upload.bytes,
        images::attach_new(&state.db, ImageOwner::Sheep, id, &new),
    )
    .await?;
    info!("Added image {} to sheep {}", image.id, owner.tag_number);

    Ok(created(
        format!("Image added to sheep '{}' successfully!", owner.tag_number),
        crate::api::sheep::detail_path(id),
        image,
    ))
}

/// POST /sheep/:id/primary-image
pub async fn upload_sheep_primary(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Multipart,
) -> ApiResult<Mutation<PrimaryImage>> {
    let Path(id) = path?;
    let owner = sheep::get(&state.db, id).await?;
    let upload = read_upload(multipart).await?;

    let relative = sheep_image_path(&owner.tag_number, upload.ext);
    let previous = store_then(
        &state.media,
        &relative,
        &upload.bytes,
        sheep::set_primary_image(&state.db, id, &relative),
    )
    .await?;
    if let Some(previous) = previous.filter(|p| !p.is_empty() && *p != relative) {
        state.media.remove(&previous).await;
    }
    info!("Replaced primary image of sheep {}", owner.tag_number);

    Ok(done(
        format!("Primary image for sheep '{}' updated successfully!", owner.tag_number),
        crate::api::sheep::detail_path(id),
        PrimaryImage { image: relative },
    ))
}

/// DELETE /sheep-images/:id
pub async fn delete_sheep_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<StoredImage>> {
    let Path(id) = path?;
    let owner = images::owner_of(&state.db, ImageOwner::Sheep, id).await?;
    let image = images::delete(&state.db, ImageOwner::Sheep, id).await?;
    state.media.remove(&image.image).await;
    info!("Deleted sheep image {}", id);

    let redirect = owner
        .map(crate::api::sheep::detail_path)
        .unwrap_or_else(|| "/sheep".to_string());
    Ok(done("Image deleted successfully!".to_string(), redirect, image))
}

/// POST /lambing/:id/images
pub async fn upload_lambing_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Multipart,
) -> ApiResult<Mutation<StoredImage>> {
    let Path(id) = path?;
    let record = lambing::get(&state.db, id).await?;
    let upload = read_upload(multipart).await?;

    let relative = lambing_image_path(&record.ewe_tag, record.date, upload.ext);
    let new = NewImage {
        image: relative.clone(),
        caption: upload.caption,
        date_added: today(),
        tag_number: String::new(),
    };
    let image = store_then(
        &state.media,
        &relative,
        &upload.bytes,
        images::attach_new(&state.db, ImageOwner::Lambing, id, &new),
    )
    .await?;
    info!("Added image {} to lambing record {}", image.id, id);

    Ok(created(
        format!("Image added to {} successfully!", record),
        crate::api::lambing::detail_path(id),
        image,
    ))
}

/// POST /lambing/:id/primary-image
pub async fn upload_lambing_primary(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Multipart,
) -> ApiResult<Mutation<PrimaryImage>> {
    let Path(id) = path?;
    let record = lambing::get(&state.db, id).await?;
    let upload = read_upload(multipart).await?;

    let relative = lambing_image_path(&record.ewe_tag, record.date, upload.ext);
    let previous = store_then(
        &state.media,
        &relative,
        &upload.bytes,
        lambing::set_primary_image(&state.db, id, &relative),
    )
    .await?;
    if let Some(previous) = previous.filter(|p| !p.is_empty() && *p != relative) {
        state.media.remove(&previous).await;
    }
    info!("Replaced primary image of lambing record {}", id);

    Ok(done(
        format!("Primary image for {} updated successfully!", record),
        crate::api::lambing::detail_path(id),
        PrimaryImage { image: relative },
    ))
}

/// DELETE /lambing-images/:id
pub async fn delete_lambing_image(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Mutation<StoredImage>> {
    let Path(id) = path?;
    let owner = images::owner_of(&state.db, ImageOwner::Lambing, id).await?;
    let image = images::delete(&state.db, ImageOwner::Lambing, id).await?;
    state.media.remove(&image.image).await;
    info!("Deleted lambing image {}", id);

    let redirect = owner
        .map(crate::api::lambing::detail_path)
        .unwrap_or_else(|| "/lambing".to_string());
    Ok(done("Image deleted successfully!".to_string(), redirect, image))
}
