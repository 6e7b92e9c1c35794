//! Proof-of-delivery photo handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::compression::{CompressedImage, SourceImage};
use crate::errors::{AppError, AppResult};
use crate::upload::{PhotoFolder, UploadedPhoto, object_path};
use crate::utils::format_bytes;
use crate::web::{
    AppState,
    responses::{created, handle_error},
};

pub const QUALITY_HEADER: &str = "x-photo-quality";
pub const WIDTH_HEADER: &str = "x-photo-width";
pub const HEIGHT_HEADER: &str = "x-photo-height";
pub const ATTEMPTS_HEADER: &str = "x-photo-attempts";

async fn compress(state: &AppState, body: Bytes) -> AppResult<CompressedImage> {
    if body.is_empty() {
        return Err(AppError::validation("Request body must contain an image"));
    }

    let input_len = body.len();
    let photo = state.compressor.compress(SourceImage::from_bytes(body)).await?;
    info!(
        "Compressed photo {} -> {} ({}x{}, quality {:.2}, {} attempt(s))",
        format_bytes(input_len),
        format_bytes(photo.len()),
        photo.width,
        photo.height,
        photo.quality,
        photo.attempts.len()
    );
    Ok(photo)
}

fn header_value(value: impl ToString) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Compress a raw photo and return the JPEG
///
/// Pipeline results are reported in `x-photo-*` response headers.
pub async fn compress_photo(State(state): State<AppState>, body: Bytes) -> Response {
    match compress(&state, body).await {
        Ok(photo) => {
            let headers = [
                (header::CONTENT_TYPE, HeaderValue::from_static(photo.mime_type())),
                (
                    header::HeaderName::from_static(QUALITY_HEADER),
                    header_value(format!("{:.2}", photo.quality)),
                ),
                (
                    header::HeaderName::from_static(WIDTH_HEADER),
                    header_value(photo.width),
                ),
                (
                    header::HeaderName::from_static(HEIGHT_HEADER),
                    header_value(photo.height),
                ),
                (
                    header::HeaderName::from_static(ATTEMPTS_HEADER),
                    header_value(photo.attempts.len()),
                ),
            ];
            (StatusCode::OK, headers, photo.bytes).into_response()
        }
        Err(e) => handle_error(e).into_response(),
    }
}

async fn compress_and_upload(
    state: &AppState,
    folder: &str,
    parcel_id: &str,
    body: Bytes,
) -> AppResult<UploadedPhoto> {
    let folder: PhotoFolder = folder.parse()?;
    // reject a bad parcel id before spending time on compression
    object_path(folder, parcel_id)?;

    let uploader = state
        .uploader
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Photo storage"))?;

    let photo = compress(state, body).await?;
    Ok(uploader.upload(folder, parcel_id, &photo).await?)
}

/// Compress a photo and store it as the pickup or delivery photo of a parcel
pub async fn upload_photo(
    State(state): State<AppState>,
    Path((folder, parcel_id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    match compress_and_upload(&state, &folder, &parcel_id, body).await {
        Ok(uploaded) => created(uploaded).into_response(),
        Err(e) => handle_error(e).into_response(),
    }
}
