//! API utility functions
//!
//! Stateless helpers for building file responses.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use crate::api::error::ApiError;
use crate::storage::StoredStream;

/// MIME type for a stored file, derived from its extension
pub fn content_type_for(file_name: &str) -> mime::Mime {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "m4a" | "aac" => "audio/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "ogg" | "opus" => "audio/ogg".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "wav" => "audio/wav".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "flac" => "audio/flac".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "webp" => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// `200 OK` streaming `file` as a download named `file_name`
pub fn attachment(file_name: &str, file: StoredStream) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|e| ApiError::Internal(format!("invalid file name header: {e}")))?;
    let content_type = HeaderValue::from_str(content_type_for(file_name).as_ref())
        .map_err(|e| ApiError::Internal(format!("invalid content type header: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, file.size)
        .body(Body::from_stream(file.chunks))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
