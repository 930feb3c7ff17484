// handlers/places.rs - /api/places handlers
//
// Reads are public. Writes run behind jwt_auth_middleware, which supplies
// the caller as an AuthUser extension.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Multipart, Path, State};
use axum::Json;
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::Place;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ImageUpload, PlaceError, PlaceInput, PlaceUpdate};

#[derive(Debug, Serialize)]
pub struct PlaceBody {
    pub place: Place,
}

#[derive(Debug, Serialize)]
pub struct PlacesBody {
    pub places: Vec<Place>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

/// GET /api/places/:pid
pub async fn get_by_id(State(state): State<AppState>, Path(pid): Path<String>) -> ApiResult<PlaceBody> {
    let place = state.places.fetch_by_id(&pid).await?;
    Ok(ApiResponse::success(PlaceBody { place }))
}

/// GET /api/places/user/:uid
pub async fn get_by_user(State(state): State<AppState>, Path(uid): Path<String>) -> ApiResult<PlacesBody> {
    let places = state.places.fetch_by_owner(&uid).await?;
    Ok(ApiResponse::success(PlacesBody { places }))
}

/// POST /api/places - multipart form with title, description, address and an image file
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<PlaceBody> {
    let (input, upload) = read_place_form(multipart).await?;

    let Some(upload) = upload else {
        let mut field_errors = match input.validate() {
            Err(PlaceError::Validation { field_errors }) => field_errors,
            _ => HashMap::new(),
        };
        field_errors.insert("image".to_string(), "An image is required".to_string());
        return Err(PlaceError::Validation { field_errors }.into());
    };

    let place = state.places.create_with_upload(input, upload, user.user_id).await?;
    Ok(ApiResponse::created(PlaceBody { place }))
}

/// PATCH /api/places/:pid - JSON body with title and description
///
/// Ownership is checked before the body is looked at, so a non-owner is
/// rejected whatever they send.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(pid): Path<String>,
    body: Result<Json<PlaceUpdate>, JsonRejection>,
) -> ApiResult<PlaceBody> {
    let place = state.places.fetch_owned(&pid, user.user_id).await?;

    let Json(input) = body.map_err(|rejection| {
        tracing::debug!("Rejected update body: {}", rejection.body_text());
        let mut field_errors = HashMap::new();
        field_errors.insert("body".to_string(), rejection.body_text());
        PlaceError::Validation { field_errors }
    })?;

    let place = state.places.apply_update(place, input).await?;
    Ok(ApiResponse::success(PlaceBody { place }))
}

/// DELETE /api/places/:pid
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(pid): Path<String>,
) -> ApiResult<MessageBody> {
    state.places.delete(&pid, user.user_id).await?;
    Ok(ApiResponse::success(MessageBody {
        message: "Deleted place.".to_string(),
    }))
}

async fn read_place_form(mut multipart: Multipart) -> Result<(PlaceInput, Option<ImageUpload>), ApiError> {
    let mut input = PlaceInput::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" | "description" | "address" => {
                let value = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                match name.as_str() {
                    "title" => input.title = value,
                    "description" => input.description = value,
                    _ => input.address = value,
                }
            }
            "image" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                upload = Some(ImageUpload {
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok((input, upload))
}
