use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::models::{NewPlace, Place};
use crate::database::{DatabaseError, PlaceRepository, Store, UserRepository};
use crate::services::geocoder::{GeocodeError, Geocoder};
use crate::services::image_store::{ImageError, ImageStore, ImageUpload};

const MIN_DESCRIPTION_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Invalid inputs passed, please check your data")]
    Validation { field_errors: HashMap<String, String> },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Could not find location for the specified address")]
    Geocoding(#[source] GeocodeError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),
}

impl PlaceError {
    fn field(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.into());
        PlaceError::Validation { field_errors }
    }

    fn store(context: &str, err: DatabaseError) -> Self {
        error!("{}: {}", context, err);
        PlaceError::StoreUnavailable(err.to_string())
    }

    fn transaction(context: &str, err: DatabaseError) -> Self {
        error!("{}: {}", context, err);
        PlaceError::Transaction(err.to_string())
    }
}

impl From<ImageError> for PlaceError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Io(e) => {
                error!("Storing uploaded image failed: {}", e);
                PlaceError::StoreUnavailable(e.to_string())
            }
            other => PlaceError::field("image", other.to_string()),
        }
    }
}

/// Fields supplied when creating a place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
}

/// Fields an owner may change after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceUpdate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

fn check_text(errors: &mut HashMap<String, String>, field: &str, value: &str, min_len: usize) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.insert(field.to_string(), "This field is required".to_string());
    } else if len < min_len {
        errors.insert(field.to_string(), format!("Must be at least {min_len} characters"));
    }
}

fn finish(errors: HashMap<String, String>) -> Result<(), PlaceError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PlaceError::Validation { field_errors: errors })
    }
}

impl PlaceInput {
    pub fn validate(&self) -> Result<(), PlaceError> {
        let mut errors = HashMap::new();
        check_text(&mut errors, "title", &self.title, 1);
        check_text(&mut errors, "description", &self.description, MIN_DESCRIPTION_LEN);
        check_text(&mut errors, "address", &self.address, 1);
        finish(errors)
    }
}

impl PlaceUpdate {
    pub fn validate(&self) -> Result<(), PlaceError> {
        let mut errors = HashMap::new();
        check_text(&mut errors, "title", &self.title, 1);
        check_text(&mut errors, "description", &self.description, MIN_DESCRIPTION_LEN);
        finish(errors)
    }
}

/// Malformed ids cannot name an existing record.
fn parse_id(id: &str, what: &str) -> Result<Uuid, PlaceError> {
    Uuid::parse_str(id).map_err(|_| PlaceError::NotFound(format!("Could not find {what} for the provided id.")))
}

/// Place lifecycle: keeps every place and its creator's place list in step.
pub struct PlaceService {
    store: Arc<dyn Store>,
    geocoder: Arc<dyn Geocoder>,
    images: Arc<dyn ImageStore>,
}

impl PlaceService {
    pub fn new(store: Arc<dyn Store>, geocoder: Arc<dyn Geocoder>, images: Arc<dyn ImageStore>) -> Self {
        Self { store, geocoder, images }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn fetch_by_id(&self, place_id: &str) -> Result<Place, PlaceError> {
        let id = parse_id(place_id, "place")?;
        self.store
            .find_place(id)
            .await
            .map_err(|e| PlaceError::store("Fetching place failed", e))?
            .ok_or_else(|| PlaceError::NotFound("Could not find place for the provided id.".to_string()))
    }

    /// An owner without places answers `NotFound`, not an empty list.
    pub async fn fetch_by_owner(&self, user_id: &str) -> Result<Vec<Place>, PlaceError> {
        let not_found = || PlaceError::NotFound("Could not find places for the provided user id.".to_string());
        let id = Uuid::parse_str(user_id).map_err(|_| not_found())?;

        let places = self
            .store
            .find_places_by_creator(id)
            .await
            .map_err(|e| PlaceError::store("Fetching places failed", e))?;

        if places.is_empty() {
            return Err(not_found());
        }
        Ok(places)
    }

    pub async fn create(&self, input: PlaceInput, image: String, caller: Uuid) -> Result<Place, PlaceError> {
        input.validate()?;

        let location = self.geocoder.resolve(input.address.trim()).await.map_err(|e| {
            warn!("Geocoding '{}' failed: {}", input.address, e);
            PlaceError::Geocoding(e)
        })?;

        let user = self
            .store
            .find_user(caller)
            .await
            .map_err(|e| PlaceError::store("Creating place failed", e))?
            .ok_or_else(|| PlaceError::NotFound("Could not find user for provided id.".to_string()))?;

        let new_place = NewPlace {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            address: input.address.trim().to_string(),
            location,
            image,
            creator: user.id,
        };

        let place = self
            .insert_and_link(new_place)
            .await
            .map_err(|e| PlaceError::transaction("Creating place failed", e))?;

        info!("Created place {} for user {}", place.id, user.id);
        Ok(place)
    }

    async fn insert_and_link(&self, new_place: NewPlace) -> Result<Place, DatabaseError> {
        let mut uow = self.store.begin().await?;
        let place = uow.insert_place(new_place).await?;
        uow.append_place(place.creator, place.id).await?;
        uow.commit().await?;
        Ok(place)
    }

    /// Stores the uploaded image, then creates the place. The image is
    /// discarded again when creation fails.
    pub async fn create_with_upload(
        &self,
        input: PlaceInput,
        upload: ImageUpload,
        caller: Uuid,
    ) -> Result<Place, PlaceError> {
        input.validate()?;
        let image = self.images.save(upload).await?;

        match self.create(input, image.clone(), caller).await {
            Ok(place) => Ok(place),
            Err(e) => {
                self.images.discard(&image);
                Err(e)
            }
        }
    }

    pub async fn update(&self, place_id: &str, input: PlaceUpdate, caller: Uuid) -> Result<Place, PlaceError> {
        let place = self.fetch_owned(place_id, caller).await?;
        self.apply_update(place, input).await
    }

    /// Loads a place the caller may edit; `Forbidden` for anyone but its creator.
    pub async fn fetch_owned(&self, place_id: &str, caller: Uuid) -> Result<Place, PlaceError> {
        let place = self.fetch_by_id(place_id).await?;
        if place.creator != caller {
            return Err(PlaceError::Forbidden("You are not allowed to edit this place.".to_string()));
        }
        Ok(place)
    }

    /// Writes new title and description to a place returned by `fetch_owned`.
    pub async fn apply_update(&self, mut place: Place, input: PlaceUpdate) -> Result<Place, PlaceError> {
        input.validate()?;
        place.title = input.title.trim().to_string();
        place.description = input.description.trim().to_string();

        let updated = self
            .store
            .update_place(&place)
            .await
            .map_err(|e| PlaceError::store("Updating place failed", e))?;
        if !updated {
            return Err(PlaceError::NotFound("Could not find place for the provided id.".to_string()));
        }

        info!("Updated place {}", place.id);
        Ok(place)
    }

    pub async fn delete(&self, place_id: &str, caller: Uuid) -> Result<(), PlaceError> {
        let place = self.fetch_by_id(place_id).await?;

        let creator = self
            .store
            .find_user(place.creator)
            .await
            .map_err(|e| PlaceError::store("Deleting place failed", e))?
            .ok_or_else(|| {
                error!("Place {} references missing user {}", place.id, place.creator);
                PlaceError::NotFound("Could not find user for this place.".to_string())
            })?;

        if creator.id != caller {
            return Err(PlaceError::Forbidden("You are not allowed to delete this place.".to_string()));
        }

        self.delete_and_unlink(&place)
            .await
            .map_err(|e| PlaceError::transaction("Deleting place failed", e))?;

        info!("Deleted place {} of user {}", place.id, creator.id);

        // Detached; the outcome never reaches the caller.
        self.images.discard(&place.image);
        Ok(())
    }

    async fn delete_and_unlink(&self, place: &Place) -> Result<(), DatabaseError> {
        let mut uow = self.store.begin().await?;
        uow.delete_place(place.id).await?;
        uow.remove_place(place.creator, place.id).await?;
        uow.commit().await
    }
}
