use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewPlace, Place, User};

/// Read side and single-record writes for places.
#[async_trait]
pub trait PlaceRepository: Send + Sync {
    async fn find_place(&self, id: Uuid) -> Result<Option<Place>, DatabaseError>;

    /// Places created by `creator`, oldest first.
    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, DatabaseError>;

    /// Persists title and description. Returns false when the place no longer exists.
    async fn update_place(&self, place: &Place) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Inserts a new user with an empty place list.
    async fn save_user(&self, user: &User) -> Result<(), DatabaseError>;
}

/// Writes issued through a unit of work become visible together on `commit`.
/// Dropping it without committing rolls every write back.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, DatabaseError>;

    /// Fails with `NotFound` when the place does not exist.
    async fn delete_place(&mut self, id: Uuid) -> Result<(), DatabaseError>;

    /// Adds `place_id` to the user's list; a duplicate leaves the list unchanged.
    async fn append_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError>;

    /// Fails with `NotFound` when the user does not exist.
    async fn remove_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Both repositories plus the transaction that spans them.
#[async_trait]
pub trait Store: PlaceRepository + UserRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
