use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as SyncMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewPlace, Place, User};
use crate::database::repository::{PlaceRepository, Store, UnitOfWork, UserRepository};

/// Write steps that can be made to fail once, for exercising rollback paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    InsertPlace,
    DeletePlace,
    AppendPlace,
    RemovePlace,
    Commit,
}

impl FaultPoint {
    fn name(self) -> &'static str {
        match self {
            FaultPoint::InsertPlace => "insert_place",
            FaultPoint::DeletePlace => "delete_place",
            FaultPoint::AppendPlace => "append_place",
            FaultPoint::RemovePlace => "remove_place",
            FaultPoint::Commit => "commit",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub users: HashMap<Uuid, User>,
    /// Insertion order
    pub places: Vec<Place>,
}

/// In-process store. A unit of work holds the store lock for its whole lifetime
/// and edits a staged copy, so transactions are serialized and all-or-nothing.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemorySnapshot>>,
    faults: Arc<SyncMutex<HashSet<FaultPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call at `point` fail with `DatabaseError::Injected`.
    pub fn fail_next(&self, point: FaultPoint) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point);
        }
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        self.state.lock().await.clone()
    }
}

fn trip(faults: &SyncMutex<HashSet<FaultPoint>>, point: FaultPoint) -> Result<(), DatabaseError> {
    let tripped = faults.lock().map(|mut f| f.remove(&point)).unwrap_or(false);
    if tripped {
        return Err(DatabaseError::Injected(point.name()));
    }
    Ok(())
}

#[async_trait]
impl PlaceRepository for MemoryStore {
    async fn find_place(&self, id: Uuid) -> Result<Option<Place>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.places.iter().find(|p| p.id == id).cloned())
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.places.iter().filter(|p| p.creator == creator).cloned().collect())
    }

    async fn update_place(&self, place: &Place) -> Result<bool, DatabaseError> {
        let mut state = self.state.lock().await;
        match state.places.iter_mut().find(|p| p.id == place.id) {
            Some(stored) => {
                stored.title = place.title.clone();
                stored.description = place.description.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(DatabaseError::QueryError(format!("user {} already exists", user.id)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemorySnapshot>,
    staged: MemorySnapshot,
    faults: Arc<SyncMutex<HashSet<FaultPoint>>>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, DatabaseError> {
        trip(&self.faults, FaultPoint::InsertPlace)?;
        let place = place.into_place(Uuid::new_v4(), Utc::now());
        self.staged.places.push(place.clone());
        Ok(place)
    }

    async fn delete_place(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        trip(&self.faults, FaultPoint::DeletePlace)?;
        let before = self.staged.places.len();
        self.staged.places.retain(|p| p.id != id);
        if self.staged.places.len() == before {
            return Err(DatabaseError::NotFound(format!("place {id}")));
        }
        Ok(())
    }

    async fn append_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError> {
        trip(&self.faults, FaultPoint::AppendPlace)?;
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {user_id}")))?;
        user.append_place(place_id);
        Ok(())
    }

    async fn remove_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError> {
        trip(&self.faults, FaultPoint::RemovePlace)?;
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {user_id}")))?;
        user.remove_place(place_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        trip(&self.faults, FaultPoint::Commit)?;
        let MemoryUnitOfWork { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Location;

    fn new_place(creator: Uuid) -> NewPlace {
        NewPlace {
            title: "Cafe".to_string(),
            description: "Corner cafe".to_string(),
            address: "1 Main St".to_string(),
            location: Location { lat: 1.0, lng: 2.0 },
            image: "uploads/images/cafe.png".to_string(),
            creator,
        }
    }

    #[tokio::test]
    async fn uncommitted_work_is_discarded() {
        let store = MemoryStore::new();
        let user = User::new("ada");
        store.save_user(&user).await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            let place = uow.insert_place(new_place(user.id)).await.unwrap();
            uow.append_place(user.id, place.id).await.unwrap();
        }

        let snapshot = store.snapshot().await;
        assert!(snapshot.places.is_empty());
        assert!(snapshot.users[&user.id].places.is_empty());
    }

    #[tokio::test]
    async fn committed_work_is_visible() {
        let store = MemoryStore::new();
        let user = User::new("ada");
        store.save_user(&user).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let place = uow.insert_place(new_place(user.id)).await.unwrap();
        uow.append_place(user.id, place.id).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.find_place(place.id).await.unwrap(), Some(place.clone()));
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().places, vec![place.id]);
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(FaultPoint::InsertPlace);

        let mut uow = store.begin().await.unwrap();
        let err = uow.insert_place(new_place(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Injected("insert_place")));
        assert!(uow.insert_place(new_place(Uuid::new_v4())).await.is_ok());
    }

    #[tokio::test]
    async fn remove_from_missing_user_fails() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = uow.remove_place(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
