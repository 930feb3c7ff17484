use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::place::PlaceRow;
use crate::database::models::{NewPlace, Place, User};
use crate::database::repository::{PlaceRepository, Store, UnitOfWork, UserRepository};

const PLACE_COLUMNS: &str = "id, title, description, address, lat, lng, image, creator, created_at";

/// PostgreSQL-backed store. Multi-record writes run in a single SQL transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceRepository for PgStore {
    async fn find_place(&self, id: Uuid) -> Result<Option<Place>, DatabaseError> {
        let sql = format!("SELECT {PLACE_COLUMNS} FROM places WHERE id = $1");
        let row = sqlx::query_as::<_, PlaceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Place::from))
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, DatabaseError> {
        let sql = format!("SELECT {PLACE_COLUMNS} FROM places WHERE creator = $1 ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, PlaceRow>(&sql)
            .bind(creator)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Place::from).collect())
    }

    async fn update_place(&self, place: &Place) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE places SET title = $2, description = $3 WHERE id = $1")
            .bind(place.id)
            .bind(&place.title)
            .bind(&place.description)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, places, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO users (id, name, places, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.places)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

/// Wraps an open transaction; sqlx rolls it back when dropped uncommitted.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, DatabaseError> {
        let sql = format!(
            "INSERT INTO places (title, description, address, lat, lng, image, creator) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PLACE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PlaceRow>(&sql)
            .bind(&place.title)
            .bind(&place.description)
            .bind(&place.address)
            .bind(place.location.lat)
            .bind(place.location.lng)
            .bind(&place.image)
            .bind(place.creator)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.into())
    }

    async fn delete_place(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM places WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("place {id}")));
        }
        Ok(())
    }

    async fn append_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET places = CASE WHEN $2 = ANY(places) THEN places \
             ELSE array_append(places, $2) END WHERE id = $1",
        )
        .bind(user_id)
        .bind(place_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn remove_place(&mut self, user_id: Uuid, place_id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET places = array_remove(places, $2) WHERE id = $1")
            .bind(user_id)
            .bind(place_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}
