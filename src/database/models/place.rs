use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: Location,
    pub image: String,
    pub creator: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A place that has not been written yet; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlace {
    pub title: String,
    pub description: String,
    pub address: String,
    pub location: Location,
    pub image: String,
    pub creator: Uuid,
}

impl NewPlace {
    pub(crate) fn into_place(self, id: Uuid, created_at: DateTime<Utc>) -> Place {
        Place {
            id,
            title: self.title,
            description: self.description,
            address: self.address,
            location: self.location,
            image: self.image,
            creator: self.creator,
            created_at,
        }
    }
}

/// Flat row shape of the `places` table.
#[derive(Debug, FromRow)]
pub(crate) struct PlaceRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub image: String,
    pub creator: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            address: row.address,
            location: Location {
                lat: row.lat,
                lng: row.lng,
            },
            image: row.image,
            creator: row.creator,
            created_at: row.created_at,
        }
    }
}
