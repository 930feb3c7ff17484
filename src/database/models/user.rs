use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Owned place ids in insertion order, no duplicates.
    pub places: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            places: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn owns(&self, place_id: Uuid) -> bool {
        self.places.contains(&place_id)
    }

    /// Returns false when the id was already present.
    pub(crate) fn append_place(&mut self, place_id: Uuid) -> bool {
        if self.owns(place_id) {
            return false;
        }
        self.places.push(place_id);
        true
    }

    /// Returns false when the id was not present.
    pub(crate) fn remove_place(&mut self, place_id: Uuid) -> bool {
        let before = self.places.len();
        self.places.retain(|id| *id != place_id);
        self.places.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_order_and_skips_duplicates() {
        let mut user = User::new("ada");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(user.append_place(a));
        assert!(user.append_place(b));
        assert!(!user.append_place(a));
        assert_eq!(user.places, vec![a, b]);
    }

    #[test]
    fn remove_reports_missing_ids() {
        let mut user = User::new("ada");
        let a = Uuid::new_v4();
        user.append_place(a);

        assert!(user.remove_place(a));
        assert!(!user.remove_place(a));
        assert!(user.places.is_empty());
    }
}
