use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

use super::{FoodEntry, FoodType, Store, User};
use crate::error::AppError;

#[derive(Debug, Clone)]
struct EntryRecord {
    id: i64,
    description: String,
    datetime: OffsetDateTime,
    kind: FoodType,
    user_id: i64,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    entries: Vec<EntryRecord>,
}

impl Tables {
    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn snapshot(&self, rec: &EntryRecord, owner: &User) -> FoodEntry {
        FoodEntry {
            id: rec.id,
            description: rec.description.clone(),
            datetime: rec.datetime,
            kind: rec.kind,
            user: owner.owner(),
        }
    }
}

/// Process-local store with the same uniqueness and ownership rules as the
/// Postgres schema. Ids are assigned sequentially from 1.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[instrument(skip(self, password_hash))]
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        city: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(AppError::DuplicateEmail);
        }
        if tables.users.iter().any(|u| u.username == username) {
            return Err(AppError::DuplicateUsername);
        }

        let user = User {
            id: tables.users.len() as i64 + 1,
            username: username.to_owned(),
            email: email.to_owned(),
            city: city.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        debug!(user_id = user.id, "user saved to memory store");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    #[instrument(skip(self, description))]
    async fn create_food_entry(
        &self,
        description: &str,
        datetime: OffsetDateTime,
        kind: FoodType,
        owner_id: i64,
    ) -> Result<FoodEntry, AppError> {
        let mut tables = self.tables.write().await;
        let owner = tables.user(owner_id).cloned().ok_or(AppError::UnknownOwner)?;

        let rec = EntryRecord {
            id: tables.entries.len() as i64 + 1,
            description: description.to_owned(),
            datetime,
            kind,
            user_id: owner_id,
        };
        let entry = tables.snapshot(&rec, &owner);
        tables.entries.push(rec);
        debug!(entry_id = entry.id, "food entry saved to memory store");
        Ok(entry)
    }

    async fn list_food_entries(
        &self,
        city: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<FoodEntry>, AppError> {
        let tables = self.tables.read().await;
        trace!(city, %since, total = tables.entries.len(), "scanning entries");
        let out = tables
            .entries
            .iter()
            .filter(|rec| rec.datetime >= since)
            .filter_map(|rec| {
                tables
                    .user(rec.user_id)
                    .filter(|owner| owner.city == city)
                    .map(|owner| tables.snapshot(rec, owner))
            })
            .collect();
        Ok(out)
    }
}
