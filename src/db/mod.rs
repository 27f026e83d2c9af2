use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

pub mod memory;
pub mod postgres;

/// User record in the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub city: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn owner(&self) -> Owner {
        Owner {
            id: self.id,
            username: self.username.clone(),
            city: self.city.clone(),
        }
    }
}

/// Public part of a user, attached to every food entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub id: i64,
    pub username: String,
    pub city: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "food_type", rename_all = "lowercase")]
pub enum FoodType {
    Donate,
    Request,
}

#[derive(Debug, Clone)]
pub struct FoodEntry {
    pub id: i64,
    pub description: String,
    pub datetime: OffsetDateTime,
    pub kind: FoodType,
    pub user: Owner,
}

/// Persistence for users and food entries. Every method is atomic with
/// respect to the backing store and returns owned snapshots.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        city: &str,
        password_hash: &str,
    ) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_food_entry(
        &self,
        description: &str,
        datetime: OffsetDateTime,
        kind: FoodType,
        owner_id: i64,
    ) -> Result<FoodEntry, AppError>;

    /// Entries whose owner lives in exactly `city` and whose timestamp is at
    /// or after `since`, in insertion order.
    async fn list_food_entries(
        &self,
        city: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<FoodEntry>, AppError>;
}
