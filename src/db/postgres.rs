use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::{FoodEntry, FoodType, Owner, Store, User};
use crate::error::AppError;

const USERS_EMAIL_KEY: &str = "users_email_key";
const USERS_USERNAME_KEY: &str = "users_username_key";

#[derive(Debug, FromRow)]
struct FoodEntryRow {
    id: i64,
    description: String,
    datetime: OffsetDateTime,
    kind: FoodType,
    user_id: i64,
    username: String,
    city: String,
}

impl From<FoodEntryRow> for FoodEntry {
    fn from(r: FoodEntryRow) -> Self {
        Self {
            id: r.id,
            description: r.description,
            datetime: r.datetime,
            kind: r.kind,
            user: Owner {
                id: r.user_id,
                username: r.username,
                city: r.city,
            },
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    /// Applies pending migrations; safe to run on every start.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, password_hash))]
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        city: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, city, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, city, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(city)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(constraint = ?db.constraint(), "unique violation on users");
                match db.constraint() {
                    Some(USERS_EMAIL_KEY) => Err(AppError::DuplicateEmail),
                    Some(USERS_USERNAME_KEY) => Err(AppError::DuplicateUsername),
                    _ => Err(anyhow::anyhow!("unexpected unique violation: {}", db).into()),
                }
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, city, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, city, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    #[instrument(skip(self, description))]
    async fn create_food_entry(
        &self,
        description: &str,
        datetime: OffsetDateTime,
        kind: FoodType,
        owner_id: i64,
    ) -> Result<FoodEntry, AppError> {
        let res = sqlx::query_as::<_, FoodEntryRow>(
            r#"
            WITH inserted AS (
                INSERT INTO food_entries (description, datetime, type, user_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, description, datetime, type, user_id
            )
            SELECT i.id, i.description, i.datetime, i.type AS kind,
                   u.id AS user_id, u.username, u.city
              FROM inserted i
              JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(description)
        .bind(datetime)
        .bind(kind)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::UnknownOwner)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert food entry").into()),
        }
    }

    async fn list_food_entries(
        &self,
        city: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<FoodEntry>, AppError> {
        let rows = sqlx::query_as::<_, FoodEntryRow>(
            r#"
            SELECT f.id, f.description, f.datetime, f.type AS kind,
                   u.id AS user_id, u.username, u.city
              FROM food_entries f
              JOIN users u ON u.id = f.user_id
             WHERE u.city = $1
               AND f.datetime >= $2
             ORDER BY f.id ASC
            "#,
        )
        .bind(city)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("list food entries")?;
        Ok(rows.into_iter().map(FoodEntry::from).collect())
    }
}
