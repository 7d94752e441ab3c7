//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `JournalStore` and `IdentityStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use visual_journal_core::domain::{
    AuthSession, CanvasItem, ItemType, JournalPage, Position, Size, User, UserCredentials,
};
use visual_journal_core::ports::{IdentityStore, JournalStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence and identity ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn page_items(&self, page_id: Uuid) -> PortResult<Vec<CanvasItem>> {
        let records = sqlx::query_as::<_, ItemRecord>(
            "SELECT id, page_id, item_type, content, audio_content, \
             position_x, position_y, width, height, z_index \
             FROM canvas_items WHERE page_id = $1 ORDER BY seq ASC",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: Option<String>,
    hashed_password: Option<String>,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        match (self.email, self.hashed_password) {
            (Some(email), Some(hashed_password)) => Ok(UserCredentials {
                user_id: self.user_id,
                email,
                hashed_password,
            }),
            // Anonymous accounts have no credentials on file.
            _ => Err(PortError::NotFound(format!(
                "User {} has no credentials",
                self.user_id
            ))),
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct PageRecord {
    id: Uuid,
    date: DateTime<Utc>,
    preview_image: Option<String>,
}
impl PageRecord {
    fn to_domain(self, items: Vec<CanvasItem>) -> JournalPage {
        JournalPage {
            id: self.id,
            date: self.date,
            items,
            preview_image: self.preview_image,
        }
    }
}

#[derive(FromRow)]
struct ItemRecord {
    id: Uuid,
    #[allow(dead_code)]
    page_id: Uuid,
    item_type: String,
    content: String,
    audio_content: Option<String>,
    position_x: f64,
    position_y: f64,
    width: f64,
    height: f64,
    z_index: i64,
}
impl ItemRecord {
    fn to_domain(self) -> PortResult<CanvasItem> {
        let item_type = ItemType::from_tag(&self.item_type).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown item type tag '{}'", self.item_type))
        })?;
        Ok(CanvasItem {
            id: self.id,
            item_type,
            content: self.content,
            audio_content: self.audio_content,
            position: Position {
                x: self.position_x,
                y: self.position_y,
            },
            size: Size {
                width: self.width,
                height: self.height,
            },
            z_index: self.z_index,
        })
    }
}

//=========================================================================================
// `JournalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl JournalStore for DbAdapter {
    /// Writes the page document and all of its item documents in a single
    /// transaction: a failure anywhere aborts the whole save with nothing
    /// written. Items are replaced wholesale, so items dropped from the
    /// working copy disappear from storage on commit.
    async fn save_page(&self, user_id: Uuid, page: &JournalPage) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let upserted = sqlx::query(
            "INSERT INTO journal_pages (id, user_id, date, preview_image) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE \
             SET date = EXCLUDED.date, preview_image = EXCLUDED.preview_image \
             WHERE journal_pages.user_id = EXCLUDED.user_id",
        )
        .bind(page.id)
        .bind(user_id)
        .bind(page.date)
        .bind(&page.preview_image)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        // A conflicting page owned by someone else leaves zero rows touched.
        if upserted.rows_affected() == 0 {
            return Err(PortError::Unauthorized);
        }

        sqlx::query("DELETE FROM canvas_items WHERE page_id = $1")
            .bind(page.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for item in &page.items {
            sqlx::query(
                "INSERT INTO canvas_items \
                 (id, page_id, item_type, content, audio_content, \
                  position_x, position_y, width, height, z_index) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(item.id)
            .bind(page.id)
            .bind(item.item_type.as_str())
            .bind(&item.content)
            .bind(&item.audio_content)
            .bind(item.position.x)
            .bind(item.position.y)
            .bind(item.size.width)
            .bind(item.size.height)
            .bind(item.z_index)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn list_pages(&self, user_id: Uuid) -> PortResult<Vec<JournalPage>> {
        let records = sqlx::query_as::<_, PageRecord>(
            "SELECT id, date, preview_image FROM journal_pages \
             WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut pages = Vec::with_capacity(records.len());
        for record in records {
            let items = self.page_items(record.id).await?;
            pages.push(record.to_domain(items));
        }
        Ok(pages)
    }

    async fn get_page(&self, user_id: Uuid, page_id: Uuid) -> PortResult<JournalPage> {
        let record = sqlx::query_as::<_, PageRecord>(
            "SELECT id, date, preview_image FROM journal_pages \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(page_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Page {} not found", page_id))
            }
            _ => unexpected(e),
        })?;

        let items = self.page_items(page_id).await?;
        Ok(record.to_domain(items))
    }

    async fn delete_page(&self, user_id: Uuid, page_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "DELETE FROM canvas_items WHERE page_id IN \
             (SELECT id FROM journal_pages WHERE id = $1 AND user_id = $2)",
        )
        .bind(page_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM journal_pages WHERE id = $1 AND user_id = $2")
            .bind(page_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Page {} not found", page_id)));
        }

        tx.commit().await.map_err(unexpected)
    }
}

//=========================================================================================
// `IdentityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityStore for DbAdapter {
    async fn create_anonymous_user(&self) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id) VALUES ($1) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) \
             VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                PortError::Unexpected("Email is already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("No user with email {}", email))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_credentials(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", user_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn attach_email(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET email = $2, hashed_password = $3 \
             WHERE user_id = $1 RETURNING user_id, email",
        )
        .bind(user_id)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", user_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let updated = sqlx::query("UPDATE users SET hashed_password = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })
    }

    async fn list_auth_sessions(&self, user_id: Uuid) -> PortResult<Vec<AuthSession>> {
        let records = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, created_at, expires_at FROM auth_sessions \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_record_maps_to_domain() {
        let record = ItemRecord {
            id: Uuid::new_v4(),
            page_id: Uuid::new_v4(),
            item_type: "VIDEO".to_string(),
            content: "/files/clip.webm".to_string(),
            audio_content: None,
            position_x: 90.0,
            position_y: 90.0,
            width: 320.0,
            height: 180.0,
            z_index: 7,
        };

        let item = record.to_domain().unwrap();
        assert_eq!(item.item_type, ItemType::Video);
        assert_eq!(item.position, Position { x: 90.0, y: 90.0 });
        assert_eq!(item.z_index, 7);
    }

    #[test]
    fn unknown_item_tag_is_rejected() {
        let record = ItemRecord {
            id: Uuid::new_v4(),
            page_id: Uuid::new_v4(),
            item_type: "STICKER".to_string(),
            content: String::new(),
            audio_content: None,
            position_x: 0.0,
            position_y: 0.0,
            width: 1.0,
            height: 1.0,
            z_index: 1,
        };
        assert!(record.to_domain().is_err());
    }

    #[test]
    fn credentials_require_both_email_and_hash() {
        let anonymous = CredentialsRecord {
            user_id: Uuid::new_v4(),
            email: None,
            hashed_password: None,
        };
        assert!(matches!(
            anonymous.to_domain(),
            Err(PortError::NotFound(_))
        ));
    }
}
