use course_core::model::{Profile, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_profile_row};
use crate::repository::{ProfileRepository, StorageError};

impl SqliteRepository {
    /// Write a full profile row, role included. The backend assigns roles;
    /// locally only the seed tool does.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let role: Option<String> = profile.role.clone().into();
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, username, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                role = excluded.role
            ",
        )
        .bind(profile.user_id.to_string())
        .bind(profile.username.as_deref())
        .bind(role)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let row = sqlx::query("SELECT user_id, username, role FROM profiles WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => map_profile_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn upsert_username(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<Profile, StorageError> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, username)
            VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET username = excluded.username
            ",
        )
        .bind(user_id.to_string())
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.get_profile(user_id).await
    }
}
