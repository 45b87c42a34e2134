use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. `password_hash` is absent for accounts that
/// did not originate from password signup; `otp`/`otp_expiry` are set and
/// cleared together.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub profile_pic: Option<String>,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, profile_pic, verified, otp, otp_expiry, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create an unverified account with its first pending OTP.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        otp: &str,
        otp_expiry: OffsetDateTime,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, otp, otp_expiry)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(otp)
        .bind(otp_expiry)
        .fetch_one(db)
        .await
    }

    /// Replace the pending OTP unconditionally.
    pub async fn set_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
        otp_expiry: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET otp = $2, otp_expiry = $3 WHERE id = $1")
            .bind(id)
            .bind(otp)
            .bind(otp_expiry)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Flip the account to verified and clear both OTP fields.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET verified = TRUE, otp = NULL, otp_expiry = NULL WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Consume the pending OTP without touching the verified flag.
    pub async fn clear_otp(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET otp = NULL, otp_expiry = NULL WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
