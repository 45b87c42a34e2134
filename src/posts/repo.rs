use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Listing record. Coordinates are kept as a longitude/latitude pair and the
/// utility labels are validated against the fixed vocabulary before insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub post_type: String,
    pub description: Option<String>,
    pub contact: String,
    pub utilities: Vec<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with the owner's public profile.
#[derive(Debug, FromRow)]
pub struct PostWithOwner {
    #[sqlx(flatten)]
    pub post: Post,
    pub owner_name: String,
    pub owner_profile_pic: Option<String>,
}

/// Proximity-query result; `distance_km` is computed by the database.
#[derive(Debug, FromRow)]
pub struct NearbyPost {
    #[sqlx(flatten)]
    pub post: Post,
    pub owner_name: String,
    pub owner_profile_pic: Option<String>,
    pub distance_km: f64,
}

const POST_COLUMNS: &str = "id, user_id, price, post_type, description, contact, utilities, \
     longitude, latitude, image, created_at, updated_at";

const JOINED_COLUMNS: &str = "p.id, p.user_id, p.price, p.post_type, p.description, p.contact, \
     p.utilities, p.longitude, p.latitude, p.image, p.created_at, p.updated_at, \
     u.name AS owner_name, u.profile_pic AS owner_profile_pic";

pub struct NewPost<'a> {
    pub user_id: Uuid,
    pub price: f64,
    pub post_type: &'a str,
    pub description: Option<&'a str>,
    pub contact: &'a str,
    pub utilities: Vec<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub image: Option<String>,
}

impl Post {
    pub async fn create(db: &PgPool, new: NewPost<'_>) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts
                 (user_id, price, post_type, description, contact, utilities,
                  longitude, latitude, image)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {POST_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(new.price)
        .bind(new.post_type)
        .bind(new.description)
        .bind(new.contact)
        .bind(&new.utilities)
        .bind(new.longitude)
        .bind(new.latitude)
        .bind(new.image)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(post)
    }

    /// Full replacement of the mutable fields; `updated_at` is bumped by the
    /// store. Last writer wins.
    pub async fn update(db: &PgPool, id: Uuid, new: NewPost<'_>) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts
             SET price = $2, post_type = $3, description = $4, contact = $5,
                 utilities = $6, longitude = $7, latitude = $8, image = $9,
                 updated_at = now()
             WHERE id = $1
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(new.price)
        .bind(new.post_type)
        .bind(new.description)
        .bind(new.contact)
        .bind(&new.utilities)
        .bind(new.longitude)
        .bind(new.latitude)
        .bind(new.image)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<PostWithOwner>> {
        let rows = sqlx::query_as::<_, PostWithOwner>(&format!(
            "SELECT {JOINED_COLUMNS}
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.user_id = $1
             ORDER BY p.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Posts within `radius_km` of the given point, nearest first. Distance
    /// is great-circle, computed by the `haversine_km` SQL function.
    pub async fn nearby(
        db: &PgPool,
        longitude: f64,
        latitude: f64,
        radius_km: f64,
    ) -> anyhow::Result<Vec<NearbyPost>> {
        let rows = sqlx::query_as::<_, NearbyPost>(&format!(
            "SELECT {JOINED_COLUMNS},
                    haversine_km($1, $2, p.longitude, p.latitude) AS distance_km
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE haversine_km($1, $2, p.longitude, p.latitude) <= $3
             ORDER BY distance_km ASC"
        ))
        .bind(longitude)
        .bind(latitude)
        .bind(radius_km)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Newest-first page of posts with optional description substring, exact
    /// type and price-range filters.
    pub async fn latest(
        db: &PgPool,
        limit: i64,
        offset: i64,
        search: Option<&str>,
        post_type: Option<&str>,
        min_price: Option<f64>,
        max_price: Option<f64>,
    ) -> anyhow::Result<Vec<PostWithOwner>> {
        let rows = sqlx::query_as::<_, PostWithOwner>(&format!(
            "SELECT {JOINED_COLUMNS}
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE ($3::text IS NULL OR p.description ILIKE '%' || $3 || '%')
               AND ($4::text IS NULL OR p.post_type = $4)
               AND ($5::float8 IS NULL OR p.price >= $5)
               AND ($6::float8 IS NULL OR p.price <= $6)
             ORDER BY p.created_at DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .bind(search)
        .bind(post_type)
        .bind(min_price)
        .bind(max_price)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Retention sweep: drop posts older than the configured window.
    /// Returns the number of rows removed.
    pub async fn delete_older_than(db: &PgPool, days: i32) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM posts WHERE created_at < now() - make_interval(days => $1)",
        )
        .bind(days)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }
}
