use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    posts::{
        dto::{LatestQuery, NearbyQuery, PostResponse, PostType, Utility},
        repo::{NewPost, Post},
    },
    state::AppState,
    storage::{ext_from_mime, key_from_url},
};

const DEFAULT_RADIUS_KM: f64 = 10.0;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(nearby_posts))
        .route("/latest-post", get(latest_posts))
        .route("/:id/posts", get(posts_by_user))
        .route("/create-post", post(create_post))
        .route("/edit-post/:id", put(edit_post))
        .route("/:id/delete-post", delete(delete_post))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB, images included
}

/// Fields collected from the multipart create/edit form.
#[derive(Default)]
struct PostForm {
    price: Option<f64>,
    post_type: Option<PostType>,
    description: Option<String>,
    contact: Option<String>,
    utilities: Vec<Utility>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    image: Option<(Bytes, String)>,
}

async fn read_post_form(mut mp: Multipart) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("malformed multipart body".into()))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "image" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::Validation("could not read image field".into()))?;
            if !data.is_empty() {
                form.image = Some((data, content_type));
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::Validation(format!("could not read field '{}'", name)))?;
        match name.as_str() {
            "price" => {
                form.price = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ApiError::Validation("price must be a number".into()))?,
                );
            }
            "type" => {
                form.post_type = Some(PostType::parse(&value).ok_or_else(|| {
                    ApiError::Validation("type must be \"Rent\" or \"Sale\"".into())
                })?);
            }
            "description" => form.description = Some(value),
            "contact" => form.contact = Some(value),
            "utilities" => {
                let utility = Utility::parse(&value).ok_or_else(|| {
                    ApiError::Validation(format!("unknown utility '{}'", value))
                })?;
                if !form.utilities.contains(&utility) {
                    form.utilities.push(utility);
                }
            }
            "latitude" => {
                form.latitude = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ApiError::Validation("latitude must be a number".into()))?,
                );
            }
            "longitude" => {
                form.longitude = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| ApiError::Validation("longitude must be a number".into()))?,
                );
            }
            _ => {} // unknown fields ignored
        }
    }
    Ok(form)
}

/// Owner guard for post mutation. Runs before any field validation so a
/// non-owner is always answered with 403, independent of payload validity.
fn ensure_owner(post: &Post, user_id: Uuid) -> Result<(), ApiError> {
    if post.user_id != user_id {
        warn!(post_id = %post.id, %user_id, owner = %post.user_id, "mutation by non-owner rejected");
        return Err(ApiError::Forbidden(
            "you are not authorized to modify this post",
        ));
    }
    Ok(())
}

/// price, type and both coordinates are mandatory on create and edit.
fn required_fields(form: &PostForm) -> Result<(f64, PostType, f64, f64), ApiError> {
    let (Some(price), Some(post_type), Some(latitude), Some(longitude)) =
        (form.price, form.post_type, form.latitude, form.longitude)
    else {
        return Err(ApiError::Validation("please enter all fields".into()));
    };
    if price <= 0.0 {
        return Err(ApiError::Validation("price must be positive".into()));
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(ApiError::Validation("coordinates out of range".into()));
    }
    Ok((price, post_type, latitude, longitude))
}

async fn upload_image(
    state: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
) -> Result<String, ApiError> {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    let key = format!("posts/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, body, content_type)
        .await
        .map_err(|e| {
            warn!(error = %e, %key, "image upload failed");
            ApiError::Dependency("image upload failed")
        })?;
    Ok(state.storage.public_url(&key))
}

/// Best-effort removal of a previously stored image object.
async fn discard_image(state: &AppState, url: &str) {
    let cfg = &state.config.storage;
    if let Some(key) = key_from_url(url, &cfg.endpoint, &cfg.bucket) {
        if let Err(e) = state.storage.delete_object(&key).await {
            warn!(error = %e, %key, "stale image object not deleted");
        }
    }
}

#[instrument(skip(state, mp))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> Result<Json<PostResponse>, ApiError> {
    let form = read_post_form(mp).await?;
    let (price, post_type, latitude, longitude) = required_fields(&form)?;

    let image = match form.image {
        Some((body, content_type)) => {
            Some(upload_image(&state, user_id, body, &content_type).await?)
        }
        None => None,
    };

    let created = Post::create(
        &state.db,
        NewPost {
            user_id,
            price,
            post_type: post_type.as_str(),
            description: form.description.as_deref(),
            contact: form.contact.as_deref().unwrap_or(""),
            utilities: form.utilities.iter().map(|u| u.as_str().into()).collect(),
            longitude,
            latitude,
            image: image.clone(),
        },
    )
    .await;

    let post = match created {
        Ok(p) => p,
        Err(e) => {
            // Do not orphan the object we just stored.
            if let Some(url) = image.as_deref() {
                discard_image(&state, url).await;
            }
            return Err(e.into());
        }
    };

    info!(post_id = %post.id, %user_id, "post created");
    Ok(Json(post.into()))
}

#[instrument(skip(state, mp))]
pub async fn edit_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<PostResponse>, ApiError> {
    let form = read_post_form(mp).await?;

    let existing = Post::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("post not found"))?;
    ensure_owner(&existing, user_id)?;

    let (price, post_type, latitude, longitude) = required_fields(&form)?;

    // A newly supplied image replaces the stored object; otherwise the
    // existing reference is preserved.
    let image = match form.image {
        Some((body, content_type)) => {
            let url = upload_image(&state, user_id, body, &content_type).await?;
            if let Some(old) = existing.image.as_deref() {
                discard_image(&state, old).await;
            }
            Some(url)
        }
        None => existing.image.clone(),
    };

    let post = Post::update(
        &state.db,
        id,
        NewPost {
            user_id,
            price,
            post_type: post_type.as_str(),
            description: form.description.as_deref(),
            contact: form.contact.as_deref().unwrap_or(""),
            utilities: form.utilities.iter().map(|u| u.as_str().into()).collect(),
            longitude,
            latitude,
            image,
        },
    )
    .await?;

    info!(post_id = %post.id, %user_id, "post updated");
    Ok(Json(post.into()))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let post = Post::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("post not found"))?;
    ensure_owner(&post, user_id)?;

    Post::delete(&state.db, id).await?;
    if let Some(url) = post.image.as_deref() {
        discard_image(&state, url).await;
    }

    info!(post_id = %id, %user_id, "post deleted");
    Ok(Json(
        serde_json::json!({ "message": "post deleted successfully" }),
    ))
}

#[instrument(skip(state))]
pub async fn posts_by_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let rows = Post::list_by_user(&state.db, id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn nearby_posts(
    State(state): State<AppState>,
    Query(q): Query<NearbyQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let (Some(latitude), Some(longitude)) = (q.latitude, q.longitude) else {
        return Err(ApiError::Validation(
            "latitude and longitude are required".into(),
        ));
    };
    let radius_km = q.radius.unwrap_or(DEFAULT_RADIUS_KM);
    if radius_km < 0.0 {
        return Err(ApiError::Validation("radius must be non-negative".into()));
    }

    let rows = Post::nearby(&state.db, longitude, latitude, radius_km).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn latest_posts(
    State(state): State<AppState>,
    Query(q): Query<LatestQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = q.page.unwrap_or(1).max(1);
    let offset = (page - 1) * limit;

    let rows = Post::latest(
        &state.db,
        limit,
        offset,
        q.search.as_deref(),
        q.post_type.map(|t| t.as_str()),
        q.min_price,
        q.max_price,
    )
    .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::repo::Post;
    use crate::state::AppState;
    use crate::storage::StorageClient;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;

    fn post_owned_by(user_id: Uuid) -> Post {
        Post {
            id: Uuid::new_v4(),
            user_id,
            price: 1200.0,
            post_type: "Rent".into(),
            description: None,
            contact: String::new(),
            utilities: vec![],
            longitude: -75.0,
            latitude: 45.0,
            image: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Records which object keys were deleted.
    struct RecordingStorage(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(
            &self,
            _k: &str,
            _b: Bytes,
            _ct: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete_object(&self, k: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(k.to_string());
            Ok(())
        }
        fn public_url(&self, k: &str) -> String {
            format!("https://fake.local/fake/{}", k)
        }
    }

    #[test]
    fn ensure_owner_accepts_the_owner() {
        let owner = Uuid::new_v4();
        assert!(ensure_owner(&post_owned_by(owner), owner).is_ok());
    }

    #[test]
    fn ensure_owner_rejects_everyone_else() {
        let post = post_owned_by(Uuid::new_v4());
        let err = ensure_owner(&post, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn non_owner_gets_forbidden_even_with_invalid_fields() {
        // Mirrors the mutation handlers: the owner guard runs before field
        // validation, so a bad payload from a stranger is still 403.
        let post = post_owned_by(Uuid::new_v4());
        let stranger = Uuid::new_v4();
        let mut form = base_form();
        form.price = None;

        let err = ensure_owner(&post, stranger)
            .and_then(|_| required_fields(&form).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn discard_image_deletes_the_stored_object() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let mut state = AppState::fake();
        state.storage = Arc::new(RecordingStorage(deleted.clone()));

        // fake config: endpoint https://fake.local, bucket "fake"
        discard_image(&state, "https://fake.local/fake/posts/u1/img.jpg").await;
        assert_eq!(
            deleted.lock().unwrap().as_slice(),
            ["posts/u1/img.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn discard_image_ignores_foreign_urls() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let mut state = AppState::fake();
        state.storage = Arc::new(RecordingStorage(deleted.clone()));

        discard_image(&state, "https://elsewhere.example/img.jpg").await;
        assert!(deleted.lock().unwrap().is_empty());
    }

    fn base_form() -> PostForm {
        PostForm {
            price: Some(1200.0),
            post_type: Some(PostType::Rent),
            latitude: Some(45.4),
            longitude: Some(-75.6),
            ..Default::default()
        }
    }

    #[test]
    fn required_fields_pass_through() {
        let (price, post_type, lat, lon) = required_fields(&base_form()).unwrap();
        assert_eq!(price, 1200.0);
        assert_eq!(post_type, PostType::Rent);
        assert_eq!(lat, 45.4);
        assert_eq!(lon, -75.6);
    }

    #[test]
    fn missing_mandatory_field_is_rejected() {
        for strip in 0..4 {
            let mut form = base_form();
            match strip {
                0 => form.price = None,
                1 => form.post_type = None,
                2 => form.latitude = None,
                _ => form.longitude = None,
            }
            assert!(required_fields(&form).is_err());
        }
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let mut form = base_form();
        form.price = Some(0.0);
        assert!(required_fields(&form).is_err());
        form.price = Some(-10.0);
        assert!(required_fields(&form).is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut form = base_form();
        form.latitude = Some(91.0);
        assert!(required_fields(&form).is_err());

        let mut form = base_form();
        form.longitude = Some(-181.0);
        assert!(required_fields(&form).is_err());
    }
}
