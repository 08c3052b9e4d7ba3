use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::RecipeOut;
use crate::app::AppState;
use crate::error::ApiError;
use crate::filter::RecipeFilter;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::store::{NewRecipe, RecipePatch};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list).post(create))
        .route(
            "/recipes/:id",
            get(retrieve)
                .put(update_full)
                .patch(update_partial)
                .delete(delete),
        )
        .route("/recipes/:id/upload-image", post(upload_image))
}

#[derive(Debug, Deserialize)]
pub struct RecipeListQuery {
    /// Comma-separated tag ids
    pub tags: Option<String>,
    /// Comma-separated ingredient ids
    pub ingredients: Option<String>,
}

/// Full payload, used by create and PUT. Reference ids must belong to the
/// caller; the owner itself is never part of any payload.
#[derive(Debug, Deserialize)]
pub struct RecipePayload {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub ingredients: Vec<i64>,
}

/// PATCH payload; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePatchPayload {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

fn validate_fields(
    title: Option<&str>,
    time_minutes: Option<i32>,
    price: Option<Decimal>,
) -> Result<(), ApiError> {
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(ApiError::field_error("title", "This field may not be blank."));
        }
    }
    if let Some(minutes) = time_minutes {
        if minutes < 0 {
            return Err(ApiError::field_error(
                "time_minutes",
                "Ensure this value is greater than or equal to 0.",
            ));
        }
    }
    if let Some(price) = price {
        validate_price(price)?;
    }
    Ok(())
}

/// The schema stores price as NUMERIC(5,2); anything wider has to be caught
/// here, otherwise Postgres answers the INSERT with a numeric overflow.
fn validate_price(price: Decimal) -> Result<(), ApiError> {
    let decimals = price.scale();
    let mut mantissa_digits = 0u32;
    let mut m = price.mantissa().unsigned_abs();
    while m > 0 {
        mantissa_digits += 1;
        m /= 10;
    }
    // A bare fraction like 0.001 counts its leading zeros as digits
    let digits = mantissa_digits.max(decimals);

    if digits > 5 {
        return Err(ApiError::field_error(
            "price",
            "Ensure that there are no more than 5 digits in total.",
        ));
    }
    if decimals > 2 {
        return Err(ApiError::field_error(
            "price",
            "Ensure that there are no more than 2 decimal places.",
        ));
    }
    if digits - decimals > 3 {
        return Err(ApiError::field_error(
            "price",
            "Ensure that there are no more than 3 digits before the decimal point.",
        ));
    }
    if price < Decimal::ZERO {
        return Err(ApiError::field_error(
            "price",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

/// GET /recipes - List the caller's recipes, newest first, optionally
/// narrowed by tag/ingredient filters
async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RecipeListQuery>,
) -> ApiResult<Vec<RecipeOut>> {
    let filter = RecipeFilter::from_params(query.tags.as_deref(), query.ingredients.as_deref())?;
    let recipes = state.store.list_recipes(user.user_id, &filter).await?;
    Ok(ApiResponse::success(
        recipes.iter().map(RecipeOut::summary).collect(),
    ))
}

/// POST /recipes - Create a recipe owned by the caller
async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RecipePayload>,
) -> ApiResult<RecipeOut> {
    validate_fields(
        Some(&payload.title),
        Some(payload.time_minutes),
        Some(payload.price),
    )?;

    let recipe = state
        .store
        .create_recipe(
            user.user_id,
            NewRecipe {
                title: payload.title.trim().to_string(),
                time_minutes: payload.time_minutes,
                price: payload.price,
                link: payload.link,
                tag_ids: payload.tags,
                ingredient_ids: payload.ingredients,
            },
        )
        .await?;
    tracing::debug!(id = recipe.id, "recipe created");
    Ok(ApiResponse::created(RecipeOut::summary(&recipe)))
}

/// GET /recipes/:id - Fetch one recipe with expanded tags and ingredients
async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<RecipeOut> {
    let detail = state.store.get_recipe_detail(user.user_id, id).await?;
    Ok(ApiResponse::success(RecipeOut::detail(&detail)))
}

/// PUT /recipes/:id - Replace every mutable field (an absent link clears it)
async fn update_full(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePayload>,
) -> ApiResult<RecipeOut> {
    validate_fields(
        Some(&payload.title),
        Some(payload.time_minutes),
        Some(payload.price),
    )?;

    let patch = RecipePatch {
        title: Some(payload.title.trim().to_string()),
        time_minutes: Some(payload.time_minutes),
        price: Some(payload.price),
        link: Some(payload.link),
        tag_ids: Some(payload.tags),
        ingredient_ids: Some(payload.ingredients),
    };
    apply_update(&state, &user, id, patch).await
}

/// PATCH /recipes/:id - Update only the provided fields
async fn update_partial(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePatchPayload>,
) -> ApiResult<RecipeOut> {
    validate_fields(
        payload.title.as_deref(),
        payload.time_minutes,
        payload.price,
    )?;

    let patch = RecipePatch {
        title: payload.title.map(|t| t.trim().to_string()),
        time_minutes: payload.time_minutes,
        price: payload.price,
        link: payload.link.map(Some),
        tag_ids: payload.tags,
        ingredient_ids: payload.ingredients,
    };
    apply_update(&state, &user, id, patch).await
}

async fn apply_update(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    patch: RecipePatch,
) -> ApiResult<RecipeOut> {
    state.store.update_recipe(user.user_id, id, patch).await?;
    let detail = state.store.get_recipe_detail(user.user_id, id).await?;
    Ok(ApiResponse::success(RecipeOut::detail(&detail)))
}

/// DELETE /recipes/:id - Delete one of the caller's recipes
async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let recipe = state.store.get_recipe(user.user_id, id).await?;
    state.store.delete_recipe(user.user_id, id).await?;
    if let Some(image) = recipe.image {
        state.media.remove(&image).await;
    }
    tracing::debug!(id, "recipe deleted");
    Ok(ApiResponse::<()>::no_content())
}

/// POST /recipes/:id/upload-image - Attach an image to a recipe. Accepts a
/// multipart part named `image`; anything that does not sniff as an image
/// is rejected without touching the record.
async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<RecipeOut> {
    // Resolve the recipe first so an unknown id is a 404, not a 400.
    let recipe = state.store.get_recipe(user.user_id, id).await?;

    let bytes = read_image_field(multipart).await?;
    let stored = state.media.save_recipe_image(&bytes).await?;

    let updated = match state
        .store
        .set_recipe_image(user.user_id, id, Some(stored.clone()))
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            // Keep storage consistent with the unchanged record.
            state.media.remove(&stored).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = recipe.image {
        state.media.remove(&previous).await;
    }
    tracing::debug!(id, path = %stored, "recipe image replaced");
    Ok(ApiResponse::success(RecipeOut::image(&updated)))
}

/// Pulls the bytes of the `image` part out of a multipart body.
async fn read_image_field(mut multipart: Multipart) -> Result<axum::body::Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::field_error("image", format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("image") {
            return field.bytes().await.map_err(|e| {
                ApiError::field_error("image", format!("Failed to read upload: {}", e))
            });
        }
    }
    Err(ApiError::field_error("image", "No file was submitted."))
}
