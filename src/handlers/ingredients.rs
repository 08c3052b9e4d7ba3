use axum::extract::{Extension, Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::AttributeOut;
use crate::app::AppState;
use crate::middleware::{ApiResult, AuthUser};
use crate::store::AttributeKind;

use super::attributes::{self, CreateAttributeRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list).post(create))
        .route("/ingredients/:id", get(retrieve).delete(delete))
}

/// GET /ingredients - List the caller's ingredients, name descending
async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<AttributeOut>> {
    attributes::list(AttributeKind::Ingredient, &state, &user).await
}

/// POST /ingredients - Create an ingredient owned by the caller
async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateAttributeRequest>,
) -> ApiResult<AttributeOut> {
    attributes::create(AttributeKind::Ingredient, &state, &user, payload).await
}

/// GET /ingredients/:id - Fetch one of the caller's ingredients
async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<AttributeOut> {
    attributes::retrieve(AttributeKind::Ingredient, &state, &user, id).await
}

/// DELETE /ingredients/:id - Delete one of the caller's ingredients
async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    attributes::delete(AttributeKind::Ingredient, &state, &user, id).await
}
