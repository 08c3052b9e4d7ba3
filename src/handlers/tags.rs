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
        .route("/tags", get(list).post(create))
        .route("/tags/:id", get(retrieve).delete(delete))
}

/// GET /tags - List the caller's tags, name descending
async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<AttributeOut>> {
    attributes::list(AttributeKind::Tag, &state, &user).await
}

/// POST /tags - Create a tag owned by the caller
async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateAttributeRequest>,
) -> ApiResult<AttributeOut> {
    attributes::create(AttributeKind::Tag, &state, &user, payload).await
}

/// GET /tags/:id - Fetch one of the caller's tags
async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<AttributeOut> {
    attributes::retrieve(AttributeKind::Tag, &state, &user, id).await
}

/// DELETE /tags/:id - Delete one of the caller's tags
async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    attributes::delete(AttributeKind::Tag, &state, &user, id).await
}
