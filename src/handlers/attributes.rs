// Shared handler logic for the two owned attribute collections. The /tags
// and /ingredients route modules delegate here, passing their
// AttributeKind; this is the single implementation of the list, create,
// retrieve and delete capabilities for attributes.
use serde::Deserialize;

use crate::api::AttributeOut;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::store::AttributeKind;

#[derive(Debug, Deserialize)]
pub struct CreateAttributeRequest {
    pub name: String,
}

pub async fn list(
    kind: AttributeKind,
    state: &AppState,
    user: &AuthUser,
) -> ApiResult<Vec<AttributeOut>> {
    let attributes = state.store.list_attributes(kind, user.user_id).await?;
    Ok(ApiResponse::success(
        attributes.into_iter().map(AttributeOut::from).collect(),
    ))
}

pub async fn create(
    kind: AttributeKind,
    state: &AppState,
    user: &AuthUser,
    payload: CreateAttributeRequest,
) -> ApiResult<AttributeOut> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::field_error("name", "This field may not be blank."));
    }

    let attribute = state
        .store
        .create_attribute(kind, user.user_id, name)
        .await?;
    tracing::debug!(kind = kind.label(), id = attribute.id, "attribute created");
    Ok(ApiResponse::created(attribute.into()))
}

pub async fn retrieve(
    kind: AttributeKind,
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> ApiResult<AttributeOut> {
    let attribute = state.store.get_attribute(kind, user.user_id, id).await?;
    Ok(ApiResponse::success(attribute.into()))
}

pub async fn delete(
    kind: AttributeKind,
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> ApiResult<()> {
    state.store.delete_attribute(kind, user.user_id, id).await?;
    tracing::debug!(kind = kind.label(), id, "attribute deleted");
    Ok(ApiResponse::<()>::no_content())
}
