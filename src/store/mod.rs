// Persistence layer: domain records and the CatalogStore trait.
//
// Two backends implement the trait: PgStore (Postgres via sqlx) for real
// deployments and MemoryStore for tests and local development. Every
// operation takes the owning user id explicitly; there is no ambient
// identity anywhere below the middleware.
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::filter::RecipeFilter;

/// Registered account. `password_hash` stays inside the crate; response
/// shaping lives in `crate::api`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Owned name record. Tags and ingredients share this shape.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Attribute {
    pub id: i64,
    pub name: String,
    pub user_id: Uuid,
}

/// Selects which attribute collection an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    pub fn join_table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn join_column(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Display name for error messages
    pub fn label(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "Tag",
            AttributeKind::Ingredient => "Ingredient",
        }
    }

    /// Payload and query-string field carrying references of this kind
    pub fn field(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }
}

/// Recipe record with its reference ids. Both backends keep the id vectors
/// sorted ascending so responses are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
    pub image: Option<String>,
}

/// Recipe with its referenced attributes expanded.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

/// Fields for a new recipe. The owner is never part of the input; handlers
/// pass it separately from the authenticated identity.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
}

/// Partial update. `None` keeps the stored value. The outer Option on
/// `link` distinguishes "leave alone" from "set/clear"; PUT builds a patch
/// with every field present, PATCH only the supplied ones.
#[derive(Debug, Clone, Default)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<Option<String>>,
    pub tag_ids: Option<Vec<i64>>,
    pub ingredient_ids: Option<Vec<i64>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    /// A recipe payload referenced a tag/ingredient id that does not exist
    /// for the owner. `field` names the offending payload field.
    #[error("{message}")]
    MissingReference {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(kind: AttributeKind) -> Self {
        StoreError::NotFound(format!("{} not found", kind.label()))
    }

    pub fn recipe_not_found() -> Self {
        StoreError::NotFound("Recipe not found".to_string())
    }

    pub fn missing_reference(kind: AttributeKind, id: i64) -> Self {
        StoreError::MissingReference {
            field: kind.field(),
            message: format!("Invalid pk \"{}\" - object does not exist.", id),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ownership-scoped persistence operations. Reads return only records owned
/// by `owner`; a foreign-owned id is reported NotFound, identical to a
/// missing one. Writes stamp `owner` on the stored record.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Users
    async fn create_user(&self, email: &str, name: &str, password_hash: &str)
        -> StoreResult<User>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    // Tags and ingredients, ordered name descending
    async fn list_attributes(&self, kind: AttributeKind, owner: Uuid)
        -> StoreResult<Vec<Attribute>>;
    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute>;
    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> StoreResult<Attribute>;
    /// Deletes and detaches the attribute from any recipes referencing it.
    async fn delete_attribute(&self, kind: AttributeKind, owner: Uuid, id: i64)
        -> StoreResult<()>;

    // Recipes, ordered id descending
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>>;
    async fn create_recipe(&self, owner: Uuid, input: NewRecipe) -> StoreResult<Recipe>;
    async fn get_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe>;
    async fn get_recipe_detail(&self, owner: Uuid, id: i64) -> StoreResult<RecipeDetail>;
    /// Last write wins; no version checking. The recipe row and its join
    /// rows are replaced together.
    async fn update_recipe(&self, owner: Uuid, id: i64, patch: RecipePatch)
        -> StoreResult<Recipe>;
    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<()>;
    /// Replaces the stored image path. `None` clears it.
    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<String>,
    ) -> StoreResult<Recipe>;

    async fn health_check(&self) -> StoreResult<()>;
}
