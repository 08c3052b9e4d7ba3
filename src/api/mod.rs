// Public wire shapes. Store records never serialize directly; every
// response body goes through one of these types.
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::store::{Attribute, Recipe, RecipeDetail, User};

/// Registered account, without credential material.
#[derive(Debug, Clone, Serialize)]
pub struct UserOut {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// Token issuance response
#[derive(Debug, Serialize)]
pub struct TokenOut {
    pub token: String,
    pub user: UserOut,
}

/// Tag and ingredient wire shape
#[derive(Debug, Clone, Serialize)]
pub struct AttributeOut {
    pub id: i64,
    pub name: String,
}

impl From<Attribute> for AttributeOut {
    fn from(attribute: Attribute) -> Self {
        Self {
            id: attribute.id,
            name: attribute.name,
        }
    }
}

/// Recipe wire representation. Fixed per operation: list and create answer
/// `Summary`, retrieve and update answer `Detail`, upload-image answers
/// `Image`. Handlers pick the variant once; nothing else dispatches on it.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RecipeOut {
    Summary(RecipeSummary),
    Detail(RecipeDetailOut),
    Image(RecipeImage),
}

impl RecipeOut {
    pub fn summary(recipe: &Recipe) -> Self {
        RecipeOut::Summary(RecipeSummary {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.clone(),
            tags: recipe.tag_ids.clone(),
            ingredients: recipe.ingredient_ids.clone(),
            image: image_url(recipe.image.as_deref()),
        })
    }

    pub fn detail(detail: &RecipeDetail) -> Self {
        RecipeOut::Detail(RecipeDetailOut {
            id: detail.recipe.id,
            title: detail.recipe.title.clone(),
            time_minutes: detail.recipe.time_minutes,
            price: detail.recipe.price,
            link: detail.recipe.link.clone(),
            tags: detail.tags.iter().cloned().map(AttributeOut::from).collect(),
            ingredients: detail
                .ingredients
                .iter()
                .cloned()
                .map(AttributeOut::from)
                .collect(),
            image: image_url(detail.recipe.image.as_deref()),
        })
    }

    pub fn image(recipe: &Recipe) -> Self {
        RecipeOut::Image(RecipeImage {
            id: recipe.id,
            image: image_url(recipe.image.as_deref()),
        })
    }
}

/// Related entities as bare ids
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
    pub image: Option<String>,
}

/// Related entities expanded to full objects
#[derive(Debug, Serialize)]
pub struct RecipeDetailOut {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<AttributeOut>,
    pub ingredients: Vec<AttributeOut>,
    pub image: Option<String>,
}

/// Upload-image response
#[derive(Debug, Serialize)]
pub struct RecipeImage {
    pub id: i64,
    pub image: Option<String>,
}

/// Public URL for a stored media path
fn image_url(path: Option<&str>) -> Option<String> {
    path.map(|p| format!("/media/{}", p))
}
