// In-memory CatalogStore backend. Backs the test suite and STORE=memory
// development runs; mirrors every Postgres semantic (ownership scoping,
// ordering, cascade-detach, reference validation) so the two are
// interchangeable behind the trait.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::filter::RecipeFilter;

use super::{
    Attribute, AttributeKind, CatalogStore, NewRecipe, Recipe, RecipeDetail, RecipePatch,
    StoreError, StoreResult, User,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    tags: HashMap<i64, Attribute>,
    ingredients: HashMap<i64, Attribute>,
    recipes: HashMap<i64, Recipe>,
    next_tag_id: i64,
    next_ingredient_id: i64,
    next_recipe_id: i64,
}

impl State {
    fn attributes(&self, kind: AttributeKind) -> &HashMap<i64, Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut HashMap<i64, Attribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn next_attribute_id(&mut self, kind: AttributeKind) -> i64 {
        let counter = match kind {
            AttributeKind::Tag => &mut self.next_tag_id,
            AttributeKind::Ingredient => &mut self.next_ingredient_id,
        };
        *counter += 1;
        *counter
    }

    /// Every referenced id must exist in the owner's collection.
    fn check_references(&self, kind: AttributeKind, owner: Uuid, ids: &[i64]) -> StoreResult<()> {
        for id in ids {
            match self.attributes(kind).get(id) {
                Some(attr) if attr.user_id == owner => {}
                _ => return Err(StoreError::missing_reference(kind, *id)),
            }
        }
        Ok(())
    }

    fn owned_recipe_mut(&mut self, owner: Uuid, id: i64) -> StoreResult<&mut Recipe> {
        match self.recipes.get_mut(&id) {
            Some(recipe) if recipe.user_id == owner => Ok(recipe),
            _ => Err(StoreError::recipe_not_found()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalized(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
    ) -> StoreResult<Vec<Attribute>> {
        let state = self.state.lock().await;
        let mut attributes: Vec<Attribute> = state
            .attributes(kind)
            .values()
            .filter(|a| a.user_id == owner)
            .cloned()
            .collect();
        attributes.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));
        Ok(attributes)
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute> {
        let mut state = self.state.lock().await;
        let id = state.next_attribute_id(kind);
        let attribute = Attribute {
            id,
            name: name.to_string(),
            user_id: owner,
        };
        state.attributes_mut(kind).insert(id, attribute.clone());
        Ok(attribute)
    }

    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> StoreResult<Attribute> {
        let state = self.state.lock().await;
        match state.attributes(kind).get(&id) {
            Some(attr) if attr.user_id == owner => Ok(attr.clone()),
            _ => Err(StoreError::not_found(kind)),
        }
    }

    async fn delete_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.attributes(kind).get(&id) {
            Some(attr) if attr.user_id == owner => {}
            _ => return Err(StoreError::not_found(kind)),
        }
        state.attributes_mut(kind).remove(&id);

        // Cascade-detach from any recipe referencing it.
        for recipe in state.recipes.values_mut() {
            let refs = match kind {
                AttributeKind::Tag => &mut recipe.tag_ids,
                AttributeKind::Ingredient => &mut recipe.ingredient_ids,
            };
            refs.retain(|r| *r != id);
        }
        Ok(())
    }

    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>> {
        let state = self.state.lock().await;
        let mut recipes: Vec<Recipe> = state
            .recipes
            .values()
            .filter(|r| r.user_id == owner)
            .filter(|r| {
                filter.tags.is_empty() || r.tag_ids.iter().any(|id| filter.tags.contains(id))
            })
            .filter(|r| {
                filter.ingredients.is_empty()
                    || r.ingredient_ids
                        .iter()
                        .any(|id| filter.ingredients.contains(id))
            })
            .cloned()
            .collect();
        recipes.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(recipes)
    }

    async fn create_recipe(&self, owner: Uuid, input: NewRecipe) -> StoreResult<Recipe> {
        let mut state = self.state.lock().await;
        let tag_ids = normalized(input.tag_ids);
        let ingredient_ids = normalized(input.ingredient_ids);
        state.check_references(AttributeKind::Tag, owner, &tag_ids)?;
        state.check_references(AttributeKind::Ingredient, owner, &ingredient_ids)?;

        state.next_recipe_id += 1;
        let recipe = Recipe {
            id: state.next_recipe_id,
            user_id: owner,
            title: input.title,
            time_minutes: input.time_minutes,
            price: input.price,
            link: input.link,
            tag_ids,
            ingredient_ids,
            image: None,
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn get_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe> {
        let state = self.state.lock().await;
        match state.recipes.get(&id) {
            Some(recipe) if recipe.user_id == owner => Ok(recipe.clone()),
            _ => Err(StoreError::recipe_not_found()),
        }
    }

    async fn get_recipe_detail(&self, owner: Uuid, id: i64) -> StoreResult<RecipeDetail> {
        let state = self.state.lock().await;
        let recipe = match state.recipes.get(&id) {
            Some(recipe) if recipe.user_id == owner => recipe.clone(),
            _ => return Err(StoreError::recipe_not_found()),
        };
        let tags = recipe
            .tag_ids
            .iter()
            .filter_map(|id| state.tags.get(id).cloned())
            .collect();
        let ingredients = recipe
            .ingredient_ids
            .iter()
            .filter_map(|id| state.ingredients.get(id).cloned())
            .collect();
        Ok(RecipeDetail {
            recipe,
            tags,
            ingredients,
        })
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        patch: RecipePatch,
    ) -> StoreResult<Recipe> {
        let mut state = self.state.lock().await;
        state.owned_recipe_mut(owner, id)?;

        let tag_ids = patch.tag_ids.map(normalized);
        let ingredient_ids = patch.ingredient_ids.map(normalized);
        if let Some(ids) = &tag_ids {
            state.check_references(AttributeKind::Tag, owner, ids)?;
        }
        if let Some(ids) = &ingredient_ids {
            state.check_references(AttributeKind::Ingredient, owner, ids)?;
        }

        let recipe = state.owned_recipe_mut(owner, id)?;
        if let Some(title) = patch.title {
            recipe.title = title;
        }
        if let Some(time_minutes) = patch.time_minutes {
            recipe.time_minutes = time_minutes;
        }
        if let Some(price) = patch.price {
            recipe.price = price;
        }
        if let Some(link) = patch.link {
            recipe.link = link;
        }
        if let Some(ids) = tag_ids {
            recipe.tag_ids = ids;
        }
        if let Some(ids) = ingredient_ids {
            recipe.ingredient_ids = ids;
        }
        Ok(recipe.clone())
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.recipes.get(&id) {
            Some(recipe) if recipe.user_id == owner => {
                state.recipes.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::recipe_not_found()),
        }
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<String>,
    ) -> StoreResult<Recipe> {
        let mut state = self.state.lock().await;
        let recipe = state.owned_recipe_mut(owner, id)?;
        recipe.image = image;
        Ok(recipe.clone())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
