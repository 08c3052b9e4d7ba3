// Postgres CatalogStore backend.
//
// Uses the runtime sqlx API throughout (no compile-time checked macros), so
// the crate builds without a reachable database. Table names interpolated
// into SQL come only from AttributeKind's static strings.
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::config::config;
use crate::filter::RecipeFilter;

use super::{
    Attribute, AttributeKind, CatalogStore, NewRecipe, Recipe, RecipeDetail, RecipePatch,
    StoreError, StoreResult, User,
};

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

const RECIPE_SELECT: &str = r#"
SELECT r.id, r.user_id, r.title, r.time_minutes, r.price, r.link, r.image,
       COALESCE(t.ids, ARRAY[]::bigint[]) AS tag_ids,
       COALESCE(i.ids, ARRAY[]::bigint[]) AS ingredient_ids
  FROM recipes r
  LEFT JOIN (SELECT recipe_id, array_agg(tag_id ORDER BY tag_id) AS ids
               FROM recipe_tags GROUP BY recipe_id) t ON t.recipe_id = r.id
  LEFT JOIN (SELECT recipe_id, array_agg(ingredient_id ORDER BY ingredient_id) AS ids
               FROM recipe_ingredients GROUP BY recipe_id) i ON i.recipe_id = r.id
"#;

#[derive(FromRow)]
struct RecipeRow {
    id: i64,
    user_id: Uuid,
    title: String,
    time_minutes: i32,
    price: Decimal,
    link: Option<String>,
    image: Option<String>,
    tag_ids: Vec<i64>,
    ingredient_ids: Vec<i64>,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link,
            tag_ids: row.tag_ids,
            ingredient_ids: row.ingredient_ids,
            image: row.image,
        }
    }
}

// Core columns only, used where the join aggregates would get in the way
// (row locking during updates).
#[derive(FromRow)]
struct RecipeCoreRow {
    id: i64,
    user_id: Uuid,
    title: String,
    time_minutes: i32,
    price: Decimal,
    link: Option<String>,
    image: Option<String>,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects using `DATABASE_URL`; pool sizing comes from config.
    pub async fn connect_from_env() -> StoreResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Connection("DATABASE_URL is not set".to_string()))?;
        Self::connect(&url).await
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let db_config = &config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db_config.max_connections)
            .acquire_timeout(Duration::from_secs(db_config.connection_timeout))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        tracing::info!(
            max_connections = db_config.max_connections,
            "connected to database"
        );
        Ok(Self { pool })
    }

    /// Applies the embedded schema DDL. Idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("schema migration applied");
        Ok(())
    }
}

/// Every referenced id must exist in the owner's collection.
async fn check_references(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: Uuid,
    ids: &[i64],
) -> StoreResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
        kind.table()
    );
    let found: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    for id in ids {
        if !found.contains(id) {
            return Err(StoreError::missing_reference(kind, *id));
        }
    }
    Ok(())
}

async fn replace_references(
    conn: &mut PgConnection,
    kind: AttributeKind,
    recipe_id: i64,
    ids: &[i64],
) -> StoreResult<()> {
    let delete_sql = format!("DELETE FROM {} WHERE recipe_id = $1", kind.join_table());
    sqlx::query(&delete_sql)
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if !ids.is_empty() {
        let insert_sql = format!(
            "INSERT INTO {} (recipe_id, {}) SELECT $1, x FROM unnest($2::bigint[]) AS x",
            kind.join_table(),
            kind.join_column()
        );
        sqlx::query(&insert_sql)
            .bind(recipe_id)
            .bind(ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn normalized(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let result = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, password_hash, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                StoreError::Conflict("A user with this email already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
    ) -> StoreResult<Vec<Attribute>> {
        let sql = format!(
            "SELECT id, name, user_id FROM {} WHERE user_id = $1 ORDER BY name DESC, id DESC",
            kind.table()
        );
        let attributes = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(attributes)
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute> {
        let sql = format!(
            "INSERT INTO {} (name, user_id) VALUES ($1, $2) RETURNING id, name, user_id",
            kind.table()
        );
        let attribute = sqlx::query_as::<_, Attribute>(&sql)
            .bind(name)
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(attribute)
    }

    async fn get_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> StoreResult<Attribute> {
        let sql = format!(
            "SELECT id, name, user_id FROM {} WHERE id = $1 AND user_id = $2",
            kind.table()
        );
        sqlx::query_as::<_, Attribute>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(kind))
    }

    async fn delete_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        id: i64,
    ) -> StoreResult<()> {
        // Join rows go with it via ON DELETE CASCADE.
        let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", kind.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(kind));
        }
        Ok(())
    }

    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>> {
        let sql = format!(
            "{RECIPE_SELECT} \
             WHERE r.user_id = $1 \
               AND ($2::bigint[] IS NULL OR EXISTS ( \
                    SELECT 1 FROM recipe_tags rt \
                     WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2))) \
               AND ($3::bigint[] IS NULL OR EXISTS ( \
                    SELECT 1 FROM recipe_ingredients ri \
                     WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3))) \
             ORDER BY r.id DESC"
        );
        let tags: Option<&[i64]> = if filter.tags.is_empty() {
            None
        } else {
            Some(&filter.tags)
        };
        let ingredients: Option<&[i64]> = if filter.ingredients.is_empty() {
            None
        } else {
            Some(&filter.ingredients)
        };

        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(owner)
            .bind(tags)
            .bind(ingredients)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn create_recipe(&self, owner: Uuid, input: NewRecipe) -> StoreResult<Recipe> {
        let tag_ids = normalized(input.tag_ids);
        let ingredient_ids = normalized(input.ingredient_ids);

        let mut tx = self.pool.begin().await?;
        check_references(&mut tx, AttributeKind::Tag, owner, &tag_ids).await?;
        check_references(&mut tx, AttributeKind::Ingredient, owner, &ingredient_ids).await?;

        let row = sqlx::query_as::<_, RecipeCoreRow>(
            "INSERT INTO recipes (user_id, title, time_minutes, price, link) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, title, time_minutes, price, link, image",
        )
        .bind(owner)
        .bind(&input.title)
        .bind(input.time_minutes)
        .bind(input.price)
        .bind(&input.link)
        .fetch_one(&mut *tx)
        .await?;

        replace_references(&mut tx, AttributeKind::Tag, row.id, &tag_ids).await?;
        replace_references(&mut tx, AttributeKind::Ingredient, row.id, &ingredient_ids).await?;
        tx.commit().await?;

        Ok(Recipe {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link,
            tag_ids,
            ingredient_ids,
            image: row.image,
        })
    }

    async fn get_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe> {
        let sql = format!("{RECIPE_SELECT} WHERE r.id = $1 AND r.user_id = $2");
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(StoreError::recipe_not_found)?;
        Ok(row.into())
    }

    async fn get_recipe_detail(&self, owner: Uuid, id: i64) -> StoreResult<RecipeDetail> {
        let recipe = self.get_recipe(owner, id).await?;
        let tags = sqlx::query_as::<_, Attribute>(
            "SELECT id, name, user_id FROM tags WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&recipe.tag_ids)
        .fetch_all(&self.pool)
        .await?;
        let ingredients = sqlx::query_as::<_, Attribute>(
            "SELECT id, name, user_id FROM ingredients WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&recipe.ingredient_ids)
        .fetch_all(&self.pool)
        .await?;
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
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RecipeCoreRow>(
            "SELECT id, user_id, title, time_minutes, price, link, image \
               FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(StoreError::recipe_not_found)?;

        let title = patch.title.unwrap_or(current.title);
        let time_minutes = patch.time_minutes.unwrap_or(current.time_minutes);
        let price = patch.price.unwrap_or(current.price);
        let link = patch.link.unwrap_or(current.link);

        let tag_ids = patch.tag_ids.map(normalized);
        let ingredient_ids = patch.ingredient_ids.map(normalized);
        if let Some(ids) = &tag_ids {
            check_references(&mut tx, AttributeKind::Tag, owner, ids).await?;
        }
        if let Some(ids) = &ingredient_ids {
            check_references(&mut tx, AttributeKind::Ingredient, owner, ids).await?;
        }

        sqlx::query(
            "UPDATE recipes SET title = $2, time_minutes = $3, price = $4, link = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&title)
        .bind(time_minutes)
        .bind(price)
        .bind(&link)
        .execute(&mut *tx)
        .await?;

        if let Some(ids) = &tag_ids {
            replace_references(&mut tx, AttributeKind::Tag, id, ids).await?;
        }
        if let Some(ids) = &ingredient_ids {
            replace_references(&mut tx, AttributeKind::Ingredient, id, ids).await?;
        }

        let final_tags = match tag_ids {
            Some(ids) => ids,
            None => {
                sqlx::query_scalar(
                    "SELECT tag_id FROM recipe_tags WHERE recipe_id = $1 ORDER BY tag_id",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
            }
        };
        let final_ingredients = match ingredient_ids {
            Some(ids) => ids,
            None => {
                sqlx::query_scalar(
                    "SELECT ingredient_id FROM recipe_ingredients \
                      WHERE recipe_id = $1 ORDER BY ingredient_id",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(Recipe {
            id,
            user_id: owner,
            title,
            time_minutes,
            price,
            link,
            tag_ids: final_tags,
            ingredient_ids: final_ingredients,
            image: current.image,
        })
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::recipe_not_found());
        }
        Ok(())
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<String>,
    ) -> StoreResult<Recipe> {
        let result = sqlx::query("UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .bind(&image)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::recipe_not_found());
        }
        self.get_recipe(owner, id).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
