//! Coffee catalogue HTTP handlers.
//!
//! - GET /api/coffees - List coffees (public, optional API key)
//! - GET /api/coffees/categories - Distinct categories (public)
//! - GET /api/coffees/{id} - Coffee details (public, optional API key)
//! - POST /api/coffees - Create coffee (admin)
//! - PUT /api/coffees/{id} - Update coffee (admin)
//! - DELETE /api/coffees/{id} - Delete coffee (admin)

use axum::extract::State;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    extract::{Json, Path, Query},
    models::coffee::{Coffee, CoffeeQuery, CreateCoffeeRequest, UpdateCoffeeRequest},
    response::ApiResponse,
};

/// List coffees, newest first.
///
/// # Query Parameters
///
/// - `category` - exact category match
/// - `search` - case-insensitive substring of the name
pub async fn list_coffees(
    State(pool): State<DbPool>,
    Query(query): Query<CoffeeQuery>,
) -> Result<ApiResponse<Vec<Coffee>>, AppError> {
    let search = query
        .search
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("%{}%", escape_like(s.trim())));

    let coffees = sqlx::query_as::<_, Coffee>(
        r#"
        SELECT * FROM coffees
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR name ILIKE $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.category.filter(|c| !c.is_empty()))
    .bind(search)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::list(coffees))
}

/// Escape LIKE metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Distinct, non-null categories in alphabetical order.
pub async fn list_categories(
    State(pool): State<DbPool>,
) -> Result<ApiResponse<Vec<String>>, AppError> {
    let categories: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT category FROM coffees WHERE category IS NOT NULL ORDER BY category",
    )
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::ok(categories))
}

pub async fn get_coffee(
    State(pool): State<DbPool>,
    Path(coffee_id): Path<Uuid>,
) -> Result<ApiResponse<Coffee>, AppError> {
    let coffee = sqlx::query_as::<_, Coffee>("SELECT * FROM coffees WHERE id = $1")
        .bind(coffee_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::not_found("Coffee not found"))?;

    Ok(ApiResponse::ok(coffee))
}

/// Create a coffee.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Americano",
///   "price": 18000,
///   "stock": 40,
///   "category": "espresso"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the stored coffee
/// - **400**: name or price missing, non-positive price, negative stock,
///   or an image URL that is not http(s)
pub async fn create_coffee(
    State(pool): State<DbPool>,
    Json(request): Json<CreateCoffeeRequest>,
) -> Result<ApiResponse<Coffee>, AppError> {
    let new = request.validate()?;

    let coffee = sqlx::query_as::<_, Coffee>(
        r#"
        INSERT INTO coffees (name, description, price, stock, category, image_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(new.name)
    .bind(new.description)
    .bind(new.price)
    .bind(new.stock)
    .bind(new.category)
    .bind(new.image_url)
    .fetch_one(&pool)
    .await?;

    tracing::info!(coffee_id = %coffee.id, "coffee created");

    Ok(ApiResponse::created("Coffee created successfully", coffee))
}

/// Update a coffee. Fields missing from the body keep their value.
pub async fn update_coffee(
    State(pool): State<DbPool>,
    Path(coffee_id): Path<Uuid>,
    Json(request): Json<UpdateCoffeeRequest>,
) -> Result<ApiResponse<Coffee>, AppError> {
    request.validate()?;

    let coffee = sqlx::query_as::<_, Coffee>(
        r#"
        UPDATE coffees
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            price = COALESCE($3, price),
            stock = COALESCE($4, stock),
            category = COALESCE($5, category),
            image_url = COALESCE($6, image_url),
            updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(request.name.map(|n| n.trim().to_string()))
    .bind(request.description)
    .bind(request.price)
    .bind(request.stock)
    .bind(request.category)
    .bind(request.image_url)
    .bind(coffee_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::not_found("Coffee not found"))?;

    Ok(ApiResponse::ok(coffee).with_message("Coffee updated successfully"))
}

/// Delete a coffee.
///
/// # Response
///
/// - **200 OK**: deleted
/// - **404**: no such coffee
/// - **409**: orders still reference this coffee
pub async fn delete_coffee(
    State(pool): State<DbPool>,
    Path(coffee_id): Path<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    let result = sqlx::query("DELETE FROM coffees WHERE id = $1")
        .bind(coffee_id)
        .execute(&pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::conflict("Coffee has existing orders and cannot be deleted")
            }
            other => AppError::Database(other),
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Coffee not found"));
    }

    Ok(ApiResponse::message("Coffee deleted successfully"))
}
