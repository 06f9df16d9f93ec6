//! Order HTTP handlers.
//!
//! - GET /api/orders - List visible orders (token or API key)
//! - GET /api/orders/stats - Order statistics (admin)
//! - GET /api/orders/{id} - Order details (token or API key)
//! - POST /api/orders - Place an order (token or API key)
//! - PUT /api/orders/{id} - Change order status (admin)

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    extract::{Json, Path, Query},
    middleware::auth::Caller,
    models::order::{
        CreateOrderRequest, Order, OrderDetail, OrderQuery, OrderStats, UpdateOrderStatusRequest,
    },
    response::ApiResponse,
    services::order_service,
};

/// List orders.
///
/// Admins (by token) see every order; other token holders see their own;
/// API key callers see the orders of the key's owner.
///
/// # Query Parameters
///
/// - `status` - one of pending, processing, completed, cancelled
pub async fn list_orders(
    State(pool): State<DbPool>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<OrderQuery>,
) -> Result<ApiResponse<Vec<OrderDetail>>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(order_service::parse_status)
        .transpose()?;

    let orders = order_service::list_orders(&pool, caller.order_scope(), status).await?;

    Ok(ApiResponse::list(orders))
}

/// Get one order. Orders outside the caller's scope are reported as 404.
pub async fn get_order(
    State(pool): State<DbPool>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<Uuid>,
) -> Result<ApiResponse<OrderDetail>, AppError> {
    let order = order_service::get_order(&pool, caller.order_scope(), order_id).await?;

    Ok(ApiResponse::ok(order))
}

/// Place an order on behalf of the caller.
///
/// # Request Body
///
/// ```json
/// {
///   "coffee_id": "550e8400-e29b-41d4-a716-446655440000",
///   "quantity": 2,
///   "size": "large"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the order, status `pending`
/// - **400**: missing fields, quantity below 1, or insufficient stock
/// - **404**: coffee not found
pub async fn create_order(
    State(pool): State<DbPool>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<ApiResponse<Order>, AppError> {
    let order = order_service::create_order(&pool, caller.user_id(), request).await?;

    Ok(ApiResponse::created("Order created successfully", order))
}

/// Change an order's status (admin only).
pub async fn update_order_status(
    State(pool): State<DbPool>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<ApiResponse<Order>, AppError> {
    let status = order_service::parse_status(request.status.as_deref().unwrap_or_default())?;

    let order = order_service::update_status(&pool, order_id, status).await?;

    Ok(ApiResponse::ok(order).with_message("Order status updated successfully"))
}

/// Dashboard statistics (admin only).
pub async fn order_stats(State(pool): State<DbPool>) -> Result<ApiResponse<OrderStats>, AppError> {
    let stats = order_service::stats(&pool).await?;

    Ok(ApiResponse::ok(stats))
}
