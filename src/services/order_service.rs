//! Order service - stock reservation, pricing and status changes.
//!
//! # Atomicity Guarantees
//!
//! Creating an order (stock check, insert, stock decrement) and cancelling
//! one (status change, stock restore) each run inside a single PostgreSQL
//! transaction that locks the affected coffee/order row with `FOR UPDATE`.
//! Two concurrent orders for the last cup therefore cannot both succeed.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::order::{
        CreateOrderRequest, Order, OrderDetail, OrderStats, OrderStatus, order_total,
    },
};

/// Which orders a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Admins see everything
    All,
    /// Everyone else sees the orders of a single user
    User(Uuid),
}

impl OrderScope {
    fn user_filter(&self) -> Option<Uuid> {
        match self {
            OrderScope::All => None,
            OrderScope::User(id) => Some(*id),
        }
    }
}

const ORDER_DETAIL_SELECT: &str = r#"
    SELECT o.id, o.user_id, o.coffee_id, o.quantity, o.size, o.total_price, o.status,
           o.order_date, u.name AS user_name, u.email AS user_email,
           c.name AS coffee_name, c.image_url AS coffee_image
    FROM orders o
    JOIN users u ON u.id = o.user_id
    JOIN coffees c ON c.id = o.coffee_id
"#;

/// Parse a status coming from a request.
pub fn parse_status(value: &str) -> Result<OrderStatus, AppError> {
    OrderStatus::parse(value).ok_or_else(|| {
        AppError::validation(format!(
            "Invalid status. Valid values: {}",
            OrderStatus::ALL.map(|s| s.as_str()).join(", ")
        ))
    })
}

/// Place an order for `user_id`.
///
/// # Process
///
/// 1. Validate coffee id and quantity
/// 2. Start database transaction
/// 3. Lock the coffee row and check stock
/// 4. Compute the total and insert the order as `pending`
/// 5. Decrement stock
/// 6. Commit (or rollback on error)
///
/// # Errors
///
/// - `Validation`: missing fields, quantity below 1, or not enough stock
/// - `NotFound`: coffee doesn't exist
/// - `Database`: database error occurred
pub async fn create_order(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateOrderRequest,
) -> Result<Order, AppError> {
    let (Some(coffee_id), Some(quantity)) = (request.coffee_id, request.quantity) else {
        return Err(AppError::validation("Coffee ID and quantity are required"));
    };

    if quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }

    let mut tx = pool.begin().await?;

    let (price, stock): (i64, i32) =
        sqlx::query_as("SELECT price, stock FROM coffees WHERE id = $1 FOR UPDATE")
            .bind(coffee_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Coffee not found"))?;

    if stock < quantity {
        tx.rollback().await?;
        return Err(AppError::validation(format!(
            "Insufficient stock. Available: {stock}"
        )));
    }

    let total_price = order_total(price, quantity, request.size)
        .ok_or_else(|| AppError::validation("Order total is too large"))?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (user_id, coffee_id, quantity, size, total_price, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(coffee_id)
    .bind(quantity)
    .bind(request.size)
    .bind(total_price)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        // The coffee row is locked, so only the user can have gone away
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            AppError::unauthorized("User account no longer exists")
        }
        other => AppError::Database(other),
    })?;

    sqlx::query("UPDATE coffees SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
        .bind(quantity)
        .bind(coffee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        %user_id,
        %coffee_id,
        quantity,
        total_price,
        "order created"
    );

    Ok(order)
}

/// Move an order to `status`.
///
/// Entering `cancelled` from any other status gives the order's quantity
/// back to the coffee's stock. No other transition has side effects.
pub async fn update_status(
    pool: &DbPool,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if current.status.restores_stock(status) {
        sqlx::query("UPDATE coffees SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
            .bind(current.quantity)
            .bind(current.coffee_id)
            .execute(&mut *tx)
            .await?;
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%order_id, from = %current.status, to = %status, "order status updated");

    Ok(order)
}

/// Orders visible in `scope`, newest first, optionally filtered by status.
pub async fn list_orders(
    pool: &DbPool,
    scope: OrderScope,
    status: Option<OrderStatus>,
) -> Result<Vec<OrderDetail>, AppError> {
    let query = format!(
        "{ORDER_DETAIL_SELECT}
         WHERE ($1::uuid IS NULL OR o.user_id = $1)
           AND ($2::order_status IS NULL OR o.status = $2)
         ORDER BY o.order_date DESC"
    );

    let orders = sqlx::query_as::<_, OrderDetail>(&query)
        .bind(scope.user_filter())
        .bind(status)
        .fetch_all(pool)
        .await?;

    Ok(orders)
}

/// A single order, if visible in `scope`.
pub async fn get_order(
    pool: &DbPool,
    scope: OrderScope,
    order_id: Uuid,
) -> Result<OrderDetail, AppError> {
    let query = format!(
        "{ORDER_DETAIL_SELECT}
         WHERE o.id = $1 AND ($2::uuid IS NULL OR o.user_id = $2)"
    );

    sqlx::query_as::<_, OrderDetail>(&query)
        .bind(order_id)
        .bind(scope.user_filter())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))
}

/// Counts per status and total revenue over all orders.
pub async fn stats(pool: &DbPool) -> Result<OrderStats, AppError> {
    let stats = sqlx::query_as::<_, OrderStats>(
        r#"
        SELECT
            COUNT(*) AS total_orders,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'processing') AS processing,
            COUNT(*) FILTER (WHERE status = 'completed') AS completed,
            COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
            COALESCE(SUM(total_price), 0)::BIGINT AS total_revenue
        FROM orders
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
