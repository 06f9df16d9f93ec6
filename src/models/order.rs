//! Order data models, pricing rule and API request/response types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surcharge added per unit when an order is placed in size large.
pub const LARGE_SIZE_SURCHARGE: i64 = 5000;

/// Cup size of an order. Maps to the `order_size` Postgres enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_size", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSize {
    #[default]
    Regular,
    Large,
}

impl OrderSize {
    /// Per-unit surcharge for this size.
    pub fn surcharge(&self) -> i64 {
        match self {
            OrderSize::Regular => 0,
            OrderSize::Large => LARGE_SIZE_SURCHARGE,
        }
    }
}

/// Lifecycle status of an order. Maps to the `order_status` Postgres enum.
///
/// Any status may follow any other; only entering `Cancelled` has a side
/// effect (the reserved stock is returned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Whether moving from `self` to `next` must give stock back.
    pub fn restores_stock(&self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelled && *self != OrderStatus::Cancelled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total price of an order: unit price times quantity, plus the size
/// surcharge for every unit.
///
/// Returns `None` on overflow.
pub fn order_total(unit_price: i64, quantity: i32, size: OrderSize) -> Option<i64> {
    unit_price
        .checked_add(size.surcharge())?
        .checked_mul(i64::from(quantity))
}

/// Represents an order record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coffee_id: Uuid,
    pub quantity: i32,
    pub size: OrderSize,
    pub total_price: i64,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

/// An order joined with its customer and coffee, as shown in listings.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coffee_id: Uuid,
    pub quantity: i32,
    pub size: OrderSize,
    pub total_price: i64,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub user_name: String,
    pub user_email: String,
    pub coffee_name: String,
    pub coffee_image: Option<String>,
}

/// Request body for `POST /api/orders`.
///
/// # JSON Example
///
/// ```json
/// {
///   "coffee_id": "550e8400-e29b-41d4-a716-446655440000",
///   "quantity": 2,
///   "size": "large"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub coffee_id: Option<Uuid>,
    pub quantity: Option<i32>,

    /// Defaults to `regular`
    #[serde(default)]
    pub size: OrderSize,
}

/// Query string accepted by `GET /api/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
}

/// Request body for `PUT /api/orders/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<String>,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total_revenue: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_regular() {
        assert_eq!(order_total(20000, 2, OrderSize::Regular), Some(40000));
        assert_eq!(order_total(18000, 1, OrderSize::Regular), Some(18000));
    }

    #[test]
    fn test_total_large_adds_surcharge_per_unit() {
        assert_eq!(order_total(20000, 2, OrderSize::Large), Some(50000));
        assert_eq!(order_total(15000, 3, OrderSize::Large), Some(60000));
    }

    #[test]
    fn test_total_overflow() {
        assert_eq!(order_total(i64::MAX, 2, OrderSize::Regular), None);
        assert_eq!(order_total(i64::MAX, 1, OrderSize::Large), None);
    }

    #[test]
    fn test_size_defaults_to_regular() {
        let request: CreateOrderRequest =
            serde_json::from_str(r#"{"coffee_id":"550e8400-e29b-41d4-a716-446655440000","quantity":1}"#)
                .unwrap();
        assert_eq!(request.size, OrderSize::Regular);

        let request: CreateOrderRequest =
            serde_json::from_str(r#"{"quantity":1,"size":"large"}"#).unwrap();
        assert_eq!(request.size, OrderSize::Large);
        assert!(request.coffee_id.is_none());
    }

    #[test]
    fn test_status_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse("Pending"), None);
    }

    #[test]
    fn test_only_entering_cancelled_restores_stock() {
        use OrderStatus::*;

        assert!(Pending.restores_stock(Cancelled));
        assert!(Processing.restores_stock(Cancelled));
        assert!(Completed.restores_stock(Cancelled));
        assert!(!Cancelled.restores_stock(Cancelled));
        assert!(!Cancelled.restores_stock(Pending));
        assert!(!Pending.restores_stock(Completed));
    }
}
