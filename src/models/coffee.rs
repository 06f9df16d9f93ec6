//! Coffee data models and API request/response types.
//!
//! Prices are whole currency units stored as `i64` (the shop sells in
//! rupiah, which has no minor unit in practice).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::check_max_chars};

pub const NAME_MAX_CHARS: usize = 100;
pub const CATEGORY_MAX_CHARS: usize = 50;

/// Represents a coffee record from the database.
///
/// # Database Table
///
/// Maps to the `coffees` table. `stock` is never negative (enforced by a
/// CHECK constraint); it is decremented by order creation and restored by
/// order cancellation.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Coffee {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query string accepted by `GET /api/coffees`.
#[derive(Debug, Default, Deserialize)]
pub struct CoffeeQuery {
    /// Exact category match
    pub category: Option<String>,

    /// Case-insensitive substring of the name
    pub search: Option<String>,
}

/// Request body for `POST /api/coffees`.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Kopi Susu Gula Aren",
///   "description": "Espresso, fresh milk and palm sugar",
///   "price": 20000,
///   "stock": 50,
///   "category": "milk-based",
///   "image_url": "https://cdn.example.com/kopi-susu.jpg"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCoffeeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Validated input for inserting a coffee.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoffee {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl CreateCoffeeRequest {
    pub fn validate(self) -> Result<NewCoffee, AppError> {
        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        let price = match self.price {
            Some(price) if !name.is_empty() => price,
            _ => return Err(AppError::validation("Coffee name and price are required")),
        };

        check_max_chars("Coffee name", &name, NAME_MAX_CHARS)?;
        validate_price(price)?;
        let stock = self.stock.unwrap_or(0);
        validate_stock(stock)?;
        if let Some(ref category) = self.category {
            check_max_chars("Category", category, CATEGORY_MAX_CHARS)?;
        }
        if let Some(ref url) = self.image_url {
            validate_image_url(url)?;
        }

        Ok(NewCoffee {
            name,
            description: self.description,
            price,
            stock,
            category: self.category,
            image_url: self.image_url,
        })
    }
}

/// Request body for `PUT /api/coffees/{id}`. Absent fields keep their
/// current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCoffeeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl UpdateCoffeeRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Coffee name cannot be empty"));
            }
            check_max_chars("Coffee name", name.trim(), NAME_MAX_CHARS)?;
        }
        if let Some(ref category) = self.category {
            check_max_chars("Category", category, CATEGORY_MAX_CHARS)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        if let Some(ref url) = self.image_url {
            validate_image_url(url)?;
        }
        Ok(())
    }
}

fn validate_price(price: i64) -> Result<(), AppError> {
    if price <= 0 {
        return Err(AppError::validation("Price must be positive"));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::validation("Stock cannot be negative"));
    }
    Ok(())
}

/// Image URLs must be absolute http(s) URLs of at most 2048 characters.
fn validate_image_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::validation("Image URL exceeds 2048 characters"));
    }

    let parsed =
        url::Url::parse(url).map_err(|_| AppError::validation("Invalid image URL format"))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(AppError::validation("Image URL must use HTTP or HTTPS")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, price: Option<i64>) -> CreateCoffeeRequest {
        CreateCoffeeRequest {
            name: name.map(str::to_string),
            description: None,
            price,
            stock: None,
            category: Some("espresso".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn test_create_requires_name_and_price() {
        assert!(matches!(
            request(None, Some(20000)).validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            request(Some("   "), Some(20000)).validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            request(Some("Americano"), None).validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_defaults_stock_to_zero() {
        let coffee = request(Some(" Americano "), Some(18000)).validate().unwrap();
        assert_eq!(coffee.name, "Americano");
        assert_eq!(coffee.stock, 0);
        assert_eq!(coffee.price, 18000);
    }

    #[test]
    fn test_create_rejects_bad_numbers() {
        assert!(request(Some("Latte"), Some(0)).validate().is_err());

        let mut negative_stock = request(Some("Latte"), Some(25000));
        negative_stock.stock = Some(-1);
        assert!(negative_stock.validate().is_err());
    }

    #[test]
    fn test_image_url_scheme() {
        assert!(validate_image_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(validate_image_url("http://localhost:5173/a.png").is_ok());
        assert!(validate_image_url("ftp://example.com/a.jpg").is_err());
        assert!(validate_image_url("not a url").is_err());
    }

    #[test]
    fn test_text_lengths_fit_columns() {
        let long_name = "a".repeat(NAME_MAX_CHARS + 1);
        let err = request(Some(&long_name), Some(20000)).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Coffee name must be at most 100 characters"
        );

        let exact = "a".repeat(NAME_MAX_CHARS);
        assert!(request(Some(&exact), Some(20000)).validate().is_ok());

        let mut long_category = request(Some("Latte"), Some(25000));
        long_category.category = Some("c".repeat(CATEGORY_MAX_CHARS + 1));
        assert!(matches!(
            long_category.validate(),
            Err(AppError::Validation(_))
        ));

        let update = UpdateCoffeeRequest {
            name: Some(long_name),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdateCoffeeRequest {
            category: Some("c".repeat(CATEGORY_MAX_CHARS + 1)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        assert!(UpdateCoffeeRequest::default().validate().is_ok());

        let update = UpdateCoffeeRequest {
            stock: Some(-5),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = UpdateCoffeeRequest {
            price: Some(30000),
            stock: Some(0),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }
}
