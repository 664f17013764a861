//! Item records, request payloads and schema validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Maximum length of an item name, in characters
pub const NAME_MAX_LEN: usize = 100;

/// Maximum length of an item description, in characters
pub const DESCRIPTION_MAX_LEN: usize = 500;

/// Schema violations in item payloads
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("name must be 1-{} characters", NAME_MAX_LEN)]
    InvalidName,

    #[error("description must be at most {} characters", DESCRIPTION_MAX_LEN)]
    DescriptionTooLong,

    #[error("price must be a non-negative number")]
    NegativePrice,

    #[error("{0} must not be negative")]
    NegativeParameter(&'static str),
}

/// A stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    /// Server-assigned identifier
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Unset until the first update
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for creating an item
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Request body for a partial item update.
///
/// Absent fields are left unchanged. `description` distinguishes an absent
/// field from an explicit `null`, which clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Maps a present JSON value (including `null`) to `Some`
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// One page of items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Number of stored items, independent of paging
    pub total: u64,
    pub skip: i64,
    pub limit: i64,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX_LEN {
        return Err(ValidationError::InvalidName);
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    match description {
        Some(d) if d.chars().count() > DESCRIPTION_MAX_LEN => {
            Err(ValidationError::DescriptionTooLong)
        }
        _ => Ok(()),
    }
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::NegativePrice);
    }
    Ok(())
}

impl CreateItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_description(self.description.as_deref())?;
        validate_price(self.price)
    }
}

impl UpdateItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Apply the present fields to `item` and stamp `updated_at`
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(is_active) = self.is_active {
            item.is_active = is_active;
        }
        item.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> Item {
        Item {
            id: 1,
            name: "Widget".to_string(),
            description: Some("A widget".to_string()),
            price: 9.99,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_create_defaults_to_active() {
        let create: CreateItem =
            serde_json::from_value(json!({"name": "Widget", "price": 9.99})).unwrap();
        assert!(create.is_active);
        assert!(create.description.is_none());
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_create_validation() {
        let mut create = CreateItem {
            name: String::new(),
            description: None,
            price: 1.0,
            is_active: true,
        };
        assert_eq!(create.validate(), Err(ValidationError::InvalidName));

        create.name = "x".repeat(NAME_MAX_LEN + 1);
        assert_eq!(create.validate(), Err(ValidationError::InvalidName));

        create.name = "x".repeat(NAME_MAX_LEN);
        assert!(create.validate().is_ok());

        create.price = -0.01;
        assert_eq!(create.validate(), Err(ValidationError::NegativePrice));

        create.price = f64::NAN;
        assert_eq!(create.validate(), Err(ValidationError::NegativePrice));

        create.price = 0.0;
        create.description = Some("d".repeat(DESCRIPTION_MAX_LEN + 1));
        assert_eq!(create.validate(), Err(ValidationError::DescriptionTooLong));
    }

    #[test]
    fn test_item_serializes_missing_description_as_null() {
        let mut item = sample_item();
        item.description = None;

        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["description"], serde_json::Value::Null);
        assert!(value.as_object().unwrap().contains_key("description"));
        assert!(value.as_object().unwrap().contains_key("updated_at"));
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: UpdateItem = serde_json::from_value(json!({"price": 5.0})).unwrap();
        assert!(absent.description.is_none());

        let cleared: UpdateItem =
            serde_json::from_value(json!({"description": null})).unwrap();
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn test_apply_update() {
        let mut item = sample_item();
        let update = UpdateItem {
            name: Some("Gadget".to_string()),
            description: Some(None),
            price: None,
            is_active: Some(false),
        };

        update.apply_to(&mut item);

        assert_eq!(item.name, "Gadget");
        assert!(item.description.is_none());
        assert_eq!(item.price, 9.99);
        assert!(!item.is_active);
        assert!(item.updated_at.is_some());
    }

    #[test]
    fn test_update_validation() {
        let update = UpdateItem {
            price: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ValidationError::NegativePrice));

        let update = UpdateItem {
            name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ValidationError::InvalidName));

        assert!(UpdateItem::default().validate().is_ok());
    }
}
