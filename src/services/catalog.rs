use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::minor_to_major;
use crate::entities::meal;
use crate::errors::ServiceError;
use crate::repositories::CatalogStore;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MealResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[schema(value_type = String, example = "3500.00")]
    pub price: Decimal,
    pub price_minor: i64,
}

impl From<meal::Model> for MealResponse {
    fn from(m: meal::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            category: m.category,
            description: m.description,
            image_url: m.image_url,
            price: minor_to_major(m.price_minor),
            price_minor: m.price_minor,
        }
    }
}

/// Menu listing
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn list_meals(&self) -> Result<Vec<MealResponse>, ServiceError> {
        Ok(self
            .catalog
            .list_available()
            .await?
            .into_iter()
            .map(MealResponse::from)
            .collect())
    }
}
