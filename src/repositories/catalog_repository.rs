use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::meal::{Column, Entity as Meal, Model as MealModel};
use crate::errors::ServiceError;
use crate::repositories::{BaseRepository, CatalogStore, Repository};

/// Catalog backed by the `meals` table
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    base: BaseRepository,
}

impl CatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn find_available_items(&self, ids: &[Uuid]) -> Result<Vec<MealModel>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = ids.len(), "Looking up catalog items");
        Meal::find()
            .filter(Column::Id.is_in(ids.to_vec()))
            .filter(Column::IsAvailable.eq(true))
            .all(self.base.get_db())
            .await
            .map_err(|e| {
                error!("Catalog lookup failed: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    async fn list_available(&self) -> Result<Vec<MealModel>, ServiceError> {
        Meal::find()
            .filter(Column::IsAvailable.eq(true))
            .order_by_asc(Column::Category)
            .order_by_asc(Column::Name)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
