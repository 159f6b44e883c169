//! Demo menu used by the `seed-data` binary and the integration tests.

use chrono::Utc;
use sea_orm::{ConnectionTrait, EntityTrait, Set, TransactionTrait};
use tracing::info;
use uuid::Uuid;

use crate::common::MINOR_UNIT_SCALE;
use crate::entities::meal;

/// A menu entry; `price` is in major units.
#[derive(Debug, Clone, Copy)]
pub struct DemoMeal {
    pub name: &'static str,
    pub category: &'static str,
    pub price: i64,
    pub description: &'static str,
    pub image_url: &'static str,
}

pub const DEMO_MEALS: &[DemoMeal] = &[
    DemoMeal {
        name: "Smoky Jollof Rice",
        category: "Rice",
        price: 3500,
        description: "Smoky party-style jollof served hot.",
        image_url: "/images/Jollof-Rice-02.jpg",
    },
    DemoMeal {
        name: "Chicken Fried Rice",
        category: "Rice",
        price: 3800,
        description: "Veg fried rice with tender chicken.",
        image_url: "/images/chicken_fried_rice.jpg",
    },
    DemoMeal {
        name: "Beef Suya",
        category: "Grills",
        price: 3200,
        description: "Spicy suya with fresh veggies.",
        image_url: "/images/Suya.jpg",
    },
    DemoMeal {
        name: "Chicken Shawarma",
        category: "Wraps",
        price: 3000,
        description: "Classic shawarma with creamy sauce.",
        image_url: "/images/chicken_shawarma.jpg",
    },
    DemoMeal {
        name: "Yam Porridge (Asaro)",
        category: "Local",
        price: 3400,
        description: "Rich, peppery yam porridge.",
        image_url: "/images/yam_porridge_asaro.jpg",
    },
    DemoMeal {
        name: "Zobo (500ml)",
        category: "Drinks",
        price: 800,
        description: "Chilled zobo with pineapple twist.",
        image_url: "/images/zobo_drink.jpg",
    },
];

impl DemoMeal {
    fn to_active_model(self) -> meal::ActiveModel {
        let now = Utc::now();
        meal::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(self.name.to_string()),
            category: Set(self.category.to_string()),
            description: Set(Some(self.description.to_string())),
            image_url: Set(Some(self.image_url.to_string())),
            price_minor: Set(self.price * 10_i64.pow(MINOR_UNIT_SCALE)),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// Replaces the whole menu with [`DEMO_MEALS`]. Safe to run repeatedly.
pub async fn seed_meals<C>(db: &C) -> Result<Vec<meal::Model>, sea_orm::DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let removed = meal::Entity::delete_many().exec(&txn).await?.rows_affected;

    let models: Vec<meal::ActiveModel> = DEMO_MEALS.iter().map(|m| m.to_active_model()).collect();
    meal::Entity::insert_many(models).exec(&txn).await?;
    txn.commit().await?;

    info!(removed, inserted = DEMO_MEALS.len(), "Seeded demo menu");
    meal::Entity::find().all(db).await
}
