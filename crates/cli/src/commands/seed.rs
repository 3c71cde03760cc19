//! Seed an empty catalog with demo categories and products.
//!
//! Refuses to touch a catalog that already has products, so it is safe to
//! run on every fresh environment.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

struct DemoCategory {
    name: &'static str,
    description: &'static str,
}

struct DemoProduct {
    category: &'static str,
    name: &'static str,
    description: &'static str,
    /// Price in kobo.
    price_minor: i64,
    stock: i32,
    is_new: bool,
    image: &'static str,
}

impl DemoProduct {
    fn price(&self) -> Decimal {
        Decimal::new(self.price_minor, 2)
    }
}

const CATEGORIES: &[DemoCategory] = &[
    DemoCategory {
        name: "Ankara",
        description: "Wax print cotton, sold by the six-yard piece",
    },
    DemoCategory {
        name: "Lace",
        description: "Cord and beaded lace for occasion wear",
    },
    DemoCategory {
        name: "Aso Oke",
        description: "Hand-loomed strips, sold as a set",
    },
];

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        category: "Ankara",
        name: "Indigo Swirl Ankara",
        description: "Deep indigo ground with white swirls",
        price_minor: 1_850_000,
        stock: 40,
        is_new: true,
        image: "https://images.texos.example/ankara-indigo-swirl.jpg",
    },
    DemoProduct {
        category: "Ankara",
        name: "Sunburst Ankara",
        description: "Orange and gold radial print",
        price_minor: 1_600_000,
        stock: 25,
        is_new: false,
        image: "https://images.texos.example/ankara-sunburst.jpg",
    },
    DemoProduct {
        category: "Lace",
        name: "Champagne Cord Lace",
        description: "Soft cord lace, five yards",
        price_minor: 4_500_000,
        stock: 12,
        is_new: true,
        image: "https://images.texos.example/lace-champagne-cord.jpg",
    },
    DemoProduct {
        category: "Lace",
        name: "Emerald Beaded Lace",
        description: "Hand-beaded tulle lace, five yards",
        price_minor: 9_800_000,
        stock: 5,
        is_new: false,
        image: "https://images.texos.example/lace-emerald-beaded.jpg",
    },
    DemoProduct {
        category: "Aso Oke",
        name: "Wine Aso Oke Set",
        description: "Gele, ipele and iro in deep wine",
        price_minor: 6_500_000,
        stock: 8,
        is_new: false,
        image: "https://images.texos.example/aso-oke-wine.jpg",
    },
];

/// Insert the demo catalog in one transaction if no products exist yet.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn demo_catalog() -> Result<(), SeedError> {
    let pool = connect("DATABASE_URL").await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.product")
        .fetch_one(&pool)
        .await?;
    if existing > 0 {
        info!(products = existing, "Catalog is not empty, skipping seed");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for category in CATEGORIES {
        sqlx::query(
            "INSERT INTO shop.category (name, description) VALUES ($1, $2)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(category.name)
        .bind(category.description)
        .execute(&mut *tx)
        .await?;
    }

    for product in PRODUCTS {
        let product_id: i32 = sqlx::query_scalar(
            "INSERT INTO shop.product (category_id, name, description, price, stock, is_new)
             SELECT c.id, $2, $3, $4, $5, $6 FROM shop.category c WHERE c.name = $1
             RETURNING id",
        )
        .bind(product.category)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price())
        .bind(product.stock)
        .bind(product.is_new)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO shop.product_image (product_id, image_url, position) VALUES ($1, $2, 0)",
        )
        .bind(product_id)
        .bind(product.image)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!("Seeding complete!");
    info!("  Categories: {}", CATEGORIES.len());
    info!("  Products: {}", PRODUCTS.len());
    Ok(())
}
