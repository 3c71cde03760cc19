use tracing::instrument;

use crate::error::{ShopError, ShopResult};
use crate::models::{Category, Product, ProductQuery};
use crate::store::ShopStore;
use crate::types::{Page, ProductId};

/// Read-only catalog access.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: ShopStore> CatalogService<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// `NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> ShopResult<Product> {
        self.store
            .product(id)
            .await?
            .ok_or_else(|| ShopError::not_found("Product"))
    }

    /// # Errors
    ///
    /// Store failures only.
    #[instrument(skip(self))]
    pub async fn browse(&self, query: &ProductQuery) -> ShopResult<Page<Product>> {
        Ok(self.store.browse_products(query).await?)
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn categories(&self) -> ShopResult<Vec<Category>> {
        Ok(self.store.categories().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::ProductSort;
    use crate::store::MemoryStore;
    use crate::types::PageRequest;

    #[tokio::test]
    async fn test_browse_filters_and_sorts() {
        let store = MemoryStore::new();
        let drinks = store.add_category("Drinks");
        let zobo = store.add_product("Zobo", Decimal::from(1500), 10);
        let kunu = store.add_product("Kunu", Decimal::from(1200), 10);
        let tiger = store.add_product("Tigernut Milk", Decimal::from(3000), 10);
        store.categorize(zobo, drinks);
        store.categorize(kunu, drinks);

        let catalog = CatalogService::new(&store);

        let query = ProductQuery {
            category: Some(drinks),
            sort: ProductSort::PriceLow,
            ..ProductQuery::default()
        };
        let page = catalog.browse(&query).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![kunu, zobo]);

        let query = ProductQuery {
            max_price: Some(Decimal::from(2000)),
            search: Some("ZO".into()),
            ..ProductQuery::default()
        };
        let page = catalog.browse(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, zobo);

        let query = ProductQuery {
            sort: ProductSort::PriceHigh,
            page: PageRequest::new(Some(1), Some(1), 6),
            ..ProductQuery::default()
        };
        let page = catalog.browse(&query).await.unwrap();
        assert_eq!(page.items[0].id, tiger);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let store = MemoryStore::new();
        let err = CatalogService::new(&store)
            .product(ProductId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }
}
