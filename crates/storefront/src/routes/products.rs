//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use texos_core::models::{Category, Product, ProductQuery, ProductSort};
use texos_core::services::CatalogService;
use texos_core::{CategoryId, Page, PageRequest, ProductId};

use crate::error::Result;
use crate::state::AppState;

/// Query string for `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub max_price: Option<Decimal>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<ProductListParams> for ProductQuery {
    fn from(params: ProductListParams) -> Self {
        Self {
            search: params
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            category: params.category,
            max_price: params.max_price,
            sort: params.sort.unwrap_or_default(),
            page: PageRequest::new(params.page, params.per_page, Self::DEFAULT_PER_PAGE),
        }
    }
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<Json<Page<Product>>> {
    let query = ProductQuery::from(params);
    Ok(Json(CatalogService::new(state.store()).browse(&query).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(CatalogService::new(state.store()).product(id).await?))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CatalogService::new(state.store()).categories().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_normalized() {
        let query = ProductQuery::from(ProductListParams {
            search: Some("   ".to_string()),
            per_page: Some(500),
            ..ProductListParams::default()
        });
        assert_eq!(query.search, None);
        assert_eq!(query.sort, ProductSort::Name);
        assert_eq!(query.page.page(), 1);
        assert_eq!(query.page.per_page(), PageRequest::MAX_PER_PAGE);
    }

    #[test]
    fn test_default_page_size() {
        let query = ProductQuery::from(ProductListParams::default());
        assert_eq!(query.page.per_page(), ProductQuery::DEFAULT_PER_PAGE);
    }
}
