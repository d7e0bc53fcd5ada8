use reqwest::Method;

use crate::client::{ApiClient, RequestOptions, path_segment};
use crate::error::ApiResult;
use crate::models::{Category, Product, ProductPage, ProductQuery};

impl ApiClient {
    // Catalogue reads are idempotent, so transient failures are retried
    pub async fn list_products(&self, query: &ProductQuery) -> ApiResult<ProductPage> {
        let options = RequestOptions::new(Method::GET)
            .query_opt("page", query.page)
            .query_opt("limit", query.limit)
            .query_opt("category", query.category.as_deref())
            .query_opt("search", query.search.as_deref())
            .query_opt("sort", query.sort.as_deref());
        self.request_with_retry("/products", options).await
    }

    pub async fn get_product(&self, id: &str) -> ApiResult<Product> {
        let path = format!("/products/{}", path_segment(id)?);
        self.request_with_retry(&path, RequestOptions::default())
            .await
    }

    pub async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.request_with_retry("/categories", RequestOptions::default())
            .await
    }
}
