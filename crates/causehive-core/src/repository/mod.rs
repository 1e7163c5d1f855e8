//! Cause Catalog
//!
//! Read access to causes behind a trait so nothing depends on where the data
//! comes from: demo data in memory, or the CauseHive API over HTTP.

mod http;
mod memory;

pub use http::HttpCauseRepository;
pub use memory::{InMemoryCauseRepository, demo_causes};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Category, Cause, Page, SearchFilters};

/// Cause repository trait
#[async_trait]
pub trait CauseRepository: Send + Sync {
    /// Search causes, returning 1-based page `page`
    async fn list(&self, filters: &SearchFilters, page: usize, page_size: usize) -> Result<Page<Cause>>;

    /// Get one cause; `CoreError::CauseNotFound` when it does not exist
    async fn get(&self, id: &str) -> Result<Cause>;

    /// Categories causes can belong to
    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(Category::defaults())
    }

    /// Repository name, for logs
    fn name(&self) -> &str;
}
