//! HTTP Cause Repository
//!
//! Reads causes from the CauseHive REST API.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::CauseRepository;
use crate::error::{CoreError, Result};
use crate::model::{Cause, Page, SearchFilters, SortBy, SortOrder};

const CAUSES_PATH: &str = "/api/causes";

/// Cause repository backed by the CauseHive API
pub struct HttpCauseRepository {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCauseRepository {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from `CAUSEHIVE_API_URL`
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CAUSEHIVE_API_URL")
            .map_err(|_| CoreError::Config("CAUSEHIVE_API_URL not set".into()))?;
        Ok(Self::new(base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query-string pairs for a catalog search
    fn query_params(filters: &SearchFilters, page: usize, page_size: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", page.max(1).to_string()), ("page_size", page_size.to_string())];

        if let Some(query) = filters.query.as_deref().filter(|q| !q.trim().is_empty()) {
            params.push(("search", query.trim().to_string()));
        }
        if let Some(category) = filters.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(("category", category.to_string()));
        }
        if let Some(status) = filters.status {
            params.push(("status", format!("{status:?}").to_lowercase()));
        }
        if let Some(location) = filters.location.as_deref().filter(|l| !l.is_empty()) {
            params.push(("location", location.to_string()));
        }
        if let Some(min) = filters.min_amount {
            params.push(("min_amount", min.to_string()));
        }
        if let Some(max) = filters.max_amount {
            params.push(("max_amount", max.to_string()));
        }
        if let Some(currency) = filters.currency {
            params.push(("currency", currency.code().to_string()));
        }

        let field = match filters.sort_by {
            SortBy::CreatedAt => "created_at",
            SortBy::GoalAmount => "goal_amount",
            SortBy::CurrentAmount => "current_amount",
            SortBy::EndDate => "end_date",
        };
        let ordering = match filters.sort_order {
            SortOrder::Asc => field.to_string(),
            SortOrder::Desc => format!("-{field}"),
        };
        params.push(("ordering", ordering));

        params
    }
}

#[async_trait]
impl CauseRepository for HttpCauseRepository {
    async fn list(&self, filters: &SearchFilters, page: usize, page_size: usize) -> Result<Page<Cause>> {
        let url = format!("{}{CAUSES_PATH}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&Self::query_params(filters, page, page_size))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Cause listing failed");
            return Err(CoreError::Api(format!("cause listing failed with {status}")));
        }

        Ok(response.json::<Page<Cause>>().await?)
    }

    async fn get(&self, id: &str) -> Result<Cause> {
        let url = format!("{}{CAUSES_PATH}/{id}/", self.base_url);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CoreError::CauseNotFound(id.to_string())),
            status if status.is_success() => Ok(response.json::<Cause>().await?),
            status => Err(CoreError::Api(format!("cause lookup failed with {status}"))),
        }
    }

    fn name(&self) -> &str {
        "CauseHiveApi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CauseStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trailing_slash_trimmed() {
        let repo = HttpCauseRepository::new("http://localhost:8000/");
        assert_eq!(repo.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_query_params() {
        let filters = SearchFilters {
            query: Some(" school ".into()),
            status: Some(CauseStatus::Live),
            min_amount: Some(dec!(100)),
            sort_by: SortBy::GoalAmount,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let params = HttpCauseRepository::query_params(&filters, 0, 12);

        assert!(params.contains(&("page", "1".to_string())));
        assert!(params.contains(&("search", "school".to_string())));
        assert!(params.contains(&("status", "live".to_string())));
        assert!(params.contains(&("min_amount", "100".to_string())));
        assert!(params.contains(&("ordering", "-goal_amount".to_string())));
    }
}
