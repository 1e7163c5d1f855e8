//! Domain Models
//!
//! Causes, currencies and catalog queries.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Currencies a donation can be made in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Ghs,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Ghs => "GHS",
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Ghs => "₵",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Usd => "US Dollar",
            Self::Ghs => "Ghanaian Cedi",
        }
    }

    /// Format an amount with this currency's symbol, e.g. `$35.00`
    pub fn format(self, amount: Decimal) -> String {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{}{:.2}", self.symbol(), rounded)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::Usd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "GHS" => Ok(Self::Ghs),
            other => Err(CoreError::validation("currency", format!("Unsupported currency: {other}"))),
        }
    }
}

/// Lifecycle of a cause
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CauseStatus {
    Draft,
    Pending,
    Live,
    Completed,
    Rejected,
}

impl CauseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending Approval",
            Self::Live => "Live",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Only live causes accept donations
    pub const fn accepts_donations(self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Person running a cause
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl Organizer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A fundraising campaign
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub id: String,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub goal_amount: Decimal,
    pub current_amount: Decimal,
    pub currency: Currency,
    pub category: String,
    pub status: CauseStatus,
    pub organizer: Organizer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub donation_count: u32,
}

impl Cause {
    /// Funding progress as a percentage, capped at 100
    pub fn progress_percentage(&self) -> Decimal {
        if self.goal_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let percent = self.current_amount / self.goal_amount * Decimal::ONE_HUNDRED;
        percent.min(Decimal::ONE_HUNDRED).round_dp(2)
    }

    /// Amount still needed to reach the goal
    pub fn remaining_amount(&self) -> Decimal {
        (self.goal_amount - self.current_amount).max(Decimal::ZERO)
    }
}

/// Cause category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
}

impl Category {
    fn new(id: &str, name: &str, icon: &str, description: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            description: description.into(),
        }
    }

    /// Built-in category list
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("education", "Education", "📚", "Educational initiatives and scholarships"),
            Self::new("healthcare", "Healthcare", "🏥", "Medical treatments and health programs"),
            Self::new("environment", "Environment", "🌱", "Environmental conservation and sustainability"),
            Self::new("animals", "Animals", "🐾", "Animal welfare and rescue"),
            Self::new("community", "Community", "🏘️", "Community development projects"),
            Self::new("disaster", "Disaster Relief", "🚨", "Emergency and disaster response"),
            Self::new("arts", "Arts & Culture", "🎨", "Arts, culture, and creative projects"),
            Self::new("technology", "Technology", "💻", "Tech for good initiatives"),
            Self::new("sports", "Sports", "⚽", "Sports and recreation programs"),
            Self::new("other", "Other", "🤝", "Other charitable causes"),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    GoalAmount,
    CurrentAmount,
    EndDate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Catalog search parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<CauseStatus>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl SearchFilters {
    /// Whether a cause passes every filter that is set
    pub fn matches(&self, cause: &Cause) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            let hit = cause.title.to_lowercase().contains(&query)
                || cause.description.to_lowercase().contains(&query)
                || cause.organizer.first_name.to_lowercase().contains(&query)
                || cause.organizer.last_name.to_lowercase().contains(&query)
                || cause.tags.iter().any(|t| t.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if cause.category != category {
                return false;
            }
        }

        if self.status.is_some_and(|s| s != cause.status) {
            return false;
        }

        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            let location = location.to_lowercase();
            let hit = cause
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&location));
            if !hit {
                return false;
            }
        }

        if self.min_amount.is_some_and(|min| cause.goal_amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| cause.goal_amount > max) {
            return false;
        }

        self.currency.is_none_or(|c| c == cause.currency)
    }

    /// Ordering between two causes under the configured sort
    pub fn compare(&self, a: &Cause, b: &Cause) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::GoalAmount => a.goal_amount.cmp(&b.goal_amount),
            SortBy::CurrentAmount => a.current_amount.cmp(&b.current_amount),
            // Open-ended causes sort as if they end last
            SortBy::EndDate => match (a.end_date, b.end_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };

        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// One page of a paginated listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub const DEFAULT_PAGE_SIZE: usize = 12;
    pub const MAX_PAGE_SIZE: usize = 100;

    /// Slice `items` into 1-based page `page`
    pub fn paginate(items: Vec<T>, page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.clamp(1, Self::MAX_PAGE_SIZE);
        let count = items.len();
        let start = (page - 1).saturating_mul(page_size);

        let results: Vec<T> = items.into_iter().skip(start).take(page_size).collect();
        let next = start
            .checked_add(page_size)
            .is_some_and(|end| end < count)
            .then(|| format!("?page={}&page_size={page_size}", page + 1));
        let previous = (page > 1).then(|| format!("?page={}&page_size={page_size}", page - 1));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}
