//! In-Memory Cause Repository
//!
//! Serves a fixed set of causes. Used for demos and tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::CauseRepository;
use crate::error::{CoreError, Result};
use crate::model::{Cause, CauseStatus, Currency, Organizer, Page, SearchFilters};

/// In-memory cause repository
pub struct InMemoryCauseRepository {
    causes: Vec<Cause>,
}

impl Default for InMemoryCauseRepository {
    fn default() -> Self {
        Self::demo()
    }
}

impl InMemoryCauseRepository {
    pub const fn new(causes: Vec<Cause>) -> Self {
        Self { causes }
    }

    /// Repository seeded with [`demo_causes`]
    pub fn demo() -> Self {
        Self::new(demo_causes())
    }
}

#[async_trait]
impl CauseRepository for InMemoryCauseRepository {
    async fn list(&self, filters: &SearchFilters, page: usize, page_size: usize) -> Result<Page<Cause>> {
        let mut matched: Vec<Cause> = self
            .causes
            .iter()
            .filter(|c| filters.matches(c))
            .cloned()
            .collect();
        matched.sort_by(|a, b| filters.compare(a, b));
        Ok(Page::paginate(matched, page, page_size))
    }

    async fn get(&self, id: &str) -> Result<Cause> {
        self.causes
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| CoreError::CauseNotFound(id.to_string()))
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

struct Seed {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    short_description: &'static str,
    goal: Decimal,
    current: Decimal,
    category: &'static str,
    organizer: (&'static str, &'static str, &'static str, &'static str),
    location: &'static str,
    created: DateTime<Utc>,
    ends: DateTime<Utc>,
    tags: &'static [&'static str],
    featured: bool,
    donations: u32,
}

impl Seed {
    fn into_cause(self) -> Cause {
        let (first_name, last_name, email, organizer_location) = self.organizer;
        Cause {
            id: self.id.into(),
            title: self.title.into(),
            description: self.description.into(),
            short_description: self.short_description.into(),
            goal_amount: self.goal,
            current_amount: self.current,
            currency: Currency::Usd,
            category: self.category.into(),
            status: CauseStatus::Live,
            organizer: Organizer {
                id: self.id.into(),
                first_name: first_name.into(),
                last_name: last_name.into(),
                email: email.into(),
                location: Some(organizer_location.into()),
            },
            created_at: self.created,
            updated_at: self.created,
            end_date: Some(self.ends),
            tags: self.tags.iter().map(|t| (*t).to_string()).collect(),
            location: Some(self.location.into()),
            is_featured: self.featured,
            donation_count: self.donations,
        }
    }
}

/// Demo catalog
pub fn demo_causes() -> Vec<Cause> {
    vec![
        Seed {
            id: "1",
            title: "Help Build a School in Rural Ghana",
            description: "We are raising funds to build a primary school in a rural community in Ghana to provide quality education to over 200 children who currently have no access to proper educational facilities.",
            short_description: "Building a primary school for 200 children in rural Ghana",
            goal: dec!(50000),
            current: dec!(32500),
            category: "education",
            organizer: ("John", "Doe", "organizer@example.com", "Accra, Ghana"),
            location: "Upper East Region, Ghana",
            created: date(2024, 1, 1),
            ends: date(2024, 6, 1),
            tags: &["education", "ghana", "school", "children"],
            featured: true,
            donations: 127,
        },
        Seed {
            id: "2",
            title: "Emergency Relief for Flood Victims",
            description: "Providing immediate relief including food, clean water, and shelter to families affected by recent flooding in coastal communities.",
            short_description: "Emergency relief for flood-affected families",
            goal: dec!(25000),
            current: dec!(18750),
            category: "disaster",
            organizer: ("Jane", "Smith", "relief@example.com", "Lagos, Nigeria"),
            location: "Lagos State, Nigeria",
            created: date(2024, 1, 2),
            ends: date(2024, 3, 1),
            tags: &["disaster", "relief", "flood", "emergency"],
            featured: true,
            donations: 89,
        },
        Seed {
            id: "3",
            title: "Medical Equipment for Community Hospital",
            description: "Raising funds to purchase essential medical equipment including X-ray machines, ventilators, and patient monitors for our community hospital to better serve patients.",
            short_description: "Essential medical equipment for community hospital",
            goal: dec!(75000),
            current: dec!(45000),
            category: "healthcare",
            organizer: ("Dr. Sarah", "Johnson", "medical@example.com", "Nairobi, Kenya"),
            location: "Nairobi, Kenya",
            created: date(2024, 1, 3),
            ends: date(2024, 5, 1),
            tags: &["healthcare", "medical", "hospital", "equipment"],
            featured: false,
            donations: 156,
        },
        Seed {
            id: "4",
            title: "Clean Water Wells for Rural Communities",
            description: "Installing clean water wells and water purification systems in remote villages to provide safe drinking water for over 1000 people.",
            short_description: "Clean water access for rural communities",
            goal: dec!(35000),
            current: dec!(21000),
            category: "environment",
            organizer: ("Michael", "Brown", "water@example.com", "Kampala, Uganda"),
            location: "Northern Uganda",
            created: date(2024, 1, 4),
            ends: date(2024, 4, 1),
            tags: &["environment", "water", "rural", "community"],
            featured: false,
            donations: 78,
        },
        Seed {
            id: "5",
            title: "Animal Shelter Renovation",
            description: "Renovating and expanding our animal shelter to accommodate more rescued animals and provide better living conditions.",
            short_description: "Renovating animal shelter for rescued pets",
            goal: dec!(20000),
            current: dec!(8500),
            category: "animals",
            organizer: ("Lisa", "Williams", "shelter@example.com", "Cape Town, South Africa"),
            location: "Cape Town, South Africa",
            created: date(2024, 1, 5),
            ends: date(2024, 7, 1),
            tags: &["animals", "shelter", "rescue", "pets"],
            featured: false,
            donations: 42,
        },
    ]
    .into_iter()
    .map(Seed::into_cause)
    .collect()
}
