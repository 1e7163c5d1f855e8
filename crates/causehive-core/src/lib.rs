//! # causehive-core
//!
//! Client-side state for the CauseHive donation marketplace: the cause
//! catalog, the donation cart, the signed-in user and their preferences.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Client runtime                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │  CartStore   │  │ AuthSession  │  │  CauseRepository   │  │
//! │  │ (observable) │  │ (observable) │  │  (memory | http)   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └────────────────────┘  │
//! │         │  save after     │                                   │
//! │         ▼  every mutation ▼                                   │
//! │  ┌────────────────────────────────┐                           │
//! │  │  ClientStorage (memory | file) │                           │
//! │  └────────────────────────────────┘                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stores are explicit objects handed to whoever needs them. Each one
//! persists itself through a [`ClientStorage`] after a committed mutation and
//! publishes a fresh snapshot to its subscribers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use causehive_core::{CartConfig, CartStore, Currency, MemoryStorage};
//! use rust_decimal_macros::dec;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let mut cart = CartStore::load(storage, CartConfig::default());
//!
//! cart.add_or_update(&cause, dec!(25), Currency::Usd, false, None)?;
//! assert_eq!(cart.totals().total_amount, dec!(25));
//! ```

pub mod auth;
pub mod cart;
pub mod error;
pub mod model;
pub mod preferences;
pub mod repository;
pub mod storage;

pub use auth::{AuthProvider, AuthSession, AuthTokens, UserIdentity};
pub use cart::{CartConfig, CartHandle, CartItem, CartItemUpdate, CartSnapshot, CartStore, CartTotals, FeeSchedule, FeeSummary};
pub use error::{CoreError, Result};
pub use model::{Category, Cause, CauseStatus, Currency, Page, SearchFilters, SortBy, SortOrder};
pub use preferences::{Preferences, Theme};
pub use repository::{CauseRepository, HttpCauseRepository, InMemoryCauseRepository};
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
