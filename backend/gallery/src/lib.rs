//! # Gallery
//!
//! Shared image model and the rating store behind the voting server and the importer.
//!
//! ## Overall Data Structures
//!
//! - [`Image`]: one rateable asset. Id is assigned on insert, locator is unique, rating starts at
//!   [`DEFAULT_RATING`] and never goes below zero.
//!
//! - [`RatingStore`]: async trait every backend implements. Random-offset reads for pair sampling,
//!   id lookups, an atomic two-row rating update, inserts that skip duplicate locators and
//!   leaderboard reads.
//!
//! ### Backends
//! - [`RedisStore`]: production backend, see [`database`] for the key layout.
//! - [`MemoryStore`]: same contract behind a `RwLock`, used for local runs and tests.
//!
//! ## Notes
//! - No version column on ratings. Two votes racing on the same image both read the old rating
//!   and the last write wins. Ratings are nudges, not a ledger, so this is accepted.

pub mod database;
pub mod error;
pub mod images;
pub mod memory;
pub mod store;

pub use database::RedisStore;
pub use error::StoreError;
pub use images::{DEFAULT_RATING, Image, ImageSummary, NewImage};
pub use memory::MemoryStore;
pub use store::RatingStore;
