use async_trait::async_trait;

use crate::{
    error::StoreError,
    images::{Image, NewImage},
};

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn count(&self) -> Result<u64, StoreError>;

    /// Image at `offset` in id order. `None` if the offset is past the end.
    async fn sample(&self, offset: u64) -> Result<Option<Image>, StoreError>;

    async fn get_by_id(&self, id: u64) -> Result<Option<Image>, StoreError>;

    /// Writes both ratings or neither. Fails with [`StoreError::NotFound`] if either id is gone.
    async fn apply_update(
        &self,
        id_a: u64,
        rating_a: f64,
        id_b: u64,
        rating_b: f64,
    ) -> Result<(), StoreError>;

    /// Returns the new id, or `None` when the locator is already stored.
    async fn insert(&self, image: NewImage) -> Result<Option<u64>, StoreError>;

    /// Highest rated first.
    async fn top(&self, limit: usize) -> Result<Vec<Image>, StoreError>;

    /// Lowest rated first.
    async fn bottom(&self, limit: usize) -> Result<Vec<Image>, StoreError>;
}

pub(crate) fn clamp_rating(rating: f64) -> f64 {
    rating.max(0.0)
}
