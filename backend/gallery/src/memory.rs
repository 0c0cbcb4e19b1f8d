use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    images::{DEFAULT_RATING, Image, NewImage},
    store::{RatingStore, clamp_rating},
};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    images: BTreeMap<u64, Image>,
    locators: HashMap<String, u64>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrative removal. Votes never delete.
    pub async fn remove(&self, id: u64) -> Option<Image> {
        let mut inner = self.inner.write().await;

        let image = inner.images.remove(&id)?;
        inner.locators.remove(&image.locator);

        Some(image)
    }

    async fn ranked(&self, limit: usize, descending: bool) -> Vec<Image> {
        let inner = self.inner.read().await;

        let mut images: Vec<Image> = inner.images.values().cloned().collect();
        images.sort_by(|a, b| {
            let by_rating = a.rating.partial_cmp(&b.rating).unwrap_or(Ordering::Equal);
            let by_rating = if descending {
                by_rating.reverse()
            } else {
                by_rating
            };

            by_rating.then(a.id.cmp(&b.id))
        });
        images.truncate(limit);

        images
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.images.len() as u64)
    }

    async fn sample(&self, offset: u64) -> Result<Option<Image>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner.images.values().nth(offset as usize).cloned())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Image>, StoreError> {
        Ok(self.inner.read().await.images.get(&id).cloned())
    }

    async fn apply_update(
        &self,
        id_a: u64,
        rating_a: f64,
        id_b: u64,
        rating_b: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        // Check both before touching either
        for id in [id_a, id_b] {
            if !inner.images.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }

        let now = Utc::now();
        for (id, rating) in [(id_a, rating_a), (id_b, rating_b)] {
            if let Some(image) = inner.images.get_mut(&id) {
                image.rating = clamp_rating(rating);
                image.updated_at = now;
            }
        }

        Ok(())
    }

    async fn insert(&self, image: NewImage) -> Result<Option<u64>, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.locators.contains_key(&image.locator) {
            return Ok(None);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();

        inner.locators.insert(image.locator.clone(), id);
        inner.images.insert(
            id,
            Image {
                id,
                name: image.name,
                locator: image.locator,
                rating: DEFAULT_RATING,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(Some(id))
    }

    async fn top(&self, limit: usize) -> Result<Vec<Image>, StoreError> {
        Ok(self.ranked(limit, true).await)
    }

    async fn bottom(&self, limit: usize) -> Result<Vec<Image>, StoreError> {
        Ok(self.ranked(limit, false).await)
    }
}
