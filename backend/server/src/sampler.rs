//! # Pair Sampling
//!
//! Picks two distinct images for a comparison round.
//!
//! - Two uniform offsets in `[0, N)`, resolved through the store's id ordered index
//! - On a collision the second offset is redrawn, at most [`MAX_REDRAWS`] times
//! - After that, walk offsets from the start until an id differs from the first pick, so
//!   a stuck RNG still terminates
//!
//! Inserts or deletes landing mid-sample can skew the distribution slightly, which is fine.
use gallery::{Image, RatingStore};
use rand::Rng;

use crate::error::AppError;

pub const MAX_REDRAWS: usize = 8;

async fn resolve(store: &dyn RatingStore, offset: u64) -> Result<Image, AppError> {
    // Offset past the end means rows vanished since the count
    store
        .sample(offset)
        .await?
        .ok_or(AppError::InsufficientData)
}

pub async fn sample_pair<R>(store: &dyn RatingStore, rng: &mut R) -> Result<(Image, Image), AppError>
where
    R: Rng + Send,
{
    let count = store.count().await?;
    if count < 2 {
        return Err(AppError::InsufficientData);
    }

    let first_offset = rng.random_range(0..count);
    let mut second_offset = rng.random_range(0..count);

    let mut redraws = 0;
    while second_offset == first_offset && redraws < MAX_REDRAWS {
        second_offset = rng.random_range(0..count);
        redraws += 1;
    }

    let first = resolve(store, first_offset).await?;

    if second_offset != first_offset {
        let second = resolve(store, second_offset).await?;

        if second.id != first.id {
            return Ok((first, second));
        }
    }

    for offset in 0..count {
        match store.sample(offset).await? {
            Some(candidate) if candidate.id != first.id => return Ok((first, candidate)),
            Some(_) => continue,
            None => break,
        }
    }

    Err(AppError::InsufficientData)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use gallery::{MemoryStore, NewImage};
    use rand::{RngCore, SeedableRng, rngs::SmallRng};

    use super::*;

    /// Always yields zero, every offset draw lands on the first row.
    struct StuckRng;

    impl RngCore for StuckRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
    }

    async fn store_with(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..n {
            store
                .insert(NewImage::new(format!("image {i}"), format!("/images/{i}.png")))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_fails_below_two_images() {
        let mut rng = SmallRng::seed_from_u64(7);

        for n in [0, 1] {
            let store = store_with(n).await;
            let result = sample_pair(&store, &mut rng).await;

            assert!(matches!(result, Err(AppError::InsufficientData)));
        }
    }

    #[tokio::test]
    async fn test_two_images_always_both_returned() {
        let store = store_with(2).await;
        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..50 {
            let (first, second) = sample_pair(&store, &mut rng).await.unwrap();

            let ids: HashSet<u64> = [first.id, second.id].into();
            assert_eq!(ids, HashSet::from([1, 2]));
        }
    }

    #[tokio::test]
    async fn test_stuck_rng_falls_back_to_scan() {
        let store = store_with(3).await;

        let (first, second) = sample_pair(&store, &mut StuckRng).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_every_image_gets_picked() {
        let store = store_with(5).await;
        let mut rng = SmallRng::seed_from_u64(1234);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let (first, second) = sample_pair(&store, &mut rng).await.unwrap();
            assert_ne!(first.id, second.id);

            seen.insert(first.id);
            seen.insert(second.id);
        }

        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_skips_removed_rows() {
        let store = store_with(3).await;
        store.remove(2).await;
        let mut rng = SmallRng::seed_from_u64(9);

        for _ in 0..20 {
            let (first, second) = sample_pair(&store, &mut rng).await.unwrap();
            assert!(first.id != 2 && second.id != 2);
        }
    }
}
