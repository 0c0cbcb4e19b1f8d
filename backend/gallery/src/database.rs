//! # Redis
//!
//! RAM database.
//!
//! Core purpose is to store images with their ratings, resolve random offsets for pair sampling
//! and apply both sides of a vote atomically.
//!
//! ## Requirements
//!
//! - Fast lookups by id
//! - Rank lookups for random offsets, no table scan
//! - Two ratings change together or not at all
//! - Duplicate locators skipped on import
//!
//! ## Implementation
//!
//! - `image:{id}` hash: name, locator, rating, created_at, updated_at (RFC 3339)
//! - `images:ids` sorted set: member and score are the id, so rank `n` is the `n`th id in order
//! - `images:ratings` sorted set: score is the rating, backs the leaderboard
//! - `images:locators` hash: locator to id, dedup on import
//! - `images:next_id` counter: `INCR` for new ids, first id is 1
//! - Inserts and rating updates are Lua scripts, Redis runs each one without interleaving
//!
//! ## Notes
//! - Leaderboard ties come back in Redis member order, which is lexicographic on the id string.
//! - The insert script builds the `image:{id}` key inside Lua from the fresh id, a key not passed
//!   in `KEYS`. Fine on a single node or replica set, Redis Cluster would reject it.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::debug;

use crate::{
    error::StoreError,
    images::{DEFAULT_RATING, Image, NewImage},
    store::{RatingStore, clamp_rating},
};

pub const IMAGE_PREFIX: &str = "image";
pub const IDS_KEY: &str = "images:ids";
pub const RATINGS_KEY: &str = "images:ratings";
pub const LOCATORS_KEY: &str = "images:locators";
pub const NEXT_ID_KEY: &str = "images:next_id";

pub const FIELD_NAME: &str = "name";
pub const FIELD_LOCATOR: &str = "locator";
pub const FIELD_RATING: &str = "rating";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

// KEYS: image a, image b, ratings zset
// ARGV: rating a, rating b, id a, id b, timestamp
const APPLY_UPDATE_SCRIPT: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then return -1 end
    if redis.call('EXISTS', KEYS[2]) == 0 then return -2 end
    redis.call('HSET', KEYS[1], 'rating', ARGV[1], 'updated_at', ARGV[5])
    redis.call('HSET', KEYS[2], 'rating', ARGV[2], 'updated_at', ARGV[5])
    redis.call('ZADD', KEYS[3], ARGV[1], ARGV[3])
    redis.call('ZADD', KEYS[3], ARGV[2], ARGV[4])
    return 1
"#;

// KEYS: locators hash, id counter, ids zset, ratings zset
// ARGV: name, locator, rating, timestamp, image key prefix
const INSERT_SCRIPT: &str = r#"
    if redis.call('HEXISTS', KEYS[1], ARGV[2]) == 1 then return 0 end
    local id = redis.call('INCR', KEYS[2])
    redis.call('HSET', ARGV[5] .. ':' .. id,
        'name', ARGV[1],
        'locator', ARGV[2],
        'rating', ARGV[3],
        'created_at', ARGV[4],
        'updated_at', ARGV[4])
    redis.call('HSET', KEYS[1], ARGV[2], id)
    redis.call('ZADD', KEYS[3], id, id)
    redis.call('ZADD', KEYS[4], ARGV[3], id)
    return id
"#;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}

pub fn image_key(id: u64) -> String {
    format!("{IMAGE_PREFIX}:{id}")
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    apply_update_script: Script,
    insert_script: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            apply_update_script: Script::new(APPLY_UPDATE_SCRIPT),
            insert_script: Script::new(INSERT_SCRIPT),
        }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        Ok(Self::new(init_redis(redis_url).await?))
    }

    async fn load_many(&self, ids: &[u64]) -> Result<Vec<Image>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.hgetall(image_key(*id));
        }

        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut connection).await?;

        let mut images = Vec::with_capacity(ids.len());
        for (id, hash) in ids.iter().zip(hashes) {
            // A missing hash means the image was removed after the range read
            if let Some(image) = image_from_hash(*id, hash)? {
                images.push(image);
            }
        }

        Ok(images)
    }
}

fn field<'a>(
    id: u64,
    hash: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, StoreError> {
    hash.get(name)
        .map(String::as_str)
        .ok_or(StoreError::Corrupt { id, field: name })
}

fn timestamp(id: u64, raw: &str, name: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt { id, field: name })
}

pub(crate) fn image_from_hash(
    id: u64,
    hash: HashMap<String, String>,
) -> Result<Option<Image>, StoreError> {
    if hash.is_empty() {
        return Ok(None);
    }

    let rating = field(id, &hash, FIELD_RATING)?
        .parse::<f64>()
        .map_err(|_| StoreError::Corrupt {
            id,
            field: FIELD_RATING,
        })?;

    Ok(Some(Image {
        id,
        name: field(id, &hash, FIELD_NAME)?.to_string(),
        locator: field(id, &hash, FIELD_LOCATOR)?.to_string(),
        rating,
        created_at: timestamp(id, field(id, &hash, FIELD_CREATED_AT)?, FIELD_CREATED_AT)?,
        updated_at: timestamp(id, field(id, &hash, FIELD_UPDATED_AT)?, FIELD_UPDATED_AT)?,
    }))
}

#[async_trait]
impl RatingStore for RedisStore {
    async fn count(&self) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.zcard(IDS_KEY).await?)
    }

    async fn sample(&self, offset: u64) -> Result<Option<Image>, StoreError> {
        let mut connection = self.connection.clone();

        let rank = offset as isize;
        let ids: Vec<u64> = connection.zrange(IDS_KEY, rank, rank).await?;

        match ids.first() {
            Some(id) => self.get_by_id(*id).await,
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<Image>, StoreError> {
        let mut connection = self.connection.clone();

        let hash: HashMap<String, String> = connection.hgetall(image_key(id)).await?;

        image_from_hash(id, hash)
    }

    async fn apply_update(
        &self,
        id_a: u64,
        rating_a: f64,
        id_b: u64,
        rating_b: f64,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let result: i64 = self
            .apply_update_script
            .key(image_key(id_a))
            .key(image_key(id_b))
            .key(RATINGS_KEY)
            .arg(clamp_rating(rating_a))
            .arg(clamp_rating(rating_b))
            .arg(id_a)
            .arg(id_b)
            .arg(Utc::now().to_rfc3339())
            .invoke_async(&mut connection)
            .await?;

        match result {
            -1 => Err(StoreError::NotFound(id_a)),
            -2 => Err(StoreError::NotFound(id_b)),
            _ => Ok(()),
        }
    }

    async fn insert(&self, image: NewImage) -> Result<Option<u64>, StoreError> {
        let mut connection = self.connection.clone();

        let id: u64 = self
            .insert_script
            .key(LOCATORS_KEY)
            .key(NEXT_ID_KEY)
            .key(IDS_KEY)
            .key(RATINGS_KEY)
            .arg(&image.name)
            .arg(&image.locator)
            .arg(DEFAULT_RATING)
            .arg(Utc::now().to_rfc3339())
            .arg(IMAGE_PREFIX)
            .invoke_async(&mut connection)
            .await?;

        if id == 0 {
            debug!("Skipping duplicate locator {}", image.locator);
            return Ok(None);
        }

        Ok(Some(id))
    }

    async fn top(&self, limit: usize) -> Result<Vec<Image>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let ids: Vec<u64> = connection
            .zrevrange(RATINGS_KEY, 0, limit as isize - 1)
            .await?;

        self.load_many(&ids).await
    }

    async fn bottom(&self, limit: usize) -> Result<Vec<Image>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = self.connection.clone();
        let ids: Vec<u64> = connection
            .zrange(RATINGS_KEY, 0, limit as isize - 1)
            .await?;

        self.load_many(&ids).await
    }
}
