use redis::RedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Image {0} not found")]
    NotFound(u64),

    #[error("Image {id} has a corrupt {field} field")]
    Corrupt { id: u64, field: &'static str },

    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
}
