pub mod repository;
pub mod storage;

use sha2::{Digest, Sha256};

pub use repository::Repository;
pub use storage::LocalFileStorage;

/// Hex SHA-256 of `input`, used for index keys.
pub fn compute_hash(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
