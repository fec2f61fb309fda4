#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use crate::dao::models::GameEntity;
use crate::dao::storage::StorageResult;
use futures::{future::BoxFuture, stream::BoxStream};
use uuid::Uuid;

/// Abstraction over the persistence layer for sign-up games.
///
/// Backends only provide whole-record reads and writes; roster changes are made safe by
/// [`GameStore::update_game`], which must reject the write when the stored version no longer
/// matches the one the caller read.
pub trait GameStore: Send + Sync {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Insert a new game, failing with `AlreadyExists` when the id is taken.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the stored game if its version still equals `expected_version`.
    ///
    /// On success the stored record carries `expected_version + 1` and is returned.
    fn update_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Games of a category starting at or after `since`, ordered by start time.
    fn games_by_category(
        &self,
        category: String,
        since: SystemTime,
    ) -> BoxStream<'static, StorageResult<GameEntity>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
