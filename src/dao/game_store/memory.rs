//! Process-local game store backed by a concurrent map.
//!
//! Used when no database is configured and by tests. Conditional updates are compared and
//! swapped while holding the map shard lock for the game, so concurrent writers on the same id
//! observe the same version checks a database would enforce.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<Uuid, GameEntity>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, game: GameEntity) -> StorageResult<()> {
        match self.games.entry(game.id) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists { id: game.id }),
            Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(())
            }
        }
    }

    fn compare_and_swap(&self, mut game: GameEntity, expected: u64) -> StorageResult<GameEntity> {
        let id = game.id;
        let Some(mut stored) = self.games.get_mut(&id) else {
            return Err(StorageError::NotFound { id });
        };

        if stored.version != expected {
            return Err(StorageError::VersionConflict { id, expected });
        }

        game.version = expected + 1;
        *stored = game.clone();
        Ok(game)
    }

    fn by_category(&self, category: &str, since: SystemTime) -> Vec<GameEntity> {
        let mut games = self
            .games
            .iter()
            .filter(|entry| entry.category == category && entry.start_time >= since)
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        games.sort_by_key(|game| game.start_time);
        games
    }
}

impl GameStore for MemoryGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let found = self.games.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(game) })
    }

    fn update_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move { store.compare_and_swap(game, expected_version) })
    }

    fn games_by_category(
        &self,
        category: String,
        since: SystemTime,
    ) -> BoxStream<'static, StorageResult<GameEntity>> {
        let games = self.by_category(&category, since);
        stream::iter(games.into_iter().map(Ok)).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::TryStreamExt;

    use super::*;
    use crate::dao::models::INITIAL_VERSION;

    fn game(category: &str, starts_in_secs: u64) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            owner: "owner@example.com".into(),
            start_time: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + starts_in_secs),
            category: category.into(),
            duration_mins: 90,
            location: "Court 3".into(),
            name: "Evening run".into(),
            num_teams: 2,
            team_size: 2,
            sign_up_fee_cents: 0,
            split_fee_cents: 0,
            roster: Vec::new(),
            waitlist: Vec::new(),
            version: INITIAL_VERSION,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let store = MemoryGameStore::new();
        let game = game("soccer", 0);

        store.create_game(game.clone()).await.unwrap();
        let err = store.create_game(game.clone()).await.unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists { id } if id == game.id));
    }

    #[tokio::test]
    async fn update_bumps_version_when_expected_matches() {
        let store = MemoryGameStore::new();
        let mut game = game("soccer", 0);
        store.create_game(game.clone()).await.unwrap();

        game.roster.push("alice".into());
        let stored = store.update_game(game.clone(), INITIAL_VERSION).await.unwrap();

        assert_eq!(stored.version, INITIAL_VERSION + 1);
        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(reloaded.roster, vec!["alice".to_string()]);
        assert_eq!(reloaded.version, INITIAL_VERSION + 1);
    }

    #[tokio::test]
    async fn stale_update_is_rejected_and_leaves_record_untouched() {
        let store = MemoryGameStore::new();
        let game = game("soccer", 0);
        store.create_game(game.clone()).await.unwrap();

        let mut first = game.clone();
        first.roster.push("alice".into());
        store.update_game(first, INITIAL_VERSION).await.unwrap();

        let mut second = game.clone();
        second.roster.push("bob".into());
        let err = store.update_game(second, INITIAL_VERSION).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict { expected, .. } if expected == INITIAL_VERSION
        ));

        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(reloaded.roster, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn update_of_unknown_game_reports_not_found() {
        let store = MemoryGameStore::new();
        let err = store
            .update_game(game("soccer", 0), INITIAL_VERSION)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn category_listing_filters_and_orders_by_start_time() {
        let store = MemoryGameStore::new();
        let late = game("volleyball", 300);
        let early = game("volleyball", 100);
        let too_old = game("volleyball", 0);
        let other = game("soccer", 200);
        for g in [&late, &early, &too_old, &other] {
            store.create_game(g.clone()).await.unwrap();
        }

        let since = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_050);
        let listed: Vec<GameEntity> = store
            .games_by_category("volleyball".into(), since)
            .try_collect()
            .await
            .unwrap();

        let ids = listed.iter().map(|g| g.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
