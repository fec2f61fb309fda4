use std::{sync::Arc, time::SystemTime};

use async_stream::try_stream;
use futures::{
    Stream, StreamExt, TryStreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, doc_id, versioned_doc_id},
};
use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{StorageError, StorageResult},
};

const GAMES_COLLECTION: &str = "games";
const CATEGORY_INDEX_NAME: &str = "game_category_start_idx";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<SharedConnection>,
}

struct SharedConnection {
    state: RwLock<ConnectionHandles>,
    config: MongoConfig,
}

struct ConnectionHandles {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl SharedConnection {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(SharedConnection {
            state: RwLock::new(ConnectionHandles { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.games().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"category": 1, "start_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some(CATEGORY_INDEX_NAME.to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAMES_COLLECTION,
                index: "category,start_time",
                source,
            })?;

        Ok(())
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAMES_COLLECTION)
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let collection = self.games().await;

        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::GameOperation {
                operation: "load",
                id,
                source,
            })?;

        document.map(GameEntity::try_from).transpose()
    }

    async fn create_game(&self, game: GameEntity) -> StorageResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let collection = self.games().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(source) if is_duplicate_key(&source) => Err(StorageError::AlreadyExists { id }),
            Err(source) => Err(MongoDaoError::GameOperation {
                operation: "insert",
                id,
                source,
            }
            .into()),
        }
    }

    async fn update_game(&self, mut game: GameEntity, expected: u64) -> StorageResult<GameEntity> {
        let id = game.id;
        game.version = expected + 1;
        let document: MongoGameDocument = game.clone().into();
        let collection = self.games().await;

        let result = collection
            .replace_one(versioned_doc_id(id, expected), &document)
            .await
            .map_err(|source| MongoDaoError::GameOperation {
                operation: "replace",
                id,
                source,
            })?;

        if result.matched_count == 1 {
            return Ok(game);
        }

        // Nothing matched: either the game is gone or another writer bumped the version.
        debug!(game_id = %id, expected, "conditional replace matched no document");
        match self.find_game(id).await? {
            Some(_) => Err(StorageError::VersionConflict { id, expected }),
            None => Err(StorageError::NotFound { id }),
        }
    }

    fn category_stream(
        self,
        category: String,
        since: SystemTime,
    ) -> impl Stream<Item = StorageResult<GameEntity>> + Send + 'static {
        try_stream! {
            let collection = self.games().await;
            let filter = doc! {
                "category": category.as_str(),
                "start_time": { "$gte": DateTime::from_system_time(since) },
            };
            let mut cursor = collection
                .find(filter)
                .sort(doc! {"start_time": 1})
                .await
                .map_err(|source| MongoDaoError::ListGames {
                    category: category.clone(),
                    source,
                })?;

            while let Some(document) = cursor
                .try_next()
                .await
                .map_err(|source| MongoDaoError::ListGames {
                    category: category.clone(),
                    source,
                })?
            {
                yield GameEntity::try_from(document)?;
            }
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl GameStore for MongoGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_game(game).await })
    }

    fn update_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_game(game, expected_version).await })
    }

    fn games_by_category(
        &self,
        category: String,
        since: SystemTime,
    ) -> BoxStream<'static, StorageResult<GameEntity>> {
        self.clone().category_stream(category, since).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
