use std::{sync::Arc, time::SystemTime};

use async_stream::try_stream;
use futures::{Stream, StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchGameDocument, FindRequest, FindResponse, category_index_definition, game_doc_id},
};

const DATABASE_ROOT: &str = "";
const FIND: &str = "_find";
const INDEX: &str = "_index";
const PAGE_SIZE: usize = 50;

/// Game store backed by one CouchDB database, one document per game.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    database_url: Arc<str>,
    credentials: Option<Arc<(String, String)>>,
}

impl CouchGameStore {
    /// Open the database named in `config`, creating it and the listing index when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::Client { source })?;
        let database_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.database
        );

        let store = Self {
            client,
            database_url: database_url.into(),
            credentials: config.credentials.map(Arc::new),
        };
        store.ensure_database().await?;
        store.ensure_index().await?;
        Ok(store)
    }

    fn builder(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.is_empty() {
            self.database_url.to_string()
        } else {
            format!("{}/{path}", self.database_url)
        };
        let builder = self.client.request(method, url);
        match self.credentials.as_deref() {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn call(&self, method: Method, path: &str) -> CouchResult<Response> {
        self.dispatch(self.builder(method.clone(), path), method, path)
            .await
    }

    async fn call_json<B>(&self, method: Method, path: &str, body: &B) -> CouchResult<Response>
    where
        B: ?Sized + Serialize,
    {
        self.dispatch(self.builder(method.clone(), path).json(body), method, path)
            .await
    }

    async fn dispatch(
        &self,
        builder: RequestBuilder,
        method: Method,
        path: &str,
    ) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                method,
                path: path.to_owned(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let response = self.call(Method::GET, DATABASE_ROOT).await?;
        if response.status() != StatusCode::NOT_FOUND {
            return success(response, Method::GET, DATABASE_ROOT).map(drop);
        }

        let created = self.call(Method::PUT, DATABASE_ROOT).await?;
        // 412: another instance created it first.
        if created.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(());
        }
        success(created, Method::PUT, DATABASE_ROOT).map(drop)
    }

    async fn ensure_index(&self) -> CouchResult<()> {
        let response = self
            .call_json(Method::POST, INDEX, &category_index_definition())
            .await?;
        success(response, Method::POST, INDEX).map(drop)
    }

    async fn fetch<T: DeserializeOwned>(&self, doc_id: &str) -> CouchResult<Option<T>> {
        let response = self.call(Method::GET, doc_id).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = success(response, Method::GET, doc_id)?;
        decode(response, doc_id).await.map(Some)
    }

    async fn store_document(&self, doc_id: &str, doc: &CouchGameDocument) -> CouchResult<()> {
        let response = self.call_json(Method::PUT, doc_id, doc).await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(CouchDaoError::RevisionConflict {
                path: doc_id.to_owned(),
            });
        }
        success(response, Method::PUT, doc_id).map(drop)
    }

    async fn find_page(&self, request: &FindRequest) -> CouchResult<FindResponse> {
        let response = self.call_json(Method::POST, FIND, request).await?;
        let response = success(response, Method::POST, FIND)?;
        decode(response, FIND).await
    }

    async fn insert(&self, game: GameEntity) -> StorageResult<()> {
        let id = game.id;
        let doc_id = game_doc_id(id);
        let doc = CouchGameDocument::from((game, None));

        match self.store_document(&doc_id, &doc).await {
            Err(CouchDaoError::RevisionConflict { .. }) => Err(StorageError::AlreadyExists { id }),
            other => other.map_err(Into::into),
        }
    }

    async fn replace(&self, mut game: GameEntity, expected: u64) -> StorageResult<GameEntity> {
        let id = game.id;
        let doc_id = game_doc_id(id);

        let current = self
            .fetch::<CouchGameDocument>(&doc_id)
            .await?
            .ok_or(StorageError::NotFound { id })?;
        if current.game.version != expected {
            return Err(StorageError::VersionConflict { id, expected });
        }

        // Writing with the `_rev` read alongside the matching version makes the PUT conditional.
        game.version = expected + 1;
        let doc = CouchGameDocument::from((game.clone(), current.rev));
        match self.store_document(&doc_id, &doc).await {
            Ok(()) => Ok(game),
            Err(CouchDaoError::RevisionConflict { .. }) => {
                debug!(game_id = %id, expected, "revision moved between read and write");
                Err(StorageError::VersionConflict { id, expected })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn category_stream(
        self,
        category: String,
        since: SystemTime,
    ) -> impl Stream<Item = StorageResult<GameEntity>> + Send + 'static {
        try_stream! {
            let mut bookmark = None;
            loop {
                let request = FindRequest::category_page(&category, since, PAGE_SIZE, bookmark.take());
                let page = self.find_page(&request).await?;
                let full_page = page.docs.len() == PAGE_SIZE;

                for value in page.docs {
                    let doc = serde_json::from_value::<CouchGameDocument>(value)
                        .map_err(|source| CouchDaoError::Document {
                            path: FIND.to_owned(),
                            source,
                        })?;
                    yield doc.game;
                }

                bookmark = page.bookmark;
                if !full_page || bookmark.is_none() {
                    break;
                }
            }
        }
    }
}

fn success(response: Response, method: Method, path: &str) -> CouchResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CouchDaoError::Status {
            method,
            path: path.to_owned(),
            status,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> CouchResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|source| CouchDaoError::Decode {
            path: path.to_owned(),
            source,
        })
}

impl GameStore for CouchGameStore {
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.fetch::<CouchGameDocument>(&game_doc_id(id)).await?;
            Ok(doc.map(|doc| doc.game))
        })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert(game).await })
    }

    fn update_game(
        &self,
        game: GameEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move { store.replace(game, expected_version).await })
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
        Box::pin(async move {
            let response = store.call(Method::GET, DATABASE_ROOT).await?;
            success(response, Method::GET, DATABASE_ROOT)?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_database().await?;
            store.ensure_index().await?;
            Ok(())
        })
    }
}
