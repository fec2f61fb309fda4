use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::dao::models::GameEntity;

pub const GAME_PREFIX: &str = "game::";
pub const CATEGORY_INDEX_NAME: &str = "game-category-start";

/// Game document as stored in CouchDB.
///
/// `_rev` is CouchDB's own revision; the entity keeps its `version` so every backend exposes
/// the same concurrency token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(game.id),
            rev,
            game,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FindRequest {
    pub selector: Value,
    pub sort: Value,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
    pub use_index: &'static str,
}

impl FindRequest {
    /// Mango query for one page of a category, oldest start first.
    pub fn category_page(
        category: &str,
        since: SystemTime,
        limit: usize,
        bookmark: Option<String>,
    ) -> Self {
        let since_secs = since
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            selector: json!({
                "category": category,
                "start_time": { "$gte": since_secs },
            }),
            sort: json!([{ "category": "asc" }, { "start_time": "asc" }]),
            limit,
            bookmark,
            use_index: CATEGORY_INDEX_NAME,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<Value>,
    #[serde(default)]
    pub bookmark: Option<String>,
}

/// Body of the `_index` call that backs category listings.
///
/// The design document is named explicitly so `use_index` can refer to it.
pub fn category_index_definition() -> Value {
    json!({
        "index": { "fields": ["category", "start_time"] },
        "ddoc": CATEGORY_INDEX_NAME,
        "name": CATEGORY_INDEX_NAME,
        "type": "json",
    })
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{}{}", GAME_PREFIX, id)
}
