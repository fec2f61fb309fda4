use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::GameEntity;

/// Shape of a game inside the `games` collection.
///
/// The id is kept as its hyphenated string so filters stay readable from the shell, and the
/// start time uses a native BSON date so the `(category, start_time)` index can range-scan it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    owner: String,
    start_time: DateTime,
    category: String,
    duration_mins: u32,
    location: String,
    name: String,
    num_teams: u32,
    team_size: u32,
    sign_up_fee_cents: u32,
    split_fee_cents: u32,
    #[serde(default)]
    roster: Vec<String>,
    #[serde(default)]
    waitlist: Vec<String>,
    version: i64,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            owner: value.owner,
            start_time: DateTime::from_system_time(value.start_time),
            category: value.category,
            duration_mins: value.duration_mins,
            location: value.location,
            name: value.name,
            num_teams: value.num_teams,
            team_size: value.team_size,
            sign_up_fee_cents: value.sign_up_fee_cents,
            split_fee_cents: value.split_fee_cents,
            roster: value.roster,
            waitlist: value.waitlist,
            version: version_to_bson(value.version),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::InvalidDocId {
            id: value.id.clone(),
            source,
        })?;

        Ok(Self {
            id,
            owner: value.owner,
            start_time: value.start_time.to_system_time(),
            category: value.category,
            duration_mins: value.duration_mins,
            location: value.location,
            name: value.name,
            num_teams: value.num_teams,
            team_size: value.team_size,
            sign_up_fee_cents: value.sign_up_fee_cents,
            split_fee_cents: value.split_fee_cents,
            roster: value.roster,
            waitlist: value.waitlist,
            version: value.version.max(0) as u64,
        })
    }
}

/// BSON has no unsigned 64-bit integer; versions never get anywhere near `i64::MAX`.
pub fn version_to_bson(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the game only while it still carries `version`.
pub fn versioned_doc_id(id: Uuid, version: u64) -> Document {
    doc! {"_id": id.to_string(), "version": version_to_bson(version)}
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::INITIAL_VERSION;

    fn game() -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            owner: "owner".into(),
            start_time: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            category: "hockey".into(),
            duration_mins: 60,
            location: "Rink".into(),
            name: "Late skate".into(),
            num_teams: 2,
            team_size: 6,
            sign_up_fee_cents: 1500,
            split_fee_cents: 0,
            roster: vec!["a".into()],
            waitlist: vec!["b".into()],
            version: INITIAL_VERSION + 4,
        }
    }

    #[test]
    fn document_keeps_string_id_and_version() {
        let entity = game();
        let document = MongoGameDocument::from(entity.clone());
        assert_eq!(document.id, entity.id.to_string());
        assert_eq!(document.version, 5);

        let back = GameEntity::try_from(document).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn malformed_id_is_reported() {
        let mut document = MongoGameDocument::from(game());
        document.id = "not-a-uuid".into();
        assert!(matches!(
            GameEntity::try_from(document),
            Err(MongoDaoError::InvalidDocId { .. })
        ));
    }

    #[test]
    fn versioned_filter_matches_id_and_version() {
        let id = Uuid::nil();
        let filter = versioned_doc_id(id, 7);
        assert_eq!(filter.get_str("_id").unwrap(), id.to_string());
        assert_eq!(filter.get_i64("version").unwrap(), 7);
    }
}
