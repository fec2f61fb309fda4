use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors raised by the MongoDB game store before they are folded into `StorageError`.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB stopped answering pings")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("could not create index `{index}` on `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// A read or write on a single game document failed.
    #[error("MongoDB {operation} of game `{id}` failed")]
    GameOperation {
        operation: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB listing for category `{category}` failed")]
    ListGames {
        category: String,
        #[source]
        source: MongoError,
    },
    #[error("`{id}` is not a game id")]
    InvalidDocId {
        id: String,
        #[source]
        source: uuid::Error,
    },
}
