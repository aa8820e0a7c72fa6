use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

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
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save room `{key}`")]
    SaveRoom {
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{key}`")]
    LoadRoom {
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{username}`")]
    SavePlayer {
        username: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{username}`")]
    LoadPlayer {
        username: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list players")]
    ListPlayers {
        #[source]
        source: MongoError,
    },
}
