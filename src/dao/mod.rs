/// Game store trait and its memory, MongoDB and CouchDB backends.
pub mod game_store;
/// Persisted game model.
pub mod models;
/// Backend-independent storage errors.
pub mod storage;
