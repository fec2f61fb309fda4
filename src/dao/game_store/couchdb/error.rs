//! Error types shared by the CouchDB storage implementation.

use reqwest::{Method, StatusCode};
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while talking to CouchDB over HTTP.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    /// The request never got an HTTP answer.
    #[error("CouchDB request `{method} {path}` failed")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} to `{method} {path}`")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
    },
    /// 409: stale or missing `_rev` for an existing document.
    #[error("CouchDB revision conflict on `{path}`")]
    RevisionConflict { path: String },
    #[error("CouchDB response body for `{path}` is not valid JSON")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("document returned by `{path}` is not a game")]
    Document {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
