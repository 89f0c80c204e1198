use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Misusing an [`AssignmentSession`](crate::AssignmentSession) is not represented here: it is a
/// programming error and panics instead.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The datafile is not valid JSON or does not have the expected shape.
    #[error("error parsing datafile")]
    DatafileParse(#[source] Arc<serde_json::Error>),

    /// The datafile declares a schema version this crate cannot read.
    #[error("could not create project from unsupported datafile version {version:?}")]
    UnsupportedDatafileVersion { version: String },

    /// A traffic allocation entry points at a variation the experiment does not declare.
    #[error("unknown variation ID {variation_id} found in traffic allocation")]
    UnknownTrafficAllocationVariation { variation_id: String },

    /// Attempted to build an event batch without any impressions.
    #[error("cannot build events with no activated variations")]
    NoImpressions,

    /// Impressions added to a single batch came from different accounts.
    #[error("activated variations must all be in the same account (expected {expected}, found {found})")]
    MixedAccounts { expected: String, found: String },

    /// Events could not be encoded as JSON.
    #[error("error serializing events to JSON")]
    Serialization(#[source] Arc<serde_json::Error>),

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// The server answered with a status code the caller did not expect.
    #[error("unexpected status code ({status}) received from Optimizely API")]
    UnexpectedStatus { status: u16 },

    /// No project with the given name is visible to the API token.
    #[error("could not find project with name {name}")]
    ProjectNotFound { name: String },

    /// The project has no environment with the given key or name.
    #[error("could not find environment {key} for project {project}")]
    EnvironmentNotFound { key: String, project: String },
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}
