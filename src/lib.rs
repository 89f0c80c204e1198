//! Deterministic experiment bucketing for Optimizely datafiles.
//!
//! # Overview
//!
//! A [`Project`] is compiled once from a datafile and is immutable afterwards. Each
//! [`Experiment`] in it splits users between its [`Variation`]s by hashing the user id with
//! MurmurHash3, the same way every other Optimizely SDK does, so a user lands in the same
//! variation no matter which SDK buckets them.
//!
//! Bucketing a user with [`Project::get_variation`] yields an [`Impression`]. Forced variations
//! from the datafile take precedence over hashing, and computed assignments are cached per
//! experiment so that they stay sticky for the lifetime of the project.
//!
//! Impressions are turned into an [`EventBatch`] for the Optimizely events API and sent with an
//! [`EventReporter`] such as [`HttpReporter`]. An [`AssignmentSession`] collects the
//! impressions of one user over a unit of work (e.g., a single request) and drains them into one
//! batch.
//!
//! ```
//! # use std::sync::Arc;
//! # use optimizely::{EventsConfig, Project};
//! let datafile = r#"{
//!   "version": "4",
//!   "accountId": "12345",
//!   "experiments": [{
//!     "id": "5678",
//!     "key": "checkout_button",
//!     "layerId": "layer",
//!     "status": "Running",
//!     "variations": [{"id": "1", "key": "blue"}, {"id": "2", "key": "green"}],
//!     "trafficAllocation": [
//!       {"entityId": "1", "endOfRange": 5000},
//!       {"entityId": "2", "endOfRange": 10000}
//!     ]
//!   }]
//! }"#;
//! let project = Arc::new(Project::from_datafile(datafile).unwrap());
//!
//! let session = project.session("user-1");
//! let variation = session.get_variation("checkout_button").unwrap();
//! assert!(variation.key() == "blue" || variation.key() == "green");
//!
//! let batch = session.drain(&EventsConfig::new()).unwrap();
//! assert_eq!(batch.account_id(), "12345");
//! ```
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Building a project fails as a whole: a datafile
//! that cannot be compiled never yields a partially usable project. Users that fall outside of an
//! experiment's traffic allocation, unknown experiments, and stopped experiments are not errors;
//! bucketing simply returns `None`.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with the `optimizely` target.
//! Consider integrating a `log`-compatible logger implementation for better visibility into
//! bucketing decisions.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod events;

mod assignment_cache;
mod bucketer;
mod bucketing;
mod config;
mod datafile;
mod error;
mod partition;
mod project;
mod reporter;
mod session;
mod str;

pub use crate::str::Str;
pub use bucketer::{Bucketer, Murmur3Bucketer, MAX_TRAFFIC_VALUE};
pub use bucketing::Impression;
pub use config::EventsConfig;
pub use error::{Error, Result};
pub use events::EventBatch;
pub use project::{Experiment, Project, Variation, RUNNING_STATUS, SUPPORTED_DATAFILE_VERSION};
pub use reporter::{EventReporter, HttpReporter, DEFAULT_EVENTS_ENDPOINT};
pub use session::AssignmentSession;
