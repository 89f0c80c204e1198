use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    bucketer::{bucketing_key, Bucketer, Murmur3Bucketer},
    project::{Experiment, Project, Variation},
    Str,
};

/// The outcome of bucketing a user into a specific variation.
///
/// Holds the variation the user was bucketed into, the user id, and the time of the bucketing
/// call. An `Impression` can later be turned into events for reporting with
/// [`EventsBuilder`](crate::EventsBuilder).
#[derive(Debug, Clone)]
pub struct Impression {
    experiment: Arc<Experiment>,
    variation: Variation,
    user_id: Str,
    timestamp: DateTime<Utc>,
}

impl Impression {
    pub fn variation(&self) -> &Variation {
        &self.variation
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Account of the project that produced this impression.
    pub fn account_id(&self) -> &str {
        self.experiment.account_id()
    }
}

impl Project {
    /// Bucket `user_id` into the experiment with the given key.
    ///
    /// Returns `None` if there is no such experiment, the experiment is not running, or the user
    /// falls outside of the experiment's traffic allocation.
    ///
    /// ```
    /// # use optimizely::Project;
    /// let project = Project::from_datafile(r#"{"version": "4"}"#).unwrap();
    /// assert!(project.get_variation("missing", "user").is_none());
    /// ```
    pub fn get_variation(&self, experiment_key: &str, user_id: &str) -> Option<Impression> {
        self.experiment(experiment_key)?.get_variation(user_id)
    }
}

impl Experiment {
    /// Bucket `user_id` into this experiment.
    ///
    /// Resolution order: a stopped experiment never assigns; forced variations win next; then a
    /// previously computed assignment; finally the user is hashed into the traffic allocation and
    /// the result is cached. Each call returns a fresh `Impression` stamped with the current time.
    pub fn get_variation(self: &Arc<Self>, user_id: &str) -> Option<Impression> {
        self.get_variation_with(user_id, &Murmur3Bucketer)
    }

    /// Bucket value of `user_id` in this experiment, in `[0, MAX_TRAFFIC_VALUE]`.
    pub fn bucket_value(&self, user_id: &str) -> u32 {
        Murmur3Bucketer.bucket_value(&bucketing_key(user_id, &self.id))
    }

    pub(crate) fn get_variation_with(
        self: &Arc<Self>,
        user_id: &str,
        bucketer: &impl Bucketer,
    ) -> Option<Impression> {
        if !self.is_running() {
            log::debug!(target: "optimizely",
                        experiment_key = self.key,
                        status = self.status;
                        "experiment is not running");
            return None;
        }

        let timestamp = Utc::now();
        let variation = self.resolve_variation(user_id, bucketer)?;

        Some(Impression {
            experiment: Arc::clone(self),
            variation: self.variations[variation].clone(),
            user_id: user_id.into(),
            timestamp,
        })
    }

    /// Return the index of the variation for `user_id`.
    fn resolve_variation(&self, user_id: &str, bucketer: &impl Bucketer) -> Option<usize> {
        if let Some(&forced) = self.forced_variations.get(user_id) {
            return Some(forced);
        }

        if let Some(cached) = self.cache.get(user_id) {
            log::trace!(target: "optimizely",
                        experiment_key = self.key,
                        user_id;
                        "using cached variation");
            return Some(cached);
        }

        // Hashing happens outside of the cache lock. Concurrent first calls for the same user
        // compute the same variation.
        let bucket_value = bucketer.bucket_value(&bucketing_key(user_id, &self.id));
        let Some(variation) = self.traffic_partition.find(bucket_value) else {
            log::debug!(target: "optimizely",
                        experiment_key = self.key,
                        user_id,
                        bucket_value;
                        "user is outside of traffic allocation");
            return None;
        };

        log::debug!(target: "optimizely",
                    experiment_key = self.key,
                    user_id,
                    bucket_value,
                    variation_key = self.variations[variation].key();
                    "bucketed user into variation");
        self.cache.insert(user_id.into(), variation);
        Some(variation)
    }
}
