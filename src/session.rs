use std::sync::{Arc, Mutex};

use crate::{
    project::{Project, Variation},
    reporter::EventReporter,
    EventBatch, EventsConfig, Impression, Result, Str,
};

/// Collects the impressions of a single user over a unit of work (e.g., one request) so that they
/// can be reported together.
///
/// Bucketing through the session records every impression. At the end of the scope, call
/// [`AssignmentSession::drain`] to turn everything recorded so far into a single [`EventBatch`].
/// Draining clears the session, so it can be reused for the next scope.
///
/// ```
/// # use std::sync::Arc;
/// # use optimizely::{EventsConfig, Project};
/// let project = Arc::new(Project::from_datafile(r#"{"version": "4"}"#).unwrap());
/// let session = project.session("user");
///
/// assert!(session.get_variation("unknown_experiment").is_none());
/// assert!(session.drain(&EventsConfig::new()).is_none());
/// ```
#[derive(Debug)]
pub struct AssignmentSession {
    project: Arc<Project>,
    user_id: Str,
    impressions: Mutex<Vec<Impression>>,
}

impl Project {
    /// Start an [`AssignmentSession`] for `user_id`.
    pub fn session(self: &Arc<Self>, user_id: impl Into<Str>) -> AssignmentSession {
        AssignmentSession::new(Arc::clone(self), user_id)
    }
}

impl AssignmentSession {
    pub fn new(project: Arc<Project>, user_id: impl Into<Str>) -> AssignmentSession {
        AssignmentSession {
            project,
            user_id: user_id.into(),
            impressions: Mutex::new(Vec::new()),
        }
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Bucket the session's user into the experiment with the given key and record the
    /// impression.
    pub fn get_impression(&self, experiment_key: &str) -> Option<Impression> {
        let impression = self.project.get_variation(experiment_key, &self.user_id)?;
        self.lock().push(impression.clone());
        Some(impression)
    }

    /// Like [`AssignmentSession::get_impression`] but only returns the variation.
    pub fn get_variation(&self, experiment_key: &str) -> Option<Variation> {
        self.get_impression(experiment_key)
            .map(|impression| impression.variation().clone())
    }

    /// Number of impressions recorded since the last drain.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every recorded impression and build one [`EventBatch`] out of them.
    ///
    /// Returns `None` if nothing was recorded.
    pub fn drain(&self, config: &EventsConfig) -> Option<EventBatch> {
        self.drain_with(config, [])
    }

    /// Like [`AssignmentSession::drain`], adding `extra` impressions to the batch.
    ///
    /// Returns `None` if the session itself recorded nothing, regardless of `extra`.
    ///
    /// # Panics
    ///
    /// Panics if an impression in `extra` comes from a different account than the session's
    /// project. Every recorded impression shares the project's account, so this is always a
    /// misuse of the session.
    pub fn drain_with(
        &self,
        config: &EventsConfig,
        extra: impl IntoIterator<Item = Impression>,
    ) -> Option<EventBatch> {
        let mut impressions = std::mem::take(&mut *self.lock());
        if impressions.is_empty() {
            return None;
        }
        impressions.extend(extra);

        log::debug!(target: "optimizely",
                    user_id = self.user_id,
                    impressions = impressions.len();
                    "draining assignment session");

        match EventBatch::new(config, &impressions) {
            Ok(batch) => Some(batch),
            Err(err) => panic!(
                "assignment session for account {} drained impressions it could not batch: {err}",
                self.project.account_id()
            ),
        }
    }

    /// Drain the session and send the batch, if any, through `reporter`.
    pub fn report(&self, config: &EventsConfig, reporter: &impl EventReporter) -> Result<()> {
        match self.drain(config) {
            Some(batch) => reporter.report(&batch),
            None => Ok(()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Impression>> {
        self.impressions
            .lock()
            .expect("thread holding session lock should not panic")
    }
}
