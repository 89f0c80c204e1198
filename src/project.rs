//! Compiled, immutable view of an Optimizely datafile.
use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

use crate::{
    assignment_cache::AssignmentCache,
    datafile::{DatafileWire, ExperimentWire},
    partition::TrafficPartition,
    Error, Result, Str,
};

/// Only version 4 of the datafile is supported.
pub const SUPPORTED_DATAFILE_VERSION: &str = "4";

/// Status of an experiment that is serving traffic.
pub const RUNNING_STATUS: &str = "Running";

/// An Optimizely project: a set of experiments compiled from a datafile.
///
/// A `Project` never changes after it is built. The only mutable state it owns is each
/// experiment's assignment cache.
#[derive(Debug)]
pub struct Project {
    version: String,
    revision: Str,
    project_id: Str,
    account_id: Str,
    experiments: HashMap<Str, Arc<Experiment>>,
    /// Original JSON the project was compiled from.
    raw_datafile: Vec<u8>,
}

/// A single experiment with its traffic allocation, forced variations, and assignment cache.
#[derive(Debug)]
pub struct Experiment {
    pub(crate) id: Str,
    pub(crate) key: Str,
    pub(crate) layer_id: Str,
    pub(crate) status: Str,
    /// Account of the owning project. Needed to group impressions into event batches.
    pub(crate) account_id: Str,
    pub(crate) variations: Box<[Variation]>,
    pub(crate) traffic_partition: TrafficPartition,
    /// User id to index into `variations`.
    pub(crate) forced_variations: HashMap<Str, usize>,
    pub(crate) cache: AssignmentCache,
}

/// A variation of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Variation {
    id: Str,
    key: Str,
}

impl Variation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Project {
    /// Build a project from the raw JSON datafile.
    ///
    /// Fails if the JSON is malformed, the datafile version is not
    /// [`SUPPORTED_DATAFILE_VERSION`], or a traffic allocation references an unknown variation.
    /// Forced variations naming an unknown variation key are dropped.
    ///
    /// ```
    /// # use optimizely::Project;
    /// let project = Project::from_datafile(r#"{"version": "4", "accountId": "1"}"#).unwrap();
    /// assert_eq!(project.account_id(), "1");
    /// ```
    pub fn from_datafile(datafile: impl Into<Vec<u8>>) -> Result<Project> {
        let raw_datafile = datafile.into();
        let datafile: DatafileWire = serde_json::from_slice(&raw_datafile).map_err(|err| {
            log::warn!(target: "optimizely", "failed to parse datafile: {err:?}");
            Error::DatafileParse(Arc::new(err))
        })?;

        if datafile.version != SUPPORTED_DATAFILE_VERSION {
            log::warn!(target: "optimizely",
                       version:display = datafile.version;
                       "unsupported datafile version");
            return Err(Error::UnsupportedDatafileVersion {
                version: datafile.version,
            });
        }

        let mut experiments = HashMap::with_capacity(datafile.experiments.len());
        for experiment in datafile.experiments {
            let experiment = compile_experiment(&datafile.account_id, experiment)?;
            // Later experiments replace earlier ones with the same key.
            experiments.insert(experiment.key.clone(), Arc::new(experiment));
        }

        log::debug!(target: "optimizely",
                    revision = datafile.revision,
                    project_id = datafile.project_id,
                    experiments = experiments.len();
                    "compiled project from datafile");

        Ok(Project {
            version: datafile.version,
            revision: datafile.revision,
            project_id: datafile.project_id,
            account_id: datafile.account_id,
            experiments,
            raw_datafile,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Datafile bytes this project was built from.
    pub fn raw_datafile(&self) -> &[u8] {
        &self.raw_datafile
    }

    /// Look up an experiment by key.
    pub fn experiment(&self, key: &str) -> Option<&Arc<Experiment>> {
        self.experiments.get(key)
    }

    pub fn experiment_keys(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(|key| &**key)
    }
}

fn compile_experiment(account_id: &Str, experiment: ExperimentWire) -> Result<Experiment> {
    let variations: Box<[Variation]> = experiment
        .variations
        .into_iter()
        .map(|v| Variation { id: v.id, key: v.key })
        .collect();

    let index_by_id: HashMap<&str, usize> = variations
        .iter()
        .enumerate()
        .map(|(i, v)| (v.id(), i))
        .collect();
    let index_by_key: HashMap<&str, usize> = variations
        .iter()
        .enumerate()
        .map(|(i, v)| (v.key(), i))
        .collect();

    let allocations = experiment
        .traffic_allocation
        .into_iter()
        .map(|allocation| {
            index_by_id
                .get(&*allocation.entity_id)
                .map(|&i| (allocation.end_of_range, i))
                .ok_or_else(|| {
                    log::warn!(target: "optimizely",
                               experiment_key = experiment.key,
                               variation_id = allocation.entity_id;
                               "unknown variation in traffic allocation");
                    Error::UnknownTrafficAllocationVariation {
                        variation_id: allocation.entity_id.to_string(),
                    }
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let forced_variations = experiment
        .forced_variations
        .into_iter()
        .filter_map(|(user_id, variation_key)| match index_by_key.get(&*variation_key) {
            Some(&i) => Some((user_id, i)),
            None => {
                log::debug!(target: "optimizely",
                            experiment_key = experiment.key,
                            user_id,
                            variation_key;
                            "dropping forced variation for unknown variation key");
                None
            }
        })
        .collect();

    Ok(Experiment {
        id: experiment.id,
        key: experiment.key,
        layer_id: experiment.layer_id,
        status: experiment.status,
        account_id: account_id.clone(),
        traffic_partition: TrafficPartition::new(allocations),
        forced_variations,
        cache: AssignmentCache::new(),
        variations,
    })
}

impl Experiment {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Layer (campaign) this experiment belongs to.
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RUNNING_STATUS
    }

    /// Account of the project that owns this experiment.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    pub fn variation_by_key(&self, key: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.key() == key)
    }

    /// Traffic allocation as `(variation, end_of_range)` pairs, in evaluation order.
    pub fn traffic_allocation(&self) -> impl Iterator<Item = (&Variation, u32)> {
        self.traffic_partition
            .allocations()
            .iter()
            .map(|allocation| (&self.variations[allocation.variation], allocation.end_of_range))
    }

    /// The variation `user_id` is forced into, if any.
    pub fn forced_variation(&self, user_id: &str) -> Option<&Variation> {
        self.forced_variations
            .get(user_id)
            .map(|&i| &self.variations[i])
    }

    /// The variation previously computed for `user_id`, if any. Forced variations are never
    /// cached.
    pub fn cached_variation(&self, user_id: &str) -> Option<&Variation> {
        self.cache.get(user_id).map(|i| &self.variations[i])
    }

    /// Number of users with a cached assignment.
    pub fn cached_user_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{Error, Project};

    fn datafile() -> Vec<u8> {
        fs::read("tests/data/datafile-v4.json").expect("Failed to open tests/data/datafile-v4.json")
    }

    #[test]
    fn project_is_created_from_datafile() {
        let json = datafile();
        let project = Project::from_datafile(json.clone()).unwrap();

        assert_eq!(project.version(), "4");
        assert_eq!(project.revision(), "666");
        assert_eq!(project.project_id(), "1234");
        assert_eq!(project.account_id(), "00001");
        assert_eq!(project.raw_datafile(), &json[..]);

        let mut keys: Vec<_> = project.experiment_keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["an_experiment", "paused_experiment"]);

        let experiment = project.experiment("an_experiment").unwrap();
        assert_eq!(experiment.id(), "5678");
        assert_eq!(experiment.layer_id(), "layer");
        assert_eq!(experiment.account_id(), "00001");
        assert!(experiment.is_running());
        assert!(!project.experiment("paused_experiment").unwrap().is_running());
    }

    #[test]
    fn traffic_allocation_mirrors_datafile() {
        let project = Project::from_datafile(datafile()).unwrap();
        let experiment = project.experiment("an_experiment").unwrap();

        let allocation: Vec<_> = experiment
            .traffic_allocation()
            .map(|(variation, end)| (variation.id(), variation.key(), end))
            .collect();
        assert_eq!(
            allocation,
            vec![
                ("abc123", "variation_1", 3000),
                ("def456", "variation_2", 10000)
            ]
        );
    }

    #[test]
    fn forced_variations_resolve_by_key() {
        let project = Project::from_datafile(datafile()).unwrap();
        let experiment = project.experiment("an_experiment").unwrap();

        assert_eq!(experiment.forced_variation("xyz").unwrap().key(), "variation_1");
        assert_eq!(experiment.forced_variation("abc").unwrap().id(), "def456");
        assert!(experiment.forced_variation("nobody").is_none());
    }

    #[test]
    fn forced_variation_without_variation_present_is_ignored() {
        let project = Project::from_datafile(
            r#"{
              "version": "4",
              "experiments": [{
                "variations": [{"id": "abc123", "key": "variation_1"}],
                "trafficAllocation": [],
                "forcedVariations": {"abc": "variation_2"}
              }]
            }"#,
        )
        .unwrap();

        let experiment = project.experiment("").unwrap();
        assert!(experiment.forced_variation("abc").is_none());
        assert_eq!(experiment.traffic_allocation().count(), 0);

        // The stale entry in the fixture datafile is dropped as well.
        let project = Project::from_datafile(datafile()).unwrap();
        assert!(project
            .experiment("an_experiment")
            .unwrap()
            .forced_variation("stale")
            .is_none());
    }

    #[test]
    fn error_on_unsupported_datafile_version() {
        let err = Project::from_datafile(r#"{"version": "3"}"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDatafileVersion { version } if version == "3"));
    }

    #[test]
    fn malformed_json_results_in_an_error() {
        assert!(matches!(
            Project::from_datafile("{"),
            Err(Error::DatafileParse(_))
        ));
    }

    #[test]
    fn unknown_variation_in_traffic_allocation_returns_error() {
        let err = Project::from_datafile(
            r#"{
              "version": "4",
              "experiments": [{
                "status": "Running",
                "variations": [],
                "id": "5678",
                "key": "an_experiment",
                "layerId": "layer",
                "trafficAllocation": [{"entityId": "abc123", "endOfRange": 3000}],
                "forcedVariations": {}
              }]
            }"#,
        )
        .unwrap_err();

        assert!(
            matches!(err, Error::UnknownTrafficAllocationVariation { variation_id } if variation_id == "abc123")
        );
    }

    #[test]
    fn last_experiment_wins_on_key_collision() {
        let project = Project::from_datafile(
            r#"{
              "version": "4",
              "experiments": [
                {"id": "1", "key": "dup"},
                {"id": "2", "key": "dup"}
              ]
            }"#,
        )
        .unwrap();

        assert_eq!(project.experiment_keys().count(), 1);
        assert_eq!(project.experiment("dup").unwrap().id(), "2");
    }
}
