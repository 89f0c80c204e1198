//! Wire format of the Optimizely datafile (version 4).
//!
//! These types mirror the JSON document and are only used while building a
//! [`Project`](crate::Project). Unknown keys are ignored and missing keys take their default
//! value, so that older or newer datafiles still load as long as the version matches.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Str;

/// Root of the datafile.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct DatafileWire {
    pub version: String,
    pub revision: Str,
    pub project_id: Str,
    pub account_id: Str,
    pub experiments: Vec<ExperimentWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ExperimentWire {
    pub id: Str,
    pub key: Str,
    pub layer_id: Str,
    pub status: Str,
    pub variations: Vec<VariationWire>,
    pub traffic_allocation: Vec<TrafficAllocationWire>,
    /// Mapping from user id to variation *key*.
    pub forced_variations: HashMap<Str, Str>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VariationWire {
    pub id: Str,
    pub key: Str,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct TrafficAllocationWire {
    /// Variation id.
    pub entity_id: Str,
    pub end_of_range: u32,
}
