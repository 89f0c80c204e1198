//! Reportable events built from [`Impression`]s.
//!
//! The types here serialize to the body expected by the Optimizely events endpoint. Every
//! impression becomes one [`Visitor`] with a single snapshot holding one decision and one
//! activation event; visitors from the same account are grouped into an [`EventBatch`].
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, EventsConfig, Impression, Result};

/// Event type reported for an experiment activation.
pub const CAMPAIGN_ACTIVATED: &str = "campaign_activated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub entity_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Random id used by the backend to deduplicate events.
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub campaign_id: String,
    pub experiment_id: String,
    pub variation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub decisions: Vec<Decision>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    #[serde(rename = "visitor_id")]
    pub id: String,
    pub snapshots: Vec<Snapshot>,
}

/// A batch of visitors from a single account, ready to be sent to the events endpoint.
///
/// A batch always holds at least one visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    account_id: String,
    anonymize_ip: bool,
    client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_version: Option<String>,
    enrich_decisions: bool,
    visitors: Vec<Visitor>,
}

impl Impression {
    /// Convert the impression into a visitor record. Each call generates a new event uuid.
    pub fn to_visitor(&self) -> Visitor {
        let experiment = self.experiment();
        let decision = Decision {
            campaign_id: experiment.layer_id().to_owned(),
            experiment_id: experiment.id().to_owned(),
            variation_id: self.variation().id().to_owned(),
        };
        let event = Event {
            entity_id: experiment.layer_id().to_owned(),
            event_type: CAMPAIGN_ACTIVATED.to_owned(),
            timestamp: self.timestamp().timestamp_millis(),
            uuid: Uuid::new_v4().to_string(),
        };
        Visitor {
            id: self.user_id().to_owned(),
            snapshots: vec![Snapshot {
                decisions: vec![decision],
                events: vec![event],
            }],
        }
    }
}

impl EventBatch {
    /// Build a batch from impressions.
    ///
    /// Fails with [`Error::NoImpressions`] if `impressions` is empty and with
    /// [`Error::MixedAccounts`] if the impressions do not all come from the same account.
    pub fn new<'a>(
        config: &EventsConfig,
        impressions: impl IntoIterator<Item = &'a Impression>,
    ) -> Result<EventBatch> {
        let mut account_id: Option<&str> = None;
        let mut visitors = Vec::new();

        for impression in impressions {
            match account_id {
                None => account_id = Some(impression.account_id()),
                Some(expected) if expected != impression.account_id() => {
                    return Err(Error::MixedAccounts {
                        expected: expected.to_owned(),
                        found: impression.account_id().to_owned(),
                    });
                }
                Some(_) => {}
            }
            visitors.push(impression.to_visitor());
        }

        let account_id = account_id.ok_or(Error::NoImpressions)?;

        Ok(EventBatch {
            account_id: account_id.to_owned(),
            anonymize_ip: config.anonymize_ip,
            client_name: config.client_name.clone(),
            client_version: config
                .client_version
                .clone()
                .filter(|version| !version.is_empty()),
            enrich_decisions: config.enrich_decisions,
            visitors,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn anonymize_ip(&self) -> bool {
        self.anonymize_ip
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn client_version(&self) -> Option<&str> {
        self.client_version.as_deref()
    }

    pub fn enrich_decisions(&self) -> bool {
        self.enrich_decisions
    }

    pub fn visitors(&self) -> &[Visitor] {
        &self.visitors
    }

    /// Serialize the batch into the JSON body expected by the events endpoint.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| Error::Serialization(std::sync::Arc::new(err)))
    }
}
