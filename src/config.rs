/// Account-level metadata attached to every [`EventBatch`](crate::EventBatch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsConfig {
    pub(crate) client_name: String,
    pub(crate) client_version: Option<String>,
    pub(crate) anonymize_ip: bool,
    pub(crate) enrich_decisions: bool,
}

impl Default for EventsConfig {
    /// Report as this crate, anonymize IPs and ask the backend to enrich decisions.
    fn default() -> Self {
        EventsConfig {
            client_name: EventsConfig::DEFAULT_CLIENT_NAME.to_owned(),
            client_version: Some(EventsConfig::DEFAULT_CLIENT_VERSION.to_owned()),
            anonymize_ip: true,
            enrich_decisions: true,
        }
    }
}

impl EventsConfig {
    /// Client name reported when none is set.
    pub const DEFAULT_CLIENT_NAME: &'static str = env!("CARGO_PKG_NAME");

    /// Client version reported when none is set.
    pub const DEFAULT_CLIENT_VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Create the default configuration.
    ///
    /// ```
    /// # use optimizely::EventsConfig;
    /// let mut config = EventsConfig::new();
    /// config.client_name("my-service").anonymize_ip(false);
    /// ```
    pub fn new() -> Self {
        EventsConfig::default()
    }

    /// Override the client name reported with events.
    pub fn client_name(&mut self, client_name: impl Into<String>) -> &mut Self {
        self.client_name = client_name.into();
        self
    }

    /// Override the client version reported with events. An empty version is not reported at
    /// all.
    pub fn client_version(&mut self, client_version: impl Into<String>) -> &mut Self {
        let client_version = client_version.into();
        self.client_version = (!client_version.is_empty()).then_some(client_version);
        self
    }

    /// Set whether the backend should anonymize visitor IPs. Defaults to `true`.
    pub fn anonymize_ip(&mut self, anonymize_ip: bool) -> &mut Self {
        self.anonymize_ip = anonymize_ip;
        self
    }

    /// Set whether the backend should enrich decisions with experiment metadata. Defaults to
    /// `true`.
    pub fn enrich_decisions(&mut self, enrich_decisions: bool) -> &mut Self {
        self.enrich_decisions = enrich_decisions;
        self
    }
}
