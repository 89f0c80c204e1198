//! A blocking client for the Optimizely REST API.
//!
//! Supports listing projects and environments and downloading an environment's datafile, which
//! can then be turned into a [`Project`](crate::Project). List endpoints are paginated; the client
//! follows `Link: <...>; rel="next"` headers until the last page.
use chrono::{DateTime, Utc};
use reqwest::{
    blocking::Response,
    header::{CONTENT_TYPE, LINK},
    StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    reporter::{expect_status, EventReporter, DEFAULT_EVENTS_ENDPOINT},
    Error, EventBatch, Result,
};

pub const DEFAULT_BASE_URL: &str = "https://api.optimizely.com/v2";

/// An Optimizely project as returned by the REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ApiProject {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub account_id: u64,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// An environment within a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Environment {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub project_id: u64,
    pub archived: bool,
    pub description: String,
    pub has_restricted_permissions: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub datafile: DatafileInfo,
    pub is_primary: bool,
}

/// Where to download the datafile of an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct DatafileInfo {
    pub id: u64,
    pub latest_file_size: u64,
    pub other_urls: Vec<String>,
    pub revision: u64,
    pub sdk_key: String,
    pub url: String,
}

/// Operations on the Optimizely REST API.
///
/// Implementors provide the raw requests; environment lookups and datafile download are built on
/// top of them.
pub trait OptimizelyApi {
    /// All projects visible to the client.
    fn get_projects(&self) -> Result<Vec<ApiProject>>;

    /// Environments of the project with the given id.
    fn get_environments_by_project_id(&self, project_id: u64) -> Result<Vec<Environment>>;

    /// Download the contents of `url`.
    fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Send already-serialized events to the events API.
    fn report_events(&self, events: &[u8]) -> Result<()>;

    /// Environments of the project with the given name.
    fn get_environments_by_project_name(&self, project_name: &str) -> Result<Vec<Environment>> {
        let project = self
            .get_projects()?
            .into_iter()
            .find(|project| project.name == project_name)
            .ok_or_else(|| Error::ProjectNotFound {
                name: project_name.to_owned(),
            })?;
        self.get_environments_by_project_id(project.id)
    }

    /// Environment with the given key in the project with the given id.
    fn get_environment_by_project_id(&self, key: &str, project_id: u64) -> Result<Environment> {
        self.get_environments_by_project_id(project_id)?
            .into_iter()
            .find(|environment| environment.key == key)
            .ok_or_else(|| Error::EnvironmentNotFound {
                key: key.to_owned(),
                project: project_id.to_string(),
            })
    }

    /// Environment with the given name in the project with the given name.
    fn get_environment_by_project_name(
        &self,
        name: &str,
        project_name: &str,
    ) -> Result<Environment> {
        self.get_environments_by_project_name(project_name)?
            .into_iter()
            .find(|environment| environment.name == name)
            .ok_or_else(|| Error::EnvironmentNotFound {
                key: name.to_owned(),
                project: project_name.to_owned(),
            })
    }

    /// Raw datafile of the environment with the given key in the project with the given id.
    fn get_datafile(&self, environment_key: &str, project_id: u64) -> Result<Vec<u8>> {
        let environment = self.get_environment_by_project_id(environment_key, project_id)?;
        self.download(&environment.datafile.url)
    }
}

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub(crate) token: Option<String>,
    pub(crate) base_url: String,
    pub(crate) events_endpoint: String,
    pub(crate) per_page: u32,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        ApiClientConfig {
            token: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            events_endpoint: DEFAULT_EVENTS_ENDPOINT.to_owned(),
            per_page: ApiClientConfig::DEFAULT_PER_PAGE,
        }
    }
}

impl ApiClientConfig {
    /// Number of items requested per page unless overridden.
    pub const DEFAULT_PER_PAGE: u32 = 25;

    /// Create a configuration authenticating with the given personal access token.
    ///
    /// The events endpoint does not need a token; use [`ApiClientConfig::default`] if that is all
    /// you need.
    pub fn from_token(token: impl Into<String>) -> Self {
        ApiClientConfig {
            token: Some(token.into()),
            ..ApiClientConfig::default()
        }
    }

    /// Number of items to request per page. `0` leaves the page size to the server.
    pub fn per_page(&mut self, per_page: u32) -> &mut Self {
        self.per_page = per_page;
        self
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the events endpoint used by [`OptimizelyApi::report_events`].
    pub fn events_endpoint(&mut self, events_endpoint: impl Into<String>) -> &mut Self {
        self.events_endpoint = events_endpoint.into();
        self
    }

    /// Create a new [`ApiClient`] using this configuration.
    pub fn to_client(&self) -> Result<ApiClient> {
        ApiClient::new(self.clone())
    }
}

/// A blocking HTTP client for the Optimizely REST API.
pub struct ApiClient {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: ApiClientConfig,
    projects_url: Url,
    environments_url: Url,
    events_url: Url,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<ApiClient> {
        let endpoint = |path: &str| {
            Url::parse(&format!("{}{}", config.base_url, path)).map_err(Error::InvalidBaseUrl)
        };
        Ok(ApiClient {
            client: reqwest::blocking::Client::new(),
            projects_url: endpoint("/projects")?,
            environments_url: endpoint("/environments")?,
            events_url: Url::parse(&config.events_endpoint).map_err(Error::InvalidBaseUrl)?,
            config,
        })
    }

    /// Send a single authenticated GET request, failing on non-2xx responses.
    fn get(&self, url: Url) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            log::warn!(target: "optimizely",
                       status = status.as_u16();
                       "received non-2xx response from Optimizely API");
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// GET `url` with `query` and collect the items of every page.
    fn get_paginated<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let url = self.with_query(url, query);
            log::debug!(target: "optimizely", url:display = url; "fetching page from Optimizely API");

            let response = self.get(url.clone())?;
            next = response
                .headers()
                .get(LINK)
                .and_then(|link| link.to_str().ok())
                .and_then(next_link)
                .and_then(|next| url.join(next).ok());

            items.extend(response.json::<Vec<T>>()?);
        }
        Ok(items)
    }

    fn with_query(&self, url: Url, query: &[(&str, String)]) -> Url {
        let per_page = self.config.per_page.to_string();
        let mut params: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        if self.config.per_page > 0 {
            params.push(("per_page", per_page.as_str()));
        }
        set_query_params(url, &params)
    }
}

impl OptimizelyApi for ApiClient {
    fn get_projects(&self) -> Result<Vec<ApiProject>> {
        self.get_paginated(self.projects_url.clone(), &[])
    }

    fn get_environments_by_project_id(&self, project_id: u64) -> Result<Vec<Environment>> {
        self.get_paginated(
            self.environments_url.clone(),
            &[("project_id", project_id.to_string())],
        )
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(url).map_err(Error::InvalidBaseUrl)?;
        log::debug!(target: "optimizely", url:display = url; "downloading datafile");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            log::warn!(target: "optimizely",
                       status = status.as_u16();
                       "invalid response received while retrieving datafile");
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    fn report_events(&self, events: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(self.events_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(events.to_vec())
            .send()?;
        expect_status(response.status(), StatusCode::NO_CONTENT)
    }
}

impl EventReporter for ApiClient {
    fn report(&self, events: &EventBatch) -> Result<()> {
        self.report_events(&events.to_json()?)
    }
}

/// Return the target of the `rel="next"` link in a `Link` header value.
pub(crate) fn next_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?;
        let is_next = parts.any(|param| match param.split_once('=') {
            Some((name, value)) => {
                name.trim().eq_ignore_ascii_case("rel")
                    && value
                        .trim()
                        .trim_matches('"')
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case("next"))
            }
            None => false,
        });
        is_next.then_some(target)
    })
}

/// Replace the values of `params` in the query of `url`, keeping every other parameter.
pub(crate) fn set_query_params(mut url: Url, params: &[(&str, &str)]) -> Url {
    if params.is_empty() {
        return url;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params.iter().any(|(name, _)| *name == &**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(params);
    url
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use reqwest::Url;

    use super::{
        next_link, set_query_params, ApiClientConfig, ApiProject, DatafileInfo, Environment,
        OptimizelyApi,
    };
    use crate::{Error, Result};

    #[derive(Default)]
    struct FakeApi {
        projects: Vec<ApiProject>,
        environments: HashMap<u64, Vec<Environment>>,
        files: HashMap<String, Vec<u8>>,
        reported: RefCell<Vec<Vec<u8>>>,
    }

    impl OptimizelyApi for FakeApi {
        fn get_projects(&self) -> Result<Vec<ApiProject>> {
            Ok(self.projects.clone())
        }

        fn get_environments_by_project_id(&self, project_id: u64) -> Result<Vec<Environment>> {
            Ok(self.environments.get(&project_id).cloned().unwrap_or_default())
        }

        fn download(&self, url: &str) -> Result<Vec<u8>> {
            self.files
                .get(url)
                .cloned()
                .ok_or(Error::UnexpectedStatus { status: 404 })
        }

        fn report_events(&self, events: &[u8]) -> Result<()> {
            self.reported.borrow_mut().push(events.to_vec());
            Ok(())
        }
    }

    fn fake_api() -> FakeApi {
        let environment = |id, key: &str, name: &str| Environment {
            id,
            key: key.to_owned(),
            name: name.to_owned(),
            project_id: 1,
            datafile: DatafileInfo {
                url: format!("https://cdn.example.com/{key}.json"),
                ..DatafileInfo::default()
            },
            ..Environment::default()
        };
        FakeApi {
            projects: vec![ApiProject {
                id: 1,
                name: "web".to_owned(),
                ..ApiProject::default()
            }],
            environments: HashMap::from([(
                1,
                vec![
                    environment(10, "production", "Production"),
                    environment(11, "staging", "Staging"),
                ],
            )]),
            files: HashMap::from([(
                "https://cdn.example.com/staging.json".to_owned(),
                br#"{"version": "4"}"#.to_vec(),
            )]),
            ..FakeApi::default()
        }
    }

    #[test]
    fn finds_environments_by_project_name() {
        let api = fake_api();
        let environments = api.get_environments_by_project_name("web").unwrap();
        assert_eq!(environments.len(), 2);

        assert!(matches!(
            api.get_environments_by_project_name("mobile"),
            Err(Error::ProjectNotFound { name }) if name == "mobile"
        ));
    }

    #[test]
    fn finds_environment_by_key_or_name() {
        let api = fake_api();
        assert_eq!(api.get_environment_by_project_id("staging", 1).unwrap().id, 11);
        assert_eq!(
            api.get_environment_by_project_name("Production", "web")
                .unwrap()
                .id,
            10
        );
        assert!(matches!(
            api.get_environment_by_project_id("qa", 1),
            Err(Error::EnvironmentNotFound { key, project }) if key == "qa" && project == "1"
        ));
    }

    #[test]
    fn downloads_datafile_of_environment() {
        let api = fake_api();
        assert_eq!(
            api.get_datafile("staging", 1).unwrap(),
            br#"{"version": "4"}"#.to_vec()
        );
        assert!(matches!(
            api.get_datafile("production", 1),
            Err(Error::UnexpectedStatus { status: 404 })
        ));
    }

    #[test]
    fn deserializes_environment() {
        let environment: Environment = serde_json::from_str(
            r#"{
              "id": 10,
              "key": "production",
              "name": "Production",
              "project_id": 1,
              "archived": false,
              "created": "2019-01-01T00:00:00Z",
              "last_modified": "2019-01-02T00:00:00.000Z",
              "datafile": {
                "id": 99,
                "latest_file_size": 1024,
                "other_urls": [],
                "revision": 7,
                "sdk_key": "sdk",
                "url": "https://cdn.optimizely.com/datafiles/sdk.json"
              },
              "is_primary": true
            }"#,
        )
        .unwrap();

        assert_eq!(environment.key, "production");
        assert!(environment.is_primary);
        assert!(environment.created.is_some());
        assert_eq!(environment.datafile.revision, 7);
        assert_eq!(
            environment.datafile.url,
            "https://cdn.optimizely.com/datafiles/sdk.json"
        );
    }

    #[test]
    fn parses_next_link() {
        let header = r#"<https://api.optimizely.com/v2/projects?page=1>; rel="prev", <https://api.optimizely.com/v2/projects?page=3>; rel="next""#;
        assert_eq!(
            next_link(header),
            Some("https://api.optimizely.com/v2/projects?page=3")
        );

        assert_eq!(next_link(r#"<https://example.com/a>; rel="last""#), None);
        assert_eq!(next_link(""), None);
        assert_eq!(
            next_link("<https://example.com/b>; rel=next"),
            Some("https://example.com/b")
        );
    }

    #[test]
    fn overrides_query_params() {
        let url = Url::parse("https://api.optimizely.com/v2/environments?page=2&per_page=100").unwrap();
        let url = set_query_params(url, &[("per_page", "25"), ("project_id", "1")]);

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("page".to_owned(), "2".to_owned()),
                ("per_page".to_owned(), "25".to_owned()),
                ("project_id".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = ApiClientConfig::from_token("token");
        config.base_url("not a url");
        assert!(matches!(config.to_client(), Err(Error::InvalidBaseUrl(_))));
    }
}
