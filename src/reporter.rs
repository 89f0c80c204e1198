//! Sending event batches to Optimizely.
use reqwest::{header::CONTENT_TYPE, StatusCode, Url};

use crate::{Error, EventBatch, Result};

/// Default endpoint of the Optimizely events API.
pub const DEFAULT_EVENTS_ENDPOINT: &str = "https://logx.optimizely.com/v1/events";

/// Something that can deliver an [`EventBatch`].
///
/// Reporters are not expected to retry. Closures taking `&EventBatch` implement this trait, which
/// is convenient for tests and custom transports.
pub trait EventReporter {
    fn report(&self, events: &EventBatch) -> Result<()>;
}

impl<T: Fn(&EventBatch) -> Result<()>> EventReporter for T {
    fn report(&self, events: &EventBatch) -> Result<()> {
        self(events)
    }
}

/// Synchronously POSTs event batches to the events API.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    endpoint: Url,
}

impl HttpReporter {
    /// Create a reporter for [`DEFAULT_EVENTS_ENDPOINT`].
    pub fn new() -> HttpReporter {
        HttpReporter {
            client: reqwest::blocking::Client::new(),
            endpoint: Url::parse(DEFAULT_EVENTS_ENDPOINT)
                .expect("default events endpoint should be a valid URL"),
        }
    }

    /// Create a reporter for a custom endpoint.
    pub fn with_endpoint(endpoint: &str) -> Result<HttpReporter> {
        Ok(HttpReporter {
            client: reqwest::blocking::Client::new(),
            endpoint: Url::parse(endpoint).map_err(Error::InvalidBaseUrl)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Default for HttpReporter {
    fn default() -> Self {
        HttpReporter::new()
    }
}

impl EventReporter for HttpReporter {
    fn report(&self, events: &EventBatch) -> Result<()> {
        let body = events.to_json()?;

        log::debug!(target: "optimizely",
                    account_id = events.account_id(),
                    visitors = events.visitors().len();
                    "reporting events");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .inspect_err(|err| {
                log::warn!(target: "optimizely", "error reporting events: {err:?}");
            })?;

        expect_status(response.status(), StatusCode::NO_CONTENT)
    }
}

/// Fail with [`Error::UnexpectedStatus`] unless `status` is `expected`.
pub(crate) fn expect_status(status: StatusCode, expected: StatusCode) -> Result<()> {
    if status == expected {
        Ok(())
    } else {
        log::warn!(target: "optimizely",
                   status = status.as_u16();
                   "unexpected status code received from events API");
        Err(Error::UnexpectedStatus {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{expect_status, HttpReporter, DEFAULT_EVENTS_ENDPOINT};
    use crate::Error;

    #[test]
    fn default_endpoint() {
        assert_eq!(HttpReporter::new().endpoint().as_str(), DEFAULT_EVENTS_ENDPOINT);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            HttpReporter::with_endpoint("not a url"),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn only_no_content_counts_as_success() {
        assert!(expect_status(StatusCode::NO_CONTENT, StatusCode::NO_CONTENT).is_ok());
        assert!(matches!(
            expect_status(StatusCode::OK, StatusCode::NO_CONTENT),
            Err(Error::UnexpectedStatus { status: 200 })
        ));
    }
}
