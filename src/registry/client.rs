//! Transport seam for the ORCID registry.
//!
//! The import and sync operations only talk to the registry through the
//! [`WorksSource`] and [`WorksSink`] traits, so they can run against canned
//! works in tests. [`HttpRegistryClient`] implements both over HTTP.

use crate::registry::work::{Work, WorksSummary};
use crate::registry::OrcidId;
use crate::RegistryError;
use serde::{Deserialize, Serialize};

/// Read access to the works of a profile.
pub trait WorksSource {
    /// `GET /{orcid}/works`
    fn works_summary(&self, id: &OrcidId) -> Result<WorksSummary, RegistryError>;

    /// `GET /{orcid}/work/{put-code}`
    fn work_detail(&self, id: &OrcidId, put_code: u64) -> Result<Work, RegistryError>;
}

/// Write access to the works of a profile.
pub trait WorksSink {
    /// `POST /{orcid}/work`, returning the put-code of the created work when
    /// the registry reports it.
    fn post_work(
        &self,
        id: &OrcidId,
        access_token: &str,
        work: &Work,
    ) -> Result<Option<u64>, RegistryError>;
}

impl<T: WorksSource + ?Sized> WorksSource for &T {
    fn works_summary(&self, id: &OrcidId) -> Result<WorksSummary, RegistryError> {
        (**self).works_summary(id)
    }

    fn work_detail(&self, id: &OrcidId, put_code: u64) -> Result<Work, RegistryError> {
        (**self).work_detail(id, put_code)
    }
}

impl<T: WorksSink + ?Sized> WorksSink for &T {
    fn post_work(
        &self,
        id: &OrcidId,
        access_token: &str,
        work: &Work,
    ) -> Result<Option<u64>, RegistryError> {
        (**self).post_work(id, access_token, work)
    }
}

/// Production registry or its sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl RegistryEnvironment {
    /// Base URL of the public (read) API.
    pub fn public_api_url(self) -> &'static str {
        match self {
            RegistryEnvironment::Production => "https://pub.orcid.org/v3.0",
            RegistryEnvironment::Sandbox => "https://pub.sandbox.orcid.org/v3.0",
        }
    }

    /// Base URL of the member (write) API.
    pub fn member_api_url(self) -> &'static str {
        match self {
            RegistryEnvironment::Production => "https://api.orcid.org/v3.0",
            RegistryEnvironment::Sandbox => "https://api.sandbox.orcid.org/v3.0",
        }
    }
}

#[cfg(feature = "orcid")]
pub use http::HttpRegistryClient;

#[cfg(feature = "orcid")]
mod http {
    use super::*;
    use reqwest::blocking::{Client, Response};
    use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
    use serde::de::DeserializeOwned;
    use tracing::debug;

    const ORCID_JSON: &str = "application/vnd.orcid+json";

    /// Blocking HTTP client for the ORCID v3.0 API.
    #[derive(Debug, Clone)]
    pub struct HttpRegistryClient {
        client: Client,
        environment: RegistryEnvironment,
    }

    impl HttpRegistryClient {
        pub fn new(environment: RegistryEnvironment) -> Result<Self, RegistryError> {
            let client = Client::builder()
                .user_agent(format!("cvpubs/{}", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self {
                client,
                environment,
            })
        }

        pub fn environment(&self) -> RegistryEnvironment {
            self.environment
        }

        fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
            debug!(url, "GET");
            let response = self.client.get(url).header(ACCEPT, ORCID_JSON).send()?;
            let body = check_status(response)?.text()?;
            Ok(serde_json::from_str(&body)?)
        }
    }

    fn check_status(response: Response) -> Result<Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(RegistryError::Api {
            status: status.as_u16(),
            message,
        })
    }

    impl WorksSource for HttpRegistryClient {
        fn works_summary(&self, id: &OrcidId) -> Result<WorksSummary, RegistryError> {
            let url = format!("{}/{}/works", self.environment.public_api_url(), id);
            self.get_json(&url)
        }

        fn work_detail(&self, id: &OrcidId, put_code: u64) -> Result<Work, RegistryError> {
            let url = format!(
                "{}/{}/work/{}",
                self.environment.public_api_url(),
                id,
                put_code
            );
            self.get_json(&url)
        }
    }

    impl WorksSink for HttpRegistryClient {
        fn post_work(
            &self,
            id: &OrcidId,
            access_token: &str,
            work: &Work,
        ) -> Result<Option<u64>, RegistryError> {
            let url = format!("{}/{}/work", self.environment.member_api_url(), id);
            debug!(url, "POST");
            let response = self
                .client
                .post(&url)
                .bearer_auth(access_token)
                .header(ACCEPT, ORCID_JSON)
                .header(CONTENT_TYPE, ORCID_JSON)
                .body(serde_json::to_vec(work)?)
                .send()?;
            let response = check_status(response)?;

            Ok(response
                .headers()
                .get(LOCATION)
                .and_then(|location| location.to_str().ok())
                .and_then(|location| location.rsplit('/').next())
                .and_then(|put_code| put_code.parse().ok()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            RegistryEnvironment::default().public_api_url(),
            "https://pub.orcid.org/v3.0"
        );
        assert_eq!(
            RegistryEnvironment::Sandbox.member_api_url(),
            "https://api.sandbox.orcid.org/v3.0"
        );
    }
}
