//! Blocking HTTP client used for manifests, XML resources and instant
//! redirects. Timeouts are whatever the underlying client enforces.

use actc_error::{HarnessError, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::fetch::HttpClient;

const USER_AGENT: &str = concat!("actc-harness/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| HarnessError::internal(format!("cannot build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        debug!(url, accept, "GET");
        self.client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|err| HarnessError::http(url, err))
    }
}
