//! Blocking reqwest client behind [`HttpPort`].

use crate::domain::error::AdvisorError;
use crate::ports::http_port::{HttpPort, HttpResponse};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;

pub struct ReqwestHttpAdapter {
    client: Client,
}

impl ReqwestHttpAdapter {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, AdvisorError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .build()
            .map_err(|e| AdvisorError::Network {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

impl HttpPort for ReqwestHttpAdapter {
    fn get(&self, url: &str) -> Result<HttpResponse, AdvisorError> {
        let response = self.client.get(url).send().map_err(|e| AdvisorError::Network {
            reason: format!("GET {url}: {e}"),
        })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| AdvisorError::Network {
            reason: format!("reading body of {url}: {e}"),
        })?;

        Ok(HttpResponse { status, body })
    }
}
