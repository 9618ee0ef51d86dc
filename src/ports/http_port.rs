//! Outbound HTTP port.

use crate::domain::error::AdvisorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET. Non-2xx statuses are returned as responses; only transport
/// failures are errors.
pub trait HttpPort: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, AdvisorError>;
}
