//! The remote company-data provider and its retry policy.

use std::sync::Arc;

use tracing::warn;

use super::domain::CompanyPayload;

const MAX_ATTEMPTS: u32 = 3;

/// Low-level provider failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned status {0}")]
    Status(u16),
}

impl GatewayError {
    /// Transport faults and 5xx responses are worth another attempt;
    /// client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code >= 500,
        }
    }
}

/// Every provider failure collapses to this for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Could not communicate with dnb-service.")]
pub struct UpstreamError;

/// Raw access to the provider, one request per call.
pub trait CompanyDataGateway: Send + Sync {
    fn lookup(&self, duns_number: &str) -> Result<Option<CompanyPayload>, GatewayError>;
    fn search(&self, term: &str) -> Result<Vec<CompanyPayload>, GatewayError>;
}

/// Wrapper applying the retry policy and the GB-registration filter.
pub struct RetryingGateway<G> {
    inner: Arc<G>,
}

impl<G> RetryingGateway<G>
where
    G: CompanyDataGateway + 'static,
{
    pub fn new(inner: Arc<G>) -> Self {
        Self { inner }
    }

    pub fn lookup(&self, duns_number: &str) -> Result<Option<CompanyPayload>, UpstreamError> {
        let payload = self.with_retry("lookup", || self.inner.lookup(duns_number))?;
        Ok(payload.filter(CompanyPayload::is_gb_registered))
    }

    pub fn search(&self, term: &str) -> Result<Vec<CompanyPayload>, UpstreamError> {
        let mut results = self.with_retry("search", || self.inner.search(term))?;
        results.retain(CompanyPayload::is_gb_registered);
        Ok(results)
    }

    fn with_retry<T>(
        &self,
        operation: &str,
        call: impl Fn() -> Result<T, GatewayError>,
    ) -> Result<T, UpstreamError> {
        for attempt in 1..=MAX_ATTEMPTS {
            match call() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(operation, attempt, %error, "dnb-service call failed, retrying");
                }
                Err(error) => {
                    warn!(operation, attempt, %error, "dnb-service call failed");
                    return Err(UpstreamError);
                }
            }
        }
        Err(UpstreamError)
    }
}
