//! Local cache in front of the external company-data provider.

pub mod domain;
pub mod gateway;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{Company, CompanyId, CompanyPayload, DnbSnapshot};
pub use gateway::{CompanyDataGateway, GatewayError, RetryingGateway, UpstreamError};
pub use repository::CompanyRepository;
pub use router::company_router;
pub use service::{CompanyService, CompanyServiceError, CompanyView};
