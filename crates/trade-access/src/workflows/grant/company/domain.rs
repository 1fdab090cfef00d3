use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for cached companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered business held in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub id: CompanyId,
    pub duns_number: String,
    pub primary_name: String,
    pub registration_number: Option<String>,
    pub address_country: String,
    pub address_town: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The provider's wire shape for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPayload {
    pub duns_number: String,
    pub primary_name: String,
    #[serde(default)]
    pub registration_number: Option<String>,
    pub address_country: String,
    #[serde(default)]
    pub address_town: Option<String>,
}

impl CompanyPayload {
    pub fn is_gb_registered(&self) -> bool {
        self.address_country == "GB"
    }

    pub(crate) fn into_company(self, now: DateTime<Utc>) -> Company {
        Company {
            id: CompanyId::new(),
            duns_number: self.duns_number,
            primary_name: self.primary_name,
            registration_number: self.registration_number,
            address_country: self.address_country,
            address_town: self.address_town,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One immutable provider response kept for audit; rows are only ever
/// appended, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnbSnapshot {
    pub id: Uuid,
    pub company: CompanyId,
    pub payload: CompanyPayload,
    pub created_at: DateTime<Utc>,
}

impl DnbSnapshot {
    pub(crate) fn new(company: CompanyId, payload: CompanyPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company,
            payload,
            created_at: now,
        }
    }
}
