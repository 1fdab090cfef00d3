use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier wrapper for grant applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier wrapper for state-aid records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateAidId(pub Uuid);

impl StateAidId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StateAidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Employee headcount band declared by the applicant. `250-or-more`
/// disqualifies the business from the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeBand {
    #[serde(rename = "fewer-than-10")]
    FewerThan10,
    #[serde(rename = "10-to-49")]
    TenToFortyNine,
    #[serde(rename = "50-to-249")]
    FiftyToTwoFortyNine,
    #[serde(rename = "250-or-more")]
    TwoFiftyOrMore,
}

impl EmployeeBand {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FewerThan10 => "fewer-than-10",
            Self::TenToFortyNine => "10-to-49",
            Self::FiftyToTwoFortyNine => "50-to-249",
            Self::TwoFiftyOrMore => "250-or-more",
        }
    }
}

/// One row of the read-only summary captured at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// A titled block of summary rows, ordered as presented to the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBlock {
    pub heading: String,
    pub rows: Vec<SummaryRow>,
}

/// The root aggregate representing one grant request.
///
/// Nearly every answer field is optional: the portal collects them across
/// a multi-step form and the draft is only checked for completeness at
/// submission. Once `sent_for_review` flips, the answer fields freeze.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub company: Option<Uuid>,

    // Applicant contact details.
    pub applicant_full_name: Option<String>,
    pub applicant_email: Option<String>,
    pub applicant_mobile_number: Option<String>,
    pub applicant_position: Option<String>,

    // Trade event selection.
    pub event_name: Option<String>,
    pub event_city: Option<String>,
    pub event_country: Option<String>,
    pub event_start_date: Option<NaiveDate>,
    pub event_end_date: Option<NaiveDate>,

    // Business details.
    pub business_name: Option<String>,
    pub business_website: Option<String>,
    pub sector: Option<String>,
    pub number_of_employees: Option<EmployeeBand>,
    pub turnover_greater_than_threshold: Option<bool>,

    // Export experience.
    pub has_exported_before: Option<bool>,
    pub has_product_or_service_for_export: Option<bool>,

    // Trade-event narrative answers scored during suitability review.
    pub products_and_services_description: Option<String>,
    pub products_and_services_competitors: Option<String>,
    pub export_strategy: Option<String>,

    // Eligibility inputs.
    pub previous_applications: Option<u8>,
    pub event_committed: Option<bool>,

    // Lifecycle flags.
    pub sent_for_review: bool,
    pub is_active: bool,
    pub application_summary: Vec<SummaryBlock>,

    // Manual company entry used when no registered company is selected.
    pub manual_company_name: Option<String>,
    pub manual_registration_number: Option<String>,
    pub manual_company_address: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub(crate) fn from_draft(draft: ApplicationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::new(),
            company: draft.company,
            applicant_full_name: draft.applicant_full_name,
            applicant_email: draft.applicant_email,
            applicant_mobile_number: draft.applicant_mobile_number,
            applicant_position: draft.applicant_position,
            event_name: draft.event_name,
            event_city: draft.event_city,
            event_country: draft.event_country,
            event_start_date: draft.event_start_date,
            event_end_date: draft.event_end_date,
            business_name: draft.business_name,
            business_website: draft.business_website,
            sector: draft.sector,
            number_of_employees: draft.number_of_employees,
            turnover_greater_than_threshold: draft.turnover_greater_than_threshold,
            has_exported_before: draft.has_exported_before,
            has_product_or_service_for_export: draft.has_product_or_service_for_export,
            products_and_services_description: draft.products_and_services_description,
            products_and_services_competitors: draft.products_and_services_competitors,
            export_strategy: draft.export_strategy,
            previous_applications: draft.previous_applications,
            event_committed: draft.event_committed,
            sent_for_review: false,
            is_active: true,
            application_summary: Vec::new(),
            manual_company_name: draft.manual_company_name,
            manual_registration_number: draft.manual_registration_number,
            manual_company_address: draft.manual_company_address,
            created_at: now,
            updated_at: now,
        }
    }

    /// Program eligibility is the conjunction of four applicant answers.
    /// Unanswered questions do not disqualify a draft.
    pub fn is_eligible(&self) -> bool {
        self.previous_applications.unwrap_or(0) < 6
            && !self.event_committed.unwrap_or(false)
            && self.number_of_employees != Some(EmployeeBand::TwoFiftyOrMore)
            && !self.turnover_greater_than_threshold.unwrap_or(false)
    }
}

/// Fields accepted when creating a draft application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationDraft {
    pub company: Option<Uuid>,
    pub applicant_full_name: Option<String>,
    pub applicant_email: Option<String>,
    pub applicant_mobile_number: Option<String>,
    pub applicant_position: Option<String>,
    pub event_name: Option<String>,
    pub event_city: Option<String>,
    pub event_country: Option<String>,
    pub event_start_date: Option<NaiveDate>,
    pub event_end_date: Option<NaiveDate>,
    pub business_name: Option<String>,
    pub business_website: Option<String>,
    pub sector: Option<String>,
    pub number_of_employees: Option<EmployeeBand>,
    pub turnover_greater_than_threshold: Option<bool>,
    pub has_exported_before: Option<bool>,
    pub has_product_or_service_for_export: Option<bool>,
    pub products_and_services_description: Option<String>,
    pub products_and_services_competitors: Option<String>,
    pub export_strategy: Option<String>,
    pub previous_applications: Option<u8>,
    pub event_committed: Option<bool>,
    pub manual_company_name: Option<String>,
    pub manual_registration_number: Option<String>,
    pub manual_company_address: Option<String>,
}

/// Partial update applied to a draft. Present fields overwrite; absent
/// fields are left alone, which makes an identical PATCH idempotent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationPatch {
    pub company: Option<Uuid>,
    pub applicant_full_name: Option<String>,
    pub applicant_email: Option<String>,
    pub applicant_mobile_number: Option<String>,
    pub applicant_position: Option<String>,
    pub event_name: Option<String>,
    pub event_city: Option<String>,
    pub event_country: Option<String>,
    pub event_start_date: Option<NaiveDate>,
    pub event_end_date: Option<NaiveDate>,
    pub business_name: Option<String>,
    pub business_website: Option<String>,
    pub sector: Option<String>,
    pub number_of_employees: Option<EmployeeBand>,
    pub turnover_greater_than_threshold: Option<bool>,
    pub has_exported_before: Option<bool>,
    pub has_product_or_service_for_export: Option<bool>,
    pub products_and_services_description: Option<String>,
    pub products_and_services_competitors: Option<String>,
    pub export_strategy: Option<String>,
    pub previous_applications: Option<u8>,
    pub event_committed: Option<bool>,
    pub manual_company_name: Option<String>,
    pub manual_registration_number: Option<String>,
    pub manual_company_address: Option<String>,
}

impl ApplicationPatch {
    pub(crate) fn apply(self, application: &mut Application) {
        macro_rules! overwrite {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    application.$field = Some(value);
                })*
            };
        }

        overwrite!(
            company,
            applicant_full_name,
            applicant_email,
            applicant_mobile_number,
            applicant_position,
            event_name,
            event_city,
            event_country,
            event_start_date,
            event_end_date,
            business_name,
            business_website,
            sector,
            number_of_employees,
            turnover_greater_than_threshold,
            has_exported_before,
            has_product_or_service_for_export,
            products_and_services_description,
            products_and_services_competitors,
            export_strategy,
            previous_applications,
            event_committed,
            manual_company_name,
            manual_registration_number,
            manual_company_address,
        );
    }
}

/// De-minimis state aid previously received by the business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateAid {
    pub id: StateAidId,
    pub grant_application: ApplicationId,
    pub authority: String,
    pub amount: u32,
    pub description: String,
    pub date_received: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when attaching a state-aid record.
#[derive(Debug, Clone, Deserialize)]
pub struct StateAidDraft {
    pub grant_application: ApplicationId,
    pub authority: String,
    pub amount: u32,
    pub description: String,
    pub date_received: NaiveDate,
}

/// Partial update for a state-aid record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateAidPatch {
    pub authority: Option<String>,
    pub amount: Option<u32>,
    pub description: Option<String>,
    pub date_received: Option<NaiveDate>,
}
