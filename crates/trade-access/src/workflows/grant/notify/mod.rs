//! Notification dispatcher for the transactional email provider.
//!
//! Delivery is best-effort by design: a failed send must never change the
//! outcome of the state transition that triggered it, so transport errors
//! are logged at ERROR and swallowed. When notifications are globally
//! disabled the dispatcher renders a preview through the provider and logs
//! it at INFO instead of delivering.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::workflows::grant::applications::ApplicationId;

/// Symbolic template names registered with the email provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
    ApplicationResume,
    EventBookingEvidence,
    EventBookingDocumentApproved,
    EventBookingDocumentRejected,
    EventEvidenceUploadConfirmation,
}

impl TemplateName {
    pub const fn slug(self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "application-submitted",
            Self::ApplicationApproved => "application-approved",
            Self::ApplicationRejected => "application-rejected",
            Self::ApplicationResume => "application-resume",
            Self::EventBookingEvidence => "event-booking-evidence",
            Self::EventBookingDocumentApproved => "event-booking-document-approved",
            Self::EventBookingDocumentRejected => "event-booking-document-rejected",
            Self::EventEvidenceUploadConfirmation => "event-evidence-upload-confirmation",
        }
    }
}

/// Provider transport errors. These never propagate past the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notify transport unavailable: {0}")]
    Transport(String),
    #[error("notify template '{0}' is not registered")]
    UnknownTemplate(String),
}

/// Contract with the email provider: template lookup, delivery, preview.
pub trait NotifyGateway: Send + Sync {
    fn template_id(&self, name: &str) -> Result<String, NotifyError>;
    fn deliver(
        &self,
        template_id: &str,
        recipient: &str,
        personalisation: &BTreeMap<String, String>,
    ) -> Result<(), NotifyError>;
    fn preview(
        &self,
        template_id: &str,
        personalisation: &BTreeMap<String, String>,
    ) -> Result<String, NotifyError>;
}

/// Dispatcher memoising template ids and applying the enabled/preview split.
pub struct NotificationDispatcher<G> {
    gateway: Arc<G>,
    enabled: bool,
    template_ids: Mutex<HashMap<TemplateName, String>>,
}

impl<G> NotificationDispatcher<G>
where
    G: NotifyGateway + 'static,
{
    pub fn new(gateway: Arc<G>, enabled: bool) -> Self {
        Self {
            gateway,
            enabled,
            template_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Send one templated email. Every failure path lands in the log; the
    /// caller's transition already committed and must not be unwound.
    pub fn send(
        &self,
        recipient: &str,
        template: TemplateName,
        personalisation: BTreeMap<String, String>,
    ) {
        let template_id = match self.resolve_template(template) {
            Ok(id) => id,
            Err(err) => {
                error!(template = template.slug(), %err, "could not resolve notify template");
                return;
            }
        };

        if self.enabled {
            if let Err(err) = self
                .gateway
                .deliver(&template_id, recipient, &personalisation)
            {
                error!(template = template.slug(), recipient, %err, "notification delivery failed");
            }
        } else {
            match self.gateway.preview(&template_id, &personalisation) {
                Ok(rendered) => {
                    info!(template = template.slug(), recipient, %rendered, "notification preview");
                }
                Err(err) => {
                    error!(template = template.slug(), %err, "notification preview failed");
                }
            }
        }
    }

    pub fn application_submitted(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::ApplicationSubmitted,
            base_personalisation(applicant_full_name, application),
        );
    }

    pub fn application_approved(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::ApplicationApproved,
            base_personalisation(applicant_full_name, application),
        );
    }

    pub fn application_rejected(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::ApplicationRejected,
            base_personalisation(applicant_full_name, application),
        );
    }

    pub fn application_resume(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
        magic_link: &str,
    ) {
        let mut personalisation = base_personalisation(applicant_full_name, application);
        personalisation.insert("magic_link".to_string(), magic_link.to_string());
        self.send(recipient, TemplateName::ApplicationResume, personalisation);
    }

    pub fn event_booking_evidence(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
        magic_link: &str,
    ) {
        let mut personalisation = base_personalisation(applicant_full_name, application);
        personalisation.insert("magic_link".to_string(), magic_link.to_string());
        self.send(
            recipient,
            TemplateName::EventBookingEvidence,
            personalisation,
        );
    }

    pub fn event_booking_document_approved(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::EventBookingDocumentApproved,
            base_personalisation(applicant_full_name, application),
        );
    }

    pub fn event_booking_document_rejected(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::EventBookingDocumentRejected,
            base_personalisation(applicant_full_name, application),
        );
    }

    pub fn event_evidence_upload_confirmation(
        &self,
        recipient: &str,
        applicant_full_name: &str,
        application: &ApplicationId,
    ) {
        self.send(
            recipient,
            TemplateName::EventEvidenceUploadConfirmation,
            base_personalisation(applicant_full_name, application),
        );
    }

    /// Template ids are fetched from the provider once and memoised by name.
    fn resolve_template(&self, template: TemplateName) -> Result<String, NotifyError> {
        let mut cache = self
            .template_ids
            .lock()
            .expect("template cache mutex poisoned");
        if let Some(id) = cache.get(&template) {
            return Ok(id.clone());
        }
        let id = self.gateway.template_id(template.slug())?;
        cache.insert(template, id.clone());
        Ok(id)
    }
}

fn base_personalisation(
    applicant_full_name: &str,
    application: &ApplicationId,
) -> BTreeMap<String, String> {
    let mut personalisation = BTreeMap::new();
    personalisation.insert(
        "applicant_full_name".to_string(),
        applicant_full_name.to_string(),
    );
    personalisation.insert("application_id".to_string(), application.to_string());
    personalisation
}
