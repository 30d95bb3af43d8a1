//! Digital signature sequencing: OTP issuance through the HSM, then PDF signing and the
//! signature-driven stage advance.

mod hsm;
mod response;

use std::future::Future;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub use hsm::HsmClient;
pub use response::{parse_sign_response, sign_pdf_envelope, SignOutcome};

use super::domain::{
    ApplicationId, ApplicationRecord, OfficerAssignment, OtpPurpose, OtpVerification, UserId,
};
use super::notifications;
use super::repository::ApplicationCommit;
use super::service::{WorkflowDeps, WorkflowError};
use super::transitions::{self, Actor};

pub const SIGNATURE_OTP_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSessionRequest {
    pub transaction_id: String,
    pub key_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPdfRequest {
    pub transaction_id: String,
    pub key_label: String,
    pub document_base64: String,
    pub coordinates: String,
    pub otp: String,
}

/// External HSM-backed signer. Responses are returned raw; callers parse them.
pub trait SigningService: Send + Sync {
    fn generate_otp(
        &self,
        request: &OtpSessionRequest,
    ) -> impl Future<Output = Result<String, SignerError>> + Send;

    fn sign_pdf(
        &self,
        request: &SignPdfRequest,
    ) -> impl Future<Output = Result<String, SignerError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signing service unreachable: {0}")]
    Transport(String),
    #[error("signing service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("signing client misconfigured: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for SignerError {
    fn from(error: reqwest::Error) -> Self {
        SignerError::Transport(error.to_string())
    }
}

impl From<SignerError> for WorkflowError {
    fn from(error: SignerError) -> Self {
        match error {
            SignerError::Configuration(reason) => WorkflowError::Configuration(reason),
            other => WorkflowError::ExternalService(other.to_string()),
        }
    }
}

/// Returned to the officer after an OTP was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpSession {
    pub otp_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Opaque answer from the OTP gateway, passed through untouched.
    pub gateway_payload: String,
}

pub struct SignatureCoordinator<S> {
    deps: WorkflowDeps,
    signer: Arc<S>,
}

impl<S> SignatureCoordinator<S>
where
    S: SigningService + 'static,
{
    pub fn new(deps: WorkflowDeps, signer: Arc<S>) -> Self {
        Self { deps, signer }
    }

    /// Ask the HSM to send a signing OTP to the officer's registered device.
    pub async fn generate_otp(
        &self,
        id: &ApplicationId,
        officer_user: &UserId,
    ) -> Result<OtpSession, WorkflowError> {
        let record = self.deps.load(id)?;
        let acting = self.deps.acting_officer(officer_user)?;
        transitions::plan_signature(
            record.stage(),
            &Actor::Officer(acting.role),
            record.position_type,
        )?;
        let key_label = required_key_label(&acting.officer.key_label, officer_user)?;

        let payload = self
            .signer
            .generate_otp(&OtpSessionRequest {
                transaction_id: record.id.to_string(),
                key_label,
            })
            .await?;
        if payload.trim().is_empty() {
            return Err(WorkflowError::ExternalService(
                "OTP gateway returned an empty response".to_string(),
            ));
        }

        let now = self.deps.clock.now();
        let otp = OtpVerification {
            id: Uuid::new_v4(),
            application_id: record.id,
            purpose: OtpPurpose::DigitalSignature,
            expires_at: now + Duration::minutes(SIGNATURE_OTP_MINUTES),
            is_used: false,
            used_at: None,
            created_by: officer_user.clone(),
            created_at: now,
        };
        self.deps.applications.record_signature_otp(otp.clone())?;
        info!(application = %record.id, officer = %acting.officer.id, "signature OTP issued");
        Ok(OtpSession {
            otp_id: otp.id,
            expires_at: otp.expires_at,
            gateway_payload: payload,
        })
    }

    /// Sign the recommended form with `otp` and advance along the signature edge.
    ///
    /// Nothing is written unless the signer accepts; the OTP row is consumed in the same
    /// commit that moves the stage.
    pub async fn apply_signature(
        &self,
        id: &ApplicationId,
        otp: &str,
        officer_user: &UserId,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(WorkflowError::Validation("otp is required".to_string()));
        }
        let mut record = self.deps.load(id)?;
        let acting = self.deps.acting_officer(officer_user)?;
        let previous = record.stage();
        let transition = transitions::plan_signature(
            previous,
            &Actor::Officer(acting.role),
            record.position_type,
        )?;
        let key_label = required_key_label(&acting.officer.key_label, officer_user)?;

        let now = self.deps.clock.now();
        let challenge = self
            .deps
            .applications
            .signature_otps(id)?
            .into_iter()
            .filter(|row| {
                row.purpose == OtpPurpose::DigitalSignature
                    && &row.created_by == officer_user
                    && row.is_active(now)
            })
            .max_by_key(|row| row.created_at)
            .ok_or_else(|| {
                WorkflowError::Validation(
                    "no active signature OTP for this officer; request a new one".to_string(),
                )
            })?;

        let form_key = record
            .workflow
            .recommended_form
            .clone()
            .ok_or_else(|| WorkflowError::not_found("recommended form for application", id))?;
        let unsigned = self.deps.documents.read(&form_key)?;

        let transaction_id = record.id.to_string();
        let raw = self
            .signer
            .sign_pdf(&SignPdfRequest {
                transaction_id: transaction_id.clone(),
                key_label,
                document_base64: STANDARD.encode(&unsigned),
                coordinates: acting.role.signature_placement().coordinates(),
                otp: otp.to_string(),
            })
            .await?;

        let signed = match parse_sign_response(&transaction_id, &raw) {
            SignOutcome::Signed(bytes) => bytes,
            SignOutcome::Rejected => {
                warn!(application = %record.id, officer = %acting.officer.id, "signer rejected OTP");
                return Err(WorkflowError::ExternalService(
                    "digital signature failed; verify the OTP and try again".to_string(),
                ));
            }
            SignOutcome::Malformed(reason) => {
                return Err(WorkflowError::ExternalService(format!(
                    "unexpected signing response: {reason}"
                )));
            }
        };

        let signed_key = self
            .deps
            .documents
            .save(&format!("RecommendedForm_{}_signed.pdf", record.id), &signed)?;

        let completed_at = self.deps.clock.now();
        let expected = record.version;
        record.apply(transition, completed_at, officer_user);
        record.workflow.recommended_form = Some(signed_key.clone());
        let signature = &mut record.workflow.signature;
        if !signature.is_digitally_signed {
            signature.is_digitally_signed = true;
            signature.signed_at = Some(completed_at);
            signature.signed_by = Some(officer_user.clone());
        }
        let assignment = OfficerAssignment {
            id: Uuid::new_v4(),
            application_id: record.id,
            officer_id: acting.officer.id,
            stage: previous,
            assigned_at: completed_at,
            completed_at: Some(completed_at),
            comments: None,
            is_digitally_signed: true,
        };
        let stored = self.deps.commit_with_blob(
            ApplicationCommit::new(record, expected)
                .with_assignment(assignment)
                .consuming_otp(challenge.id, completed_at),
            &signed_key,
        )?;

        info!(
            application = %stored.id,
            from = %previous,
            to = %stored.stage(),
            officer = %acting.officer.id,
            "digital signature applied"
        );
        self.queue_next_officers(&stored);
        self.deps.notify(notifications::stage_update_email(
            &stored,
            previous,
            acting.role.display_name(),
            None,
        ));
        Ok(stored)
    }

    fn queue_next_officers(&self, record: &ApplicationRecord) {
        if record.stage().is_terminal() {
            return;
        }
        match self.deps.officers_for_stage(record, record.stage()) {
            Ok(officers) if officers.is_empty() => {
                warn!(application = %record.id, stage = %record.stage(), "no officer available for next stage");
            }
            Ok(officers) => {
                for profile in officers {
                    info!(
                        application = %record.id,
                        stage = %record.stage(),
                        officer = %profile.officer.id,
                        "signature task queued"
                    );
                }
            }
            Err(error) => {
                warn!(application = %record.id, %error, "could not resolve next officers");
            }
        }
    }
}

fn required_key_label(key_label: &str, officer_user: &UserId) -> Result<String, WorkflowError> {
    let key_label = key_label.trim();
    if key_label.is_empty() {
        return Err(WorkflowError::Configuration(format!(
            "officer {officer_user} has no signing key label"
        )));
    }
    Ok(key_label.to_string())
}
