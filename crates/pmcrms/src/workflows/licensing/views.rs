use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Address, ApplicantDetails, ApplicationDocument, ApplicationId, ApplicationNumber,
    ApplicationRecord, ApplicationStage, ApplicationStatus, Appointment, Experience,
    OfficerAssignment, PositionType, Qualification, SignatureState,
};

/// Caller-supplied listing filters; pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

impl ListFilter {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn skip(&self) -> usize {
        (self.page() - 1).saturating_mul(self.page_size())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub position_type: PositionType,
    pub current_stage: ApplicationStage,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
}

impl From<&ApplicationRecord> for ApplicationSummary {
    fn from(record: &ApplicationRecord) -> Self {
        Self {
            id: record.id,
            application_number: record.number,
            first_name: record.applicant.first_name.clone(),
            middle_name: record.applicant.middle_name.clone(),
            last_name: record.applicant.last_name.clone(),
            position_type: record.position_type,
            current_stage: record.stage(),
            status: record.status(),
            submitted_at: record.submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationPage {
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<ApplicationSummary>,
}

/// Full view returned to owners and authorized officers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationDetail {
    pub id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub position_type: PositionType,
    pub current_stage: ApplicationStage,
    pub status: ApplicationStatus,
    pub applicant: ApplicantDetails,
    pub permanent_address: Address,
    pub current_address: Address,
    pub qualifications: Vec<Qualification>,
    pub experiences: Vec<Experience>,
    pub documents: Vec<ApplicationDocument>,
    pub submitted_at: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub signature: SignatureState,
    pub is_payment_complete: bool,
    pub is_challan_generated: bool,
    pub has_recommended_form: bool,
    pub appointment: Option<Appointment>,
    pub assignments: Vec<OfficerAssignment>,
}

impl ApplicationDetail {
    pub fn new(
        record: ApplicationRecord,
        appointment: Option<Appointment>,
        assignments: Vec<OfficerAssignment>,
    ) -> Self {
        let current_stage = record.stage();
        let status = record.status();
        let workflow = record.workflow;
        Self {
            id: record.id,
            application_number: record.number,
            position_type: record.position_type,
            current_stage,
            status,
            applicant: record.applicant,
            permanent_address: record.permanent_address,
            current_address: record.current_address,
            qualifications: record.qualifications,
            experiences: record.experiences,
            documents: record.documents,
            submitted_at: record.submitted_at,
            approval_date: workflow.approval_date,
            signature: workflow.signature,
            is_payment_complete: workflow.is_payment_complete,
            is_challan_generated: workflow.is_challan_generated,
            has_recommended_form: workflow.recommended_form.is_some(),
            appointment,
            assignments,
        }
    }
}
